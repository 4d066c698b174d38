//! CLI argument parsing for screeps-exporter
//!
//! # Options
//!
//! - `--config` / `-c`: Configuration file path (default: config.yaml, env: SCREEPS_CONFIG)
//! - `--address` / `-a`: Listen address `[host]:port`, e.g. `:8080`, `127.0.0.1:9000` or
//!   `metrics.local:9000` (env: ADDRESS)
//! - `--token`: API token for a single-target deployment (env: TOKEN)
//! - `--shard`: Shard read in single-target mode (default: shard2, env: SCREEPS_SHARD)
//! - `--memory-path`: Memory path read in single-target mode (default: metrics, env: SCREEPS_MEMORY_PATH)
//! - `--log-level` / `-l`: Log level (trace/debug/info/warn/error, env: SCREEPS_LOG_LEVEL)
//! - `--log-format`: Log output format (text/json, env: SCREEPS_LOG_FORMAT)
//! - `--validate`: Validate configuration without starting server
//!
//! # Precedence
//!
//! 1. CLI arguments
//! 2. Environment variables
//! 3. Configuration file
//! 4. Default values

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::{Config, ConfigError, ServerEntry};

/// Name of the target synthesized from `--token`
pub const SINGLE_TARGET_NAME: &str = "default";

/// screeps-exporter - Prometheus exporter for Screeps memory metrics
///
/// Reads metrics a bot stores in its Screeps memory and serves them
/// in Prometheus format.
#[derive(Parser, Debug)]
#[command(name = "screeps-exporter")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "config.yaml",
        env = "SCREEPS_CONFIG"
    )]
    pub config: PathBuf,

    /// Listen address "[host]:port", e.g. ":8080", "127.0.0.1:9000" or "myhost:9000" (overrides config file)
    #[arg(short, long, value_name = "ADDRESS", env = "ADDRESS")]
    pub address: Option<String>,

    /// API token; scrapes a single target when the config lists no servers
    #[arg(long, value_name = "TOKEN", env = "TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Shard read in single-target mode
    #[arg(long, value_name = "SHARD", default_value = "shard2", env = "SCREEPS_SHARD")]
    pub shard: String,

    /// Memory path read in single-target mode
    #[arg(
        long,
        value_name = "PATH",
        default_value = "metrics",
        env = "SCREEPS_MEMORY_PATH"
    )]
    pub memory_path: String,

    /// Log level
    #[arg(
        short,
        long,
        value_enum,
        default_value = "info",
        env = "SCREEPS_LOG_LEVEL"
    )]
    pub log_level: LogLevel,

    /// Log output format
    #[arg(long, value_enum, default_value = "text", env = "SCREEPS_LOG_FORMAT")]
    pub log_format: LogFormat,

    /// Validate configuration without starting server
    #[arg(long)]
    pub validate: bool,
}

/// Log level options
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// Log output format
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

impl Cli {
    /// Apply CLI/env overrides on top of the loaded configuration
    ///
    /// A token only creates a target when the configuration has none.
    pub fn apply(&self, config: &mut Config) -> Result<(), ConfigError> {
        if let Some(address) = &self.address {
            let (host, port) = parse_address(address)?;
            config.server.bind_address = host;
            config.server.port = port;
        }

        match self.token.as_deref().filter(|t| !t.is_empty()) {
            Some(token) if config.servers.is_empty() => {
                config.servers.push(ServerEntry {
                    name: SINGLE_TARGET_NAME.to_string(),
                    shard: Some(self.shard.clone()),
                    path: Some(self.memory_path.clone()),
                    token: Some(token.to_string()),
                    ..Default::default()
                });
            }
            Some(_) => {
                tracing::warn!("Ignoring TOKEN because the config file lists servers");
            }
            None => {}
        }

        Ok(())
    }
}

/// Split a listen address into host and port without resolving it
///
/// A bare `:port` listens on all interfaces. IPv6 hosts are written in
/// brackets, `[::1]:9000`.
pub fn parse_address(address: &str) -> Result<(String, u16), ConfigError> {
    let invalid = |reason: String| {
        ConfigError::ValidationError(format!("Invalid listen address '{}': {}", address, reason))
    };

    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| invalid("expected [host]:port".to_string()))?;
    let port: u16 = port.parse().map_err(|e| invalid(format!("{}", e)))?;

    let host = host.trim_start_matches('[').trim_end_matches(']');
    let host = if host.is_empty() { "0.0.0.0" } else { host };

    Ok((host.to_string(), port))
}

/// Resolve the socket address the server binds to
///
/// `server.bind_address` may be an IP address or a hostname; hostnames are
/// resolved and the first address is used.
pub async fn bind_address(config: &Config) -> Result<SocketAddr, ConfigError> {
    let host = config.server.bind_address.as_str();
    let port = config.server.port;

    if let Ok(ip) = host.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }
    if host.is_empty() {
        return Err(ConfigError::ValidationError(
            "bind_address must not be empty".to_string(),
        ));
    }

    let unresolved = |reason: String| {
        ConfigError::ValidationError(format!(
            "Cannot resolve bind_address '{}': {}",
            host, reason
        ))
    };
    tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| unresolved(e.to_string()))?
        .next()
        .ok_or_else(|| unresolved("no addresses found".to_string()))
}
