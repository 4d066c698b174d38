//! Configuration management for screeps-exporter
//!
//! Handles loading and validating configuration from YAML files.
//!
//! ```yaml
//! server:
//!   port: 8080
//! servers:
//!   - name: mmo
//!     shard: shard2
//!     path: metrics
//!     token: "..."
//!   - name: private
//!     host: http://localhost:21025
//!     shard: shard0
//!     overrideShardName: private
//!     username: bot
//!     password: secret
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Public Screeps server used when a server entry has no `host`
pub const DEFAULT_HOST: &str = "https://screeps.com";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Error reading the configuration file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Error parsing the configuration file
    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Configuration validation error
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// A server entry has no usable credentials
    #[error("No auth credentials provided for server '{0}'")]
    MissingCredentials(String),

    /// The HTTP client could not be built from the configuration
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Upstream HTTP client configuration
    #[serde(default)]
    pub http: HttpConfig,

    /// Screeps servers to scrape
    #[serde(default)]
    pub servers: Vec<ServerEntry>,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Metrics endpoint path
    #[serde(default = "default_metrics_path")]
    pub path: String,

    /// Server bind address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

/// Upstream HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout in milliseconds, applied to sign-in and memory requests
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,

    /// User-Agent header sent upstream
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// One Screeps server/shard to scrape
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerEntry {
    /// Display name, used in logs and the `server` label of exporter metrics.
    /// Need not be unique, see [`server_labels`].
    #[serde(default)]
    pub name: String,

    /// Base URL, defaults to the public server
    #[serde(default)]
    pub host: Option<String>,

    /// Memory path holding the encoded metrics
    #[serde(default)]
    pub path: Option<String>,

    /// Shard to read memory from
    #[serde(default)]
    pub shard: Option<String>,

    /// Replaces the `shard` label on every sample from this server
    #[serde(default)]
    pub override_shard_name: Option<String>,

    /// API token
    #[serde(default)]
    pub token: Option<String>,

    /// Username (or email) for private servers
    #[serde(default)]
    pub username: Option<String>,

    /// Password for private servers
    #[serde(default)]
    pub password: Option<String>,
}

// Default value functions
fn default_port() -> u16 {
    8080
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_timeout() -> u64 {
    10_000
}

fn default_user_agent() -> String {
    format!("screeps-exporter/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            path: default_metrics_path(),
            bind_address: default_bind_address(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl ServerEntry {
    /// Host with the default applied and trailing slashes removed
    pub fn host_or_default(&self) -> String {
        non_empty(&self.host)
            .unwrap_or(DEFAULT_HOST)
            .trim_end_matches('/')
            .to_string()
    }

    /// Check that the entry carries a token or a username/password pair
    pub fn validate(&self) -> Result<(), ConfigError> {
        let has_token = non_empty(&self.token).is_some();
        let has_user_pass =
            non_empty(&self.username).is_some() && non_empty(&self.password).is_some();

        if has_token || has_user_pass {
            Ok(())
        } else {
            Err(ConfigError::MissingCredentials(self.name.clone()))
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse and validate configuration from a YAML string
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file, falling back to defaults if not found
    ///
    /// Single-target deployments configured only through the environment have
    /// no config file at all.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "Config file not found, using defaults"
            );
            return Ok(Self::default());
        }

        Self::load(path)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "Server port must be greater than 0".to_string(),
            ));
        }

        if !self.server.path.starts_with('/') {
            return Err(ConfigError::ValidationError(
                "Metrics path must start with '/'".to_string(),
            ));
        }

        if self.server.path == "/" || self.server.path == "/health" {
            return Err(ConfigError::ValidationError(format!(
                "Metrics path '{}' conflicts with a built-in route",
                self.server.path
            )));
        }

        for server in &self.servers {
            server.validate()?;
        }

        Ok(())
    }
}

/// Distinct `server` label for every entry, in config order
///
/// Names are reused as is when unique. An empty name becomes `server<index>`.
/// Entries sharing a name are told apart by shard (`name/shard`), and by
/// position (`name/shard#index`) when that is still ambiguous.
pub fn server_labels(servers: &[ServerEntry]) -> Vec<String> {
    fn counts<'a>(labels: impl Iterator<Item = &'a str>) -> HashMap<&'a str, usize> {
        let mut counts = HashMap::new();
        for label in labels {
            *counts.entry(label).or_insert(0) += 1;
        }
        counts
    }

    let bases: Vec<String> = servers
        .iter()
        .enumerate()
        .map(|(i, s)| {
            if s.name.is_empty() {
                format!("server{}", i)
            } else {
                s.name.clone()
            }
        })
        .collect();

    let base_counts = counts(bases.iter().map(String::as_str));
    let with_shard: Vec<String> = servers
        .iter()
        .zip(&bases)
        .map(|(s, base)| match non_empty(&s.shard) {
            Some(shard) if base_counts[base.as_str()] > 1 => format!("{}/{}", base, shard),
            _ => base.clone(),
        })
        .collect();

    let shard_counts = counts(with_shard.iter().map(String::as_str));
    with_shard
        .iter()
        .enumerate()
        .map(|(i, label)| {
            if shard_counts[label.as_str()] > 1 {
                format!("{}#{}", label, i)
            } else {
                label.clone()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.path, "/metrics");
        assert_eq!(config.http.timeout_ms, 10_000);
        assert!(config.servers.is_empty());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_metrics_path_conflict() {
        let mut config = Config::default();
        config.server.path = "/health".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_servers_camel_case() {
        let yaml = r#"
servers:
  - name: private
    host: http://localhost:21025/
    shard: shard0
    path: stats
    overrideShardName: botarena
    username: bot
    password: secret
"#;
        let config = Config::from_yaml(yaml).unwrap();
        let server = &config.servers[0];
        assert_eq!(server.override_shard_name.as_deref(), Some("botarena"));
        assert_eq!(server.host_or_default(), "http://localhost:21025");
        assert_eq!(server.path.as_deref(), Some("stats"));
    }

    #[test]
    fn test_host_defaults_to_public_server() {
        let server = ServerEntry {
            name: "mmo".to_string(),
            token: Some("abc".to_string()),
            ..Default::default()
        };
        assert_eq!(server.host_or_default(), DEFAULT_HOST);

        let server = ServerEntry {
            host: Some(String::new()),
            ..server
        };
        assert_eq!(server.host_or_default(), DEFAULT_HOST);
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let yaml = r#"
servers:
  - name: nocreds
    shard: shard0
"#;
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredentials(ref n) if n == "nocreds"));
    }

    #[test]
    fn test_username_without_password_rejected() {
        let server = ServerEntry {
            name: "half".to_string(),
            username: Some("bot".to_string()),
            ..Default::default()
        };
        assert!(server.validate().is_err());
    }

    #[test]
    fn test_empty_token_is_not_a_credential() {
        let server = ServerEntry {
            name: "empty".to_string(),
            token: Some(String::new()),
            ..Default::default()
        };
        assert!(server.validate().is_err());
    }

    #[test]
    fn test_repeated_and_missing_names_accepted() {
        let yaml = r#"
servers:
  - name: bot
    shard: shard0
    token: one
  - name: bot
    shard: shard3
    token: one
  - shard: shard1
    token: two
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.servers.len(), 3);
        assert_eq!(config.servers[2].name, "");
    }

    #[test]
    fn test_server_labels_are_distinct() {
        let entry = |name: &str, shard: Option<&str>| ServerEntry {
            name: name.to_string(),
            shard: shard.map(str::to_string),
            token: Some("t".to_string()),
            ..Default::default()
        };
        let servers = vec![
            entry("mmo", Some("shard2")),
            entry("bot", Some("shard0")),
            entry("bot", Some("shard3")),
            entry("twin", Some("shard1")),
            entry("twin", Some("shard1")),
            entry("", None),
        ];

        assert_eq!(
            server_labels(&servers),
            vec![
                "mmo",
                "bot/shard0",
                "bot/shard3",
                "twin/shard1#3",
                "twin/shard1#4",
                "server5",
            ]
        );
    }
}
