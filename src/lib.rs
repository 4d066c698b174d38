//! screeps-exporter library
//!
//! Scrapes the metrics a Screeps bot keeps in its memory, decodes them and
//! exports them in Prometheus format.

pub mod cli;
pub mod collector;
pub mod config;
pub mod error;
pub mod registry;
pub mod server;
pub mod transformer;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::LogFormat;

/// Initialize the logging subsystem
///
/// `RUST_LOG` takes precedence over `level`.
///
/// # Errors
/// Returns an error if a global subscriber is already installed
pub fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    let result = match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    };

    result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}
