//! screeps-exporter - Prometheus exporter for Screeps memory metrics

use anyhow::{bail, Result};
use clap::Parser;
use tracing::info;

use screeps_exporter::cli::{self, Cli};
use screeps_exporter::collector::Target;
use screeps_exporter::config::{server_labels, Config};
use screeps_exporter::server;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    screeps_exporter::init_logging(&args.log_level.to_string(), args.log_format)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting screeps-exporter"
    );

    let mut config = Config::load_or_default(&args.config)?;
    args.apply(&mut config)?;
    config.validate()?;

    if config.servers.is_empty() {
        bail!(
            "No servers configured: set TOKEN or list servers in {}",
            args.config.display()
        );
    }
    info!(servers = config.servers.len(), "Found servers");

    let addr = cli::bind_address(&config).await?;

    if args.validate {
        println!("Configuration OK: {} server(s)", config.servers.len());
        for (entry, label) in config.servers.iter().zip(server_labels(&config.servers)) {
            let target = Target::from_entry_named(entry, &label)?;
            println!(
                "  - {} [{}] {}",
                target.name(),
                target.auth_mode(),
                target.memory_url()
            );
        }
        println!("Listening address: {}", addr);
        return Ok(());
    }

    server::run(config, addr).await
}
