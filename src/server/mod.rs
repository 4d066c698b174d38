//! HTTP server module
//!
//! Provides the Axum-based HTTP server for serving metrics.

pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{routing::get, Router};
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::collector::ScreepsCollector;
use crate::config::Config;
use crate::registry::Registry;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Registry gathered on every scrape
    pub registry: Arc<Registry>,
    /// Screeps collector, also registered in `registry`
    pub collector: Arc<ScreepsCollector>,
}

impl AppState {
    /// Build the collector from configuration and register it
    pub fn from_config(config: Config) -> Result<Self> {
        let collector = Arc::new(ScreepsCollector::from_config(&config)?);

        let mut registry = Registry::new();
        registry.register(collector.clone());

        Ok(Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            collector,
        })
    }
}

/// Build the router: index, health and the configured metrics path
pub fn router(state: AppState) -> Router {
    let metrics_path = state.config.server.path.clone();

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route(&metrics_path, get(handlers::metrics))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Run the HTTP server until Ctrl+C or SIGTERM
///
/// # Errors
/// Returns an error if the collector cannot be built or the listener fails
pub async fn run(config: Config, addr: SocketAddr) -> Result<()> {
    let metrics_path = config.server.path.clone();
    let state = AppState::from_config(config)?;
    let app = router(state);

    info!(address = %addr, metrics_path = %metrics_path, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        }
    }
}
