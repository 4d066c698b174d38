//! HTTP request handlers

use std::time::Instant;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse},
    Json,
};
use serde::Serialize;
use tracing::{debug, instrument};

use super::AppState;
use crate::registry::filter_samples;
use crate::transformer::{PrometheusFormatter, PrometheusMetric, CONTENT_TYPE};

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    /// Health status
    status: String,
    /// Application version
    version: String,
    /// Number of configured targets
    targets: usize,
}

/// Root endpoint - displays basic info
pub async fn root(State(state): State<AppState>) -> Html<String> {
    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Screeps Exporter</title>
</head>
<body>
    <h1>Screeps Exporter</h1>
    <p>Version: {}</p>
    <ul>
        <li><a href="/health">Health Check</a></li>
        <li><a href="{}">Metrics</a></li>
    </ul>
</body>
</html>"#,
        env!("CARGO_PKG_VERSION"),
        state.config.server.path
    );
    Html(html)
}

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        targets: state.collector.targets().len(),
    })
}

/// Metrics endpoint - scrapes every target and returns Prometheus text
///
/// Always answers 200; failing targets just contribute no samples.
#[instrument(skip(state), name = "metrics_handler")]
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let start = Instant::now();

    let collected = state.registry.collect_all().await;
    let scraped = collected.len();

    // Own samples go first so they win any name clash with bot metrics.
    let mut samples = exporter_metrics(&state, start.elapsed().as_secs_f64());
    samples.extend(collected);
    let samples = filter_samples(samples);

    let output = PrometheusFormatter::new().format(&samples);

    debug!(
        duration_ms = start.elapsed().as_millis() as u64,
        metrics_count = scraped,
        "Metrics collection complete"
    );

    (StatusCode::OK, [(header::CONTENT_TYPE, CONTENT_TYPE)], output)
}

/// Self-observability samples; per-target `up` comes from the collector
fn exporter_metrics(state: &AppState, duration_secs: f64) -> Vec<PrometheusMetric> {
    vec![
        PrometheusMetric::new("screeps_exporter_info", 1.0)
            .with_help("screeps-exporter information")
            .with_label("version", env!("CARGO_PKG_VERSION")),
        PrometheusMetric::new("screeps_exporter_scrape_duration_seconds", duration_secs)
            .with_help("Time spent scraping all targets"),
        PrometheusMetric::new(
            "screeps_exporter_targets",
            state.collector.targets().len() as f64,
        )
        .with_help("Number of configured targets"),
    ]
}
