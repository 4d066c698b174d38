//! Scrape orchestration
//!
//! [`ScreepsCollector`] owns the configured targets and, on every scrape, runs
//! sign-in → memory fetch → decode → translate for each of them. Targets run
//! concurrently and fail independently: a broken target is logged and simply
//! contributes nothing to this scrape.

use std::time::Instant;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, error, info, warn};

use super::client::{RateLimit, ScreepsClient};
use super::decode::decode;
use super::target::Target;
use crate::config::{server_labels, Config, ConfigError};
use crate::error::{FetchError, ScrapeError};
use crate::registry::{Collector, MetricSink};
use crate::transformer::{translate, PrometheusMetric};

/// Requests left in the current rate-limit window
pub const RATE_LIMIT_REMAINING_METRIC: &str = "screeps_api_rate_limit_remaining";
/// Seconds until the rate limit resets
pub const RATE_LIMIT_RESET_METRIC: &str = "screeps_api_rate_limit_reset";
/// Whether the last pipeline run of a target succeeded
pub const TARGET_UP_METRIC: &str = "screeps_exporter_target_up";
/// Label naming the configured server on exporter-generated samples
pub const SERVER_LABEL: &str = "server";

/// Collector scraping every configured Screeps target
pub struct ScreepsCollector {
    client: ScreepsClient,
    targets: Vec<Target>,
}

impl ScreepsCollector {
    pub fn new(client: ScreepsClient, targets: Vec<Target>) -> Self {
        Self { client, targets }
    }

    /// Build the HTTP client and all targets from configuration
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let client = ScreepsClient::from_config(&config.http)?;
        let targets = config
            .servers
            .iter()
            .zip(server_labels(&config.servers))
            .map(|(entry, label)| Target::from_entry_named(entry, &label))
            .collect::<Result<Vec<_>, _>>()?;

        for target in &targets {
            info!(
                server = %target.name(),
                host = %target.host(),
                shard = %target.shard(),
                auth = %target.auth_mode(),
                "Registering metrics"
            );
        }

        Ok(Self::new(client, targets))
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Run the full pipeline for one target
    ///
    /// Rate-limit gauges are emitted as soon as the memory response arrives,
    /// whatever its status. Translated samples are only emitted once the whole
    /// payload decoded. Returns the number of translated samples.
    pub async fn scrape_target(
        &self,
        target: &Target,
        sink: &MetricSink,
    ) -> Result<usize, ScrapeError> {
        let token = target.ensure_authenticated(&self.client).await?;

        let response = self.client.read_memory(target, &token).await?;
        for metric in rate_limit_metrics(target, &response.rate_limit) {
            sink.emit(metric);
        }

        let payload = match response.into_payload() {
            Ok(payload) => payload,
            Err(FetchError::Unauthorized) => {
                target.invalidate_token(&token).await;
                return Err(FetchError::Unauthorized.into());
            }
            Err(e) => return Err(e.into()),
        };

        let records = decode(&payload)?;
        let override_shard = target.override_shard_name();
        for record in &records {
            sink.emit(translate(record, override_shard));
        }

        Ok(records.len())
    }

    /// Scrape one target and report its `up` sample ahead of its other samples
    ///
    /// The target's samples are buffered so `up` always describes this very
    /// pipeline run, even when scrapes overlap.
    async fn scrape_and_log(&self, target: &Target, sink: &MetricSink) {
        let start = Instant::now();
        info!(server = %target.name(), url = %target.memory_url(), "Collecting metrics from Screeps");

        let (buffer, mut rx) = MetricSink::channel();
        let result = self.scrape_target(target, &buffer).await;
        drop(buffer);

        let up = match result {
            Ok(count) => {
                info!(
                    server = %target.name(),
                    samples = count,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Success"
                );
                true
            }
            Err(e) => {
                log_failure(target, &e);
                false
            }
        };

        sink.emit(target_up_metric(target, up));
        while let Some(metric) = rx.recv().await {
            sink.emit(metric);
        }
    }
}

fn log_failure(target: &Target, err: &ScrapeError) {
    let url = target.memory_url();
    match err {
        ScrapeError::Fetch(FetchError::Unauthorized) => {
            warn!(server = %target.name(), url = %url, status = 401, "Token rejected, will re-authenticate next scrape");
        }
        ScrapeError::Fetch(e @ FetchError::RateLimited { .. }) => {
            warn!(server = %target.name(), url = %url, status = 429, error = %e, "Rate limited");
        }
        ScrapeError::Fetch(e @ FetchError::UpstreamError { .. }) => {
            error!(server = %target.name(), url = %url, status = ?e.http_status(), error = %e, "Upstream returned an error");
        }
        ScrapeError::Fetch(e @ FetchError::Transport(_)) => {
            error!(server = %target.name(), url = %url, timeout = e.is_timeout(), error = %e, "Request failed");
        }
        ScrapeError::Auth(e) => {
            error!(server = %target.name(), url = %target.signin_url(), error = %e, "Sign-in failed");
        }
        ScrapeError::Decode(e) => {
            error!(server = %target.name(), url = %url, stage = %e.stage, error = %e, "Failed to decode memory");
        }
    }
}

/// `screeps_exporter_target_up{server}` for one pipeline run
pub fn target_up_metric(target: &Target, up: bool) -> PrometheusMetric {
    PrometheusMetric::new(TARGET_UP_METRIC, if up { 1.0 } else { 0.0 })
        .with_help("Whether the last scrape of the target succeeded")
        .with_label(SERVER_LABEL, target.name())
}

/// Gauges for the rate-limit headers present on a response
pub fn rate_limit_metrics(target: &Target, limit: &RateLimit) -> Vec<PrometheusMetric> {
    let mut metrics = Vec::with_capacity(2);

    if let Some(remaining) = limit.remaining {
        metrics.push(
            PrometheusMetric::new(RATE_LIMIT_REMAINING_METRIC, remaining)
                .with_help("Screeps API rate limit")
                .with_label(SERVER_LABEL, target.name()),
        );
    }
    if let Some(reset) = limit.reset {
        metrics.push(
            PrometheusMetric::new(RATE_LIMIT_RESET_METRIC, reset)
                .with_help("Screeps API rate limit reset")
                .with_label(SERVER_LABEL, target.name()),
        );
    }

    metrics
}

#[async_trait]
impl Collector for ScreepsCollector {
    // Metric names come from the bot's memory, nothing is known up front.

    async fn collect(&self, sink: &MetricSink) {
        debug!(targets = self.targets.len(), "Scraping targets");
        join_all(self.targets.iter().map(|t| self.scrape_and_log(t, sink))).await;
    }
}
