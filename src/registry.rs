//! Pull-based metrics registry
//!
//! Collectors are asked for their samples on every scrape of the metrics
//! endpoint. They push samples into a [`MetricSink`]; the registry drains the
//! sink, drops samples the exposition format cannot carry and hands the rest
//! to the formatter.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::transformer::{MetricType, PrometheusMetric};

/// Static description of a metric a collector always exposes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricDesc {
    pub name: String,
    pub help: String,
    pub metric_type: MetricType,
}

/// Write side of a scrape; cheap to clone and safe to share across tasks
#[derive(Debug, Clone)]
pub struct MetricSink {
    tx: mpsc::UnboundedSender<PrometheusMetric>,
}

impl MetricSink {
    /// Create a sink and the receiver that drains it
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PrometheusMetric>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, metric: PrometheusMetric) {
        // The receiver only goes away once the scrape is over.
        let _ = self.tx.send(metric);
    }
}

/// Something that produces samples on each scrape
#[async_trait]
pub trait Collector: Send + Sync {
    /// Metrics known ahead of any scrape; data-driven collectors return none
    fn describe(&self) -> Vec<MetricDesc> {
        Vec::new()
    }

    /// Emit the current samples into `sink`
    async fn collect(&self, sink: &MetricSink);
}

/// Set of collectors gathered together on each scrape
#[derive(Default)]
pub struct Registry {
    collectors: Vec<Arc<dyn Collector>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, collector: Arc<dyn Collector>) {
        debug!(
            described = collector.describe().len(),
            "Registering collector"
        );
        self.collectors.push(collector);
    }

    /// Descriptions advertised by all registered collectors
    pub fn describe(&self) -> Vec<MetricDesc> {
        self.collectors.iter().flat_map(|c| c.describe()).collect()
    }

    /// Run every collector concurrently and return the valid samples
    pub async fn gather(&self) -> Vec<PrometheusMetric> {
        filter_samples(self.collect_all().await)
    }

    /// Run every collector concurrently and return everything emitted,
    /// unfiltered
    ///
    /// For callers that add their own samples ahead of the collected ones
    /// before running [`filter_samples`].
    pub async fn collect_all(&self) -> Vec<PrometheusMetric> {
        let (sink, mut rx) = MetricSink::channel();

        join_all(self.collectors.iter().map(|c| c.collect(&sink))).await;
        drop(sink);

        let mut samples = Vec::new();
        while let Some(metric) = rx.recv().await {
            samples.push(metric);
        }

        samples
    }
}

/// Drop samples with invalid names, exact duplicate series and type
/// conflicts. The first sample of a series or name wins.
pub fn filter_samples(samples: Vec<PrometheusMetric>) -> Vec<PrometheusMetric> {
    let mut types: HashMap<String, MetricType> = HashMap::new();
    let mut series: HashSet<(String, Vec<(String, String)>)> = HashSet::new();
    let mut kept = Vec::with_capacity(samples.len());

    for metric in samples {
        if !is_valid_metric_name(&metric.name) {
            warn!(metric = %metric.name, "Dropping sample with invalid metric name");
            continue;
        }
        if let Some(label) = metric.labels.keys().find(|l| !is_valid_label_name(l)) {
            warn!(metric = %metric.name, label = %label, "Dropping sample with invalid label name");
            continue;
        }

        let known = *types
            .entry(metric.name.clone())
            .or_insert(metric.metric_type);
        if known != metric.metric_type {
            warn!(
                metric = %metric.name,
                expected = known.as_str(),
                got = metric.metric_type.as_str(),
                "Dropping sample with conflicting type"
            );
            continue;
        }

        let key = (
            metric.name.clone(),
            metric
                .label_pairs()
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        if !series.insert(key) {
            warn!(metric = %metric.name, "Dropping duplicate sample");
            continue;
        }

        kept.push(metric);
    }

    kept
}

/// `[a-zA-Z_:][a-zA-Z0-9_:]*`
pub fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// `[a-zA-Z_][a-zA-Z0-9_]*`, without the reserved `__` prefix
pub fn is_valid_label_name(name: &str) -> bool {
    if name.starts_with("__") {
        return false;
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
