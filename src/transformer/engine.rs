//! Record to Prometheus sample translation
//!
//! Every decoded [`MetricRecord`] becomes exactly one [`PrometheusMetric`].
//! Nothing is aggregated, converted or deduplicated here.

use std::collections::HashMap;

use crate::collector::MetricRecord;

/// Label rewritten by a target's shard-name override
pub const SHARD_LABEL: &str = "shard";

/// Prometheus metric type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetricType {
    /// A value that can go up and down
    #[default]
    Gauge,
    /// A monotonically increasing value
    Counter,
}

impl MetricType {
    /// Map the `type` field of a record; only the exact string `"counter"`
    /// yields a counter
    pub fn from_record_type(kind: &str) -> Self {
        match kind {
            "counter" => MetricType::Counter,
            _ => MetricType::Gauge,
        }
    }

    /// Returns the Prometheus type string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Gauge => "gauge",
            MetricType::Counter => "counter",
        }
    }
}

/// A single exposition-ready sample
#[derive(Debug, Clone, PartialEq)]
pub struct PrometheusMetric {
    /// Metric name
    pub name: String,
    /// Metric type
    pub metric_type: MetricType,
    /// Help text
    pub help: Option<String>,
    /// Labels
    pub labels: HashMap<String, String>,
    /// Metric value
    pub value: f64,
}

impl PrometheusMetric {
    /// Create a new gauge sample
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            metric_type: MetricType::Gauge,
            help: None,
            labels: HashMap::new(),
            value,
        }
    }

    /// Set the metric type
    pub fn with_type(mut self, metric_type: MetricType) -> Self {
        self.metric_type = metric_type;
        self
    }

    /// Set help text
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Add a label
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Sorted `(name, value)` label pairs, used as identity of a series
    pub fn label_pairs(&self) -> Vec<(&str, &str)> {
        let mut pairs: Vec<(&str, &str)> = self
            .labels
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        pairs.sort_unstable();
        pairs
    }
}

/// Translate one record into a sample
///
/// With `override_shard` set, the sample's `shard` label is replaced (or
/// added). The record itself is left untouched.
pub fn translate(record: &MetricRecord, override_shard: Option<&str>) -> PrometheusMetric {
    let mut labels = record.labels.clone();
    if let Some(shard) = override_shard {
        labels.insert(SHARD_LABEL.to_string(), shard.to_string());
    }

    PrometheusMetric {
        name: record.key.clone(),
        metric_type: MetricType::from_record_type(&record.kind),
        help: None,
        labels,
        value: record.value,
    }
}
