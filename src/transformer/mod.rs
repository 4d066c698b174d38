//! Metric translation and exposition
//!
//! [`engine`] maps decoded memory records to samples, [`formatter`] renders
//! samples in the Prometheus text format.

pub mod engine;
pub mod formatter;

pub use engine::{translate, MetricType, PrometheusMetric, SHARD_LABEL};
pub use formatter::{PrometheusFormatter, CONTENT_TYPE};
