//! Shared helpers for integration tests

#![allow(dead_code)]

use std::io::Write;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::write::GzEncoder;
use flate2::Compression;
use screeps_exporter::registry::MetricSink;
use screeps_exporter::transformer::PrometheusMetric;
use serde_json::{json, Value};

/// Encode a metric array the way the bot stores it in memory
pub fn encode_memory(metrics: &Value) -> String {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(metrics.to_string().as_bytes())
        .expect("gzip write");
    let compressed = encoder.finish().expect("gzip finish");
    format!("gz:{}", STANDARD.encode(compressed))
}

/// Memory endpoint response body for `metrics`
pub fn memory_body(metrics: &Value) -> Value {
    json!({ "ok": 1, "data": encode_memory(metrics) })
}

pub fn sample_metrics() -> Value {
    json!([
        {
            "key": "screeps_cpu_used",
            "value": 14.2,
            "type": "gauge",
            "labels": { "shard": "shard2" },
            "time": 51234567
        },
        {
            "key": "screeps_creeps_spawned_total",
            "value": 310,
            "type": "counter",
            "labels": { "shard": "shard2", "room": "W8N3" },
            "time": 51234567
        }
    ])
}

/// Drain everything emitted into a sink created with `MetricSink::channel`
pub async fn drain(
    sink: MetricSink,
    mut rx: tokio::sync::mpsc::UnboundedReceiver<PrometheusMetric>,
) -> Vec<PrometheusMetric> {
    drop(sink);
    let mut out = Vec::new();
    while let Some(metric) = rx.recv().await {
        out.push(metric);
    }
    out
}
