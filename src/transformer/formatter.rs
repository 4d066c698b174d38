//! Prometheus Exposition Format output
//!
//! Renders [`PrometheusMetric`] samples in the text exposition format
//! (version 0.0.4).
//!
//! ```text
//! # HELP <metric_name> <help_text>
//! # TYPE <metric_name> <type>
//! <metric_name>{<label1>="<value1>",<label2>="<value2>"} <value>
//! ```

use std::collections::HashMap;
use std::fmt::Write;

use super::engine::PrometheusMetric;

/// Content type of the rendered output
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Prometheus exposition format formatter
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusFormatter;

impl PrometheusFormatter {
    pub fn new() -> Self {
        Self
    }

    /// Format metrics into Prometheus exposition format
    ///
    /// Samples sharing a name are grouped under one HELP/TYPE header, in order
    /// of first appearance. Labels are sorted for deterministic output.
    pub fn format(&self, metrics: &[PrometheusMetric]) -> String {
        let mut output = String::with_capacity(metrics.len() * 96);

        for (name, group) in Self::group_by_name(metrics) {
            let head = group[0];
            if let Some(help) = &head.help {
                let _ = writeln!(output, "# HELP {} {}", name, Self::escape_help(help));
            }
            let _ = writeln!(output, "# TYPE {} {}", name, head.metric_type.as_str());

            for metric in group {
                Self::write_sample(&mut output, metric);
            }
        }

        output
    }

    fn group_by_name(metrics: &[PrometheusMetric]) -> Vec<(&str, Vec<&PrometheusMetric>)> {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut groups: Vec<(&str, Vec<&PrometheusMetric>)> = Vec::new();

        for metric in metrics {
            let slot = *index.entry(metric.name.as_str()).or_insert_with(|| {
                groups.push((metric.name.as_str(), Vec::new()));
                groups.len() - 1
            });
            groups[slot].1.push(metric);
        }

        groups
    }

    fn write_sample(output: &mut String, metric: &PrometheusMetric) {
        output.push_str(&metric.name);

        let labels = metric.label_pairs();
        if !labels.is_empty() {
            output.push('{');
            for (i, (key, value)) in labels.iter().enumerate() {
                if i > 0 {
                    output.push(',');
                }
                let _ = write!(output, "{}=\"{}\"", key, Self::escape_label_value(value));
            }
            output.push('}');
        }

        output.push(' ');
        output.push_str(&Self::format_value(metric.value));
        output.push('\n');
    }

    /// Format a numeric value: `NaN`, `+Inf`/`-Inf`, integers without a
    /// decimal point, everything else in Rust's shortest round-trip form
    fn format_value(value: f64) -> String {
        if value.is_nan() {
            "NaN".to_string()
        } else if value.is_infinite() {
            if value.is_sign_positive() {
                "+Inf".to_string()
            } else {
                "-Inf".to_string()
            }
        } else if value.fract() == 0.0 && value.abs() < 1e15 {
            format!("{}", value as i64)
        } else if value.abs() >= 1e15 || (value.abs() < 1e-3 && value != 0.0) {
            format!("{:e}", value)
        } else {
            format!("{}", value)
        }
    }

    fn escape_help(help: &str) -> String {
        help.replace('\\', "\\\\").replace('\n', "\\n")
    }

    fn escape_label_value(value: &str) -> String {
        let mut escaped = String::with_capacity(value.len());
        for c in value.chars() {
            match c {
                '\\' => escaped.push_str("\\\\"),
                '"' => escaped.push_str("\\\""),
                '\n' => escaped.push_str("\\n"),
                _ => escaped.push(c),
            }
        }
        escaped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transformer::MetricType;

    #[test]
    fn test_format_gauge_with_help() {
        let metrics = vec![PrometheusMetric::new("screeps_api_rate_limit_remaining", 1440.0)
            .with_help("Screeps API rate limit")];

        let output = PrometheusFormatter::new().format(&metrics);

        assert_eq!(
            output,
            "# HELP screeps_api_rate_limit_remaining Screeps API rate limit\n\
             # TYPE screeps_api_rate_limit_remaining gauge\n\
             screeps_api_rate_limit_remaining 1440\n"
        );
    }

    #[test]
    fn test_format_counter_labels_sorted() {
        let metrics = vec![PrometheusMetric::new("screeps_creeps_spawned_total", 7.0)
            .with_type(MetricType::Counter)
            .with_label("shard", "shard2")
            .with_label("room", "W7N3")];

        let output = PrometheusFormatter::new().format(&metrics);

        assert!(output.contains("# TYPE screeps_creeps_spawned_total counter\n"));
        assert!(output.contains("screeps_creeps_spawned_total{room=\"W7N3\",shard=\"shard2\"} 7\n"));
        assert!(!output.contains("# HELP"));
    }

    #[test]
    fn test_same_name_grouped_once() {
        let metrics = vec![
            PrometheusMetric::new("screeps_room_energy", 300.0).with_label("room", "W1N1"),
            PrometheusMetric::new("screeps_cpu_bucket", 10000.0),
            PrometheusMetric::new("screeps_room_energy", 550.0).with_label("room", "W2N1"),
        ];

        let output = PrometheusFormatter::new().format(&metrics);

        assert_eq!(output.matches("# TYPE screeps_room_energy").count(), 1);
        let first = output.find("room=\"W1N1\"").unwrap();
        let second = output.find("room=\"W2N1\"").unwrap();
        let bucket = output.find("screeps_cpu_bucket").unwrap();
        assert!(first < second);
        assert!(second < bucket);
    }

    #[test]
    fn test_format_value() {
        assert_eq!(PrometheusFormatter::format_value(f64::NAN), "NaN");
        assert_eq!(PrometheusFormatter::format_value(f64::INFINITY), "+Inf");
        assert_eq!(PrometheusFormatter::format_value(f64::NEG_INFINITY), "-Inf");
        assert_eq!(PrometheusFormatter::format_value(42.0), "42");
        assert_eq!(PrometheusFormatter::format_value(-100.0), "-100");
        assert_eq!(PrometheusFormatter::format_value(0.25), "0.25");
        assert_eq!(PrometheusFormatter::format_value(2.5e-6), "2.5e-6");
    }

    #[test]
    fn test_escaping() {
        assert_eq!(
            PrometheusFormatter::escape_help("line1\nline2\\"),
            "line1\\nline2\\\\"
        );
        assert_eq!(
            PrometheusFormatter::escape_label_value("all\"\\\n"),
            "all\\\"\\\\\\n"
        );
    }

    #[test]
    fn test_format_empty_metrics() {
        assert!(PrometheusFormatter::new().format(&[]).is_empty());
    }
}
