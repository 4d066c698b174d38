//! Decode and format benchmarks
//!
//! Measures the memory payload pipeline for growing numbers of samples.

use std::hint::black_box;
use std::io::Write;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use flate2::write::GzEncoder;
use flate2::Compression;
use screeps_exporter::collector::decode_data;
use screeps_exporter::transformer::{translate, PrometheusFormatter};
use serde_json::json;

fn memory_data(samples: usize) -> String {
    let records: Vec<_> = (0..samples)
        .map(|i| {
            json!({
                "key": format!("screeps_room_energy_{}", i % 16),
                "value": i as f64 * 1.5,
                "type": if i % 4 == 0 { "counter" } else { "gauge" },
                "labels": { "shard": "shard2", "room": format!("W{}N{}", i % 60, i / 60) },
                "time": 51234567
            })
        })
        .collect();

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(serde_json::to_vec(&records).unwrap().as_slice())
        .unwrap();
    format!("gz:{}", STANDARD.encode(encoder.finish().unwrap()))
}

fn benchmark_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_data");

    for samples in [10, 100, 1000] {
        let data = memory_data(samples);
        group.throughput(Throughput::Elements(samples as u64));
        group.bench_with_input(BenchmarkId::from_parameter(samples), &data, |b, data| {
            b.iter(|| decode_data(black_box(data)))
        });
    }

    group.finish();
}

fn benchmark_translate_and_format(c: &mut Criterion) {
    let records = decode_data(&memory_data(1000)).unwrap();
    let formatter = PrometheusFormatter::new();

    c.bench_function("translate_format_1000", |b| {
        b.iter(|| {
            let metrics: Vec<_> = records
                .iter()
                .map(|r| translate(r, Some("shardSeason")))
                .collect();
            formatter.format(black_box(&metrics))
        })
    });
}

criterion_group!(benches, benchmark_decode, benchmark_translate_and_format);
criterion_main!(benches);
