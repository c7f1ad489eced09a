//! Hot path benchmarks for the aggregation engine.
//!
//! Run with: `cargo bench --bench hot_paths`
//! Compare baselines: `cargo bench --bench hot_paths -- --baseline main`
//!
//! Recording calls sit on the caller's request path; flush cost is linear
//! in the number of distinct buckets.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use lambda_dd_metrics::metrics::{Aggregator, KeyResolver, LineEmitter, ManualClock};
use std::io::Sink;

type BenchAggregator = Aggregator<LineEmitter<Sink, ManualClock>>;

fn aggregator() -> BenchAggregator {
    Aggregator::with_emitter(
        "bench",
        Some("group"),
        LineEmitter::new(std::io::sink(), ManualClock::new(0)),
    )
}

/// Benchmark key resolution with various tag counts
fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");
    group.throughput(Throughput::Elements(1));

    let resolver = KeyResolver::new(Some("group"));
    for tag_count in [0, 2, 8] {
        let tags: Vec<String> = (0..tag_count).map(|i| format!("tag{}:value", i)).collect();
        let tags: Vec<&str> = tags.iter().map(String::as_str).collect();

        group.bench_function(format!("tags_{}", tag_count), |b| {
            b.iter(|| resolver.resolve(black_box(&tags)))
        });
    }

    group.finish();
}

/// Benchmark the recording operations on an existing bucket
fn bench_record(c: &mut Criterion) {
    let mut group = c.benchmark_group("record");
    group.throughput(Throughput::Elements(1));

    let agg = aggregator();
    let tags = ["env:prod", "host:web01"];

    group.bench_function("increment", |b| {
        b.iter(|| agg.increment(black_box("requests"), 1, &tags))
    });
    group.bench_function("set_gauge", |b| {
        b.iter(|| agg.set_gauge(black_box("cpu"), 75, &tags))
    });
    group.bench_function("record_set_member", |b| {
        b.iter(|| agg.record_set_member(black_box("users"), "alice", &tags))
    });

    group.finish();
}

/// Benchmark flushing a populated aggregator
fn bench_flush(c: &mut Criterion) {
    let mut group = c.benchmark_group("flush");

    for buckets in [10, 100, 1000] {
        group.throughput(Throughput::Elements(buckets));
        let agg = aggregator();

        group.bench_function(format!("buckets_{}", buckets), |b| {
            b.iter_batched(
                || {
                    for i in 0..buckets {
                        let tag = format!("shard:{}", i);
                        let _ = agg.incr("requests", &[tag.as_str()]);
                    }
                },
                |()| agg.flush_all(),
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(benches, bench_resolve, bench_record, bench_flush);
criterion_main!(benches);
