//! Criterion benchmarks for SaParser and the aggregator

use chrono::NaiveDate;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::path::PathBuf;
use usertime::parsers::{SaParser, SnapshotParser};
use usertime::services::{Aggregator, SnapshotStore, DEFAULT_LOG_DIR};
use usertime::types::{AllowSet, DenySet, Snapshot, UserIdentity};

const USERS: usize = 200;

fn bench_allow_set() -> AllowSet {
    (0..USERS)
        .filter_map(|i| UserIdentity::new(&format!("user{:03}", i)))
        .collect()
}

/// `sa -u` style output with `lines` process records spread over USERS accounts
fn synthetic_snapshot(lines: usize) -> Snapshot {
    let mut raw = String::with_capacity(lines * 64);
    for i in 0..lines {
        raw.push_str(&format!(
            "user{:03}    {}.{:02} cpu    {}k mem    0 io command{}\n",
            i % (USERS + 20),
            i % 5000,
            i % 100,
            1024 + i % 4096,
            i % 7
        ));
    }
    Snapshot::new(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(), raw)
}

/// Prefer the newest real snapshot, fall back to the fixture
fn get_bench_snapshot() -> Snapshot {
    let store = SnapshotStore::new(DEFAULT_LOG_DIR);
    if let Some(latest) = store.list().ok().and_then(|refs| refs.into_iter().last()) {
        if let Ok(snapshot) = latest.load() {
            eprintln!("Using real snapshot: {}", latest.path.display());
            return snapshot;
        }
    }

    let fixture = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("sa-sample.log");
    eprintln!("Using fixture: {} (no real snapshot found)", fixture.display());
    let raw = std::fs::read_to_string(&fixture).unwrap_or_default();
    Snapshot::new(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(), raw)
}

fn bench_parse_snapshot(c: &mut Criterion) {
    let parser = SaParser::new();
    let allow = bench_allow_set();
    let deny = DenySet::default();
    let snapshot = get_bench_snapshot();

    let mut group = c.benchmark_group("parser");
    group.throughput(Throughput::Bytes(snapshot.raw.len() as u64));
    group.bench_function("parse_snapshot", |b| {
        b.iter(|| parser.parse(black_box(&snapshot), &allow, &deny));
    });
    group.finish();
}

fn bench_parse_synthetic(c: &mut Criterion) {
    let parser = SaParser::new();
    let allow = bench_allow_set();
    let deny = DenySet::default();

    let mut group = c.benchmark_group("parser");
    for lines in [1_000, 10_000, 100_000] {
        let snapshot = synthetic_snapshot(lines);
        group.throughput(Throughput::Bytes(snapshot.raw.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("parse_synthetic", format!("{} lines", lines)),
            &snapshot,
            |b, snapshot| {
                b.iter(|| parser.parse(black_box(snapshot), &allow, &deny));
            },
        );
    }
    group.finish();
}

fn bench_aggregate_week(c: &mut Criterion) {
    let parser = SaParser::new();
    let allow = bench_allow_set();
    let deny = DenySet::default();
    let records: Vec<_> = (0..7)
        .map(|_| parser.parse(&synthetic_snapshot(10_000), &allow, &deny))
        .collect();

    let mut group = c.benchmark_group("aggregator");
    group.bench_function("aggregate_7_days", |b| {
        b.iter(|| Aggregator::aggregate(black_box(&records)));
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_parse_snapshot,
    bench_parse_synthetic,
    bench_aggregate_week
);
criterion_main!(benches);
