//! Benchmarks for the processing-time ledger
//!
//! Tests performance of recording segment timings and aggregating
//! pipeline totals.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fg_pipeline::{Action, Pipeline, ProcessingTimeLedger};

/// Build a pipeline with `n` distinct actions.
fn pipeline_with(n: usize) -> Pipeline {
    let actions = (0..n)
        .map(|i| Action::new(format!("ACTION {i}"), format!("ALGORITHM{i}")))
        .collect();
    Pipeline::new("BENCH PIPELINE", actions).unwrap()
}

/// A ledger with one measurement per action of `pipeline`.
fn measured_ledger(pipeline: &Pipeline) -> ProcessingTimeLedger {
    let ledger = ProcessingTimeLedger::new();
    for action in pipeline.actions() {
        ledger.record(&action.name, 25);
    }
    ledger
}

fn bench_record(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger_record");

    let ledger = ProcessingTimeLedger::new();
    ledger.record("DETECT", 10);
    group.bench_function("accumulate", |b| {
        b.iter(|| ledger.record(black_box("DETECT"), black_box(5)));
    });

    let poisoned = ProcessingTimeLedger::new();
    poisoned.record("DETECT", -1);
    group.bench_function("poisoned", |b| {
        b.iter(|| poisoned.record(black_box("DETECT"), black_box(5)));
    });

    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger_lookup");

    let pipeline = pipeline_with(8);
    let ledger = measured_ledger(&pipeline);

    group.bench_function("time/hit", |b| {
        b.iter(|| ledger.time(black_box("ACTION 3")));
    });

    group.bench_function("time/miss", |b| {
        b.iter(|| ledger.time(black_box("NO SUCH ACTION")));
    });

    group.finish();
}

fn bench_total(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger_total");

    for n in [2usize, 8, 32] {
        let pipeline = pipeline_with(n);
        let ledger = measured_ledger(&pipeline);
        group.bench_with_input(
            BenchmarkId::new("measured", format!("{n}_actions")),
            &(&ledger, &pipeline),
            |b, (ledger, pipeline)| {
                b.iter(|| ledger.total(black_box(pipeline)));
            },
        );
    }

    // A poisoned action short-circuits the aggregate.
    let pipeline = pipeline_with(32);
    let ledger = measured_ledger(&pipeline);
    ledger.record("ACTION 0", -1);
    group.bench_with_input(
        BenchmarkId::new("poisoned", "32_actions"),
        &(&ledger, &pipeline),
        |b, (ledger, pipeline)| {
            b.iter(|| ledger.total(black_box(pipeline)));
        },
    );

    group.finish();
}

criterion_group!(benches, bench_record, bench_lookup, bench_total);
criterion_main!(benches);
