//! Criterion benchmarks for the idle simulation engine.
//!
//! Three benchmark groups:
//! - `small_economy`: the village economy, ticked repeatedly
//! - `wide_economy`: 250 independent mine/smelter chains (1000 entities)
//! - `offline_progress`: one `advance()` covering 10_000 ticks in delta mode

use criterion::{Criterion, criterion_group, criterion_main};
use idle_core::sim::SimulationStrategy;
use idle_core::test_utils::*;

fn bench_small_economy(c: &mut Criterion) {
    let mut group = c.benchmark_group("small_economy");
    group.sample_size(50);

    let mut engine = village_engine();

    group.bench_function("village_step", |b| {
        b.iter(|| {
            engine.step().unwrap();
        });
    });

    group.finish();
}

fn bench_wide_economy(c: &mut Criterion) {
    let mut group = c.benchmark_group("wide_economy");
    group.sample_size(20);

    let mut engine = chain_engine(250, SimulationStrategy::Tick);

    group.bench_function("1000_entities_step", |b| {
        b.iter(|| {
            engine.step().unwrap();
        });
    });

    group.finish();
}

fn bench_offline_progress(c: &mut Criterion) {
    let mut group = c.benchmark_group("offline_progress");
    group.sample_size(10);

    group.bench_function("advance_10000_ticks", |b| {
        b.iter_batched(
            || chain_engine(10, SimulationStrategy::Delta { fixed_timestep: 1 }),
            |mut engine| {
                engine.advance(10_000).unwrap();
                engine
            },
            criterion::BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_small_economy,
    bench_wide_economy,
    bench_offline_progress
);
criterion_main!(benches);
