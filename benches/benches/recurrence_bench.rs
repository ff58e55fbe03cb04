//! # Recurrence Benchmarks
//!
//! One batched step (triangular equilibrium solve + state update) and full
//! sequence runs through `ContractiveRen::run`.
//!
//! Run: `cargo bench --bench recurrence_bench`

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use nalgebra::DMatrix;
use ren_core::prelude::*;

fn model(n: usize, l: usize) -> ContractiveRen {
    ContractiveRen::new(RenConfig::new(Dimensions::new(2, 2, n, l)).with_seed(7)).expect("valid config")
}

/// Benchmark a single engine step for growing batch sizes
fn bench_engine_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_step");
    let ren = model(16, 16);
    let derived = ren.derive().expect("certified");
    let engine = Engine::new(ren.parameters(), &derived, OutputAlignment::PostUpdate);

    for &batch in &[1usize, 16, 128] {
        let x = DMatrix::from_element(16, batch, 0.1);
        let u = DMatrix::from_element(2, batch, 0.5);
        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(BenchmarkId::from_parameter(batch), &batch, |b, _| {
            b.iter(|| black_box(engine.step(black_box(&x), black_box(&u))))
        });
    }

    group.finish();
}

/// Benchmark the equilibrium solve alone
fn bench_equilibrium(c: &mut Criterion) {
    let mut group = c.benchmark_group("equilibrium_solve");

    for &l in &[4usize, 16, 64] {
        let ren = model(8, l);
        let derived = ren.derive().expect("certified");
        let engine = Engine::new(ren.parameters(), &derived, OutputAlignment::PostUpdate);
        let x = DMatrix::from_element(8, 32, 0.1);
        let u = DMatrix::from_element(2, 32, 0.5);
        group.bench_with_input(BenchmarkId::from_parameter(l), &l, |b, _| {
            b.iter(|| black_box(engine.solve_equilibrium(black_box(&x), black_box(&u)).unwrap()))
        });
    }

    group.finish();
}

/// Benchmark full sequence runs (derivation included)
fn bench_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequence_run");

    for &horizon in &[10usize, 100, 1000] {
        let mut ren = model(8, 8);
        let inputs = SequenceBatch::zeros(16, horizon, 2);
        group.throughput(Throughput::Elements((16 * horizon) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(horizon), &inputs, |b, inputs| {
            b.iter(|| black_box(ren.run(black_box(inputs))))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_engine_step, bench_equilibrium, bench_run);
criterion_main!(benches);
