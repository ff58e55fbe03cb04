//! # Certificate Benchmarks
//!
//! Cost of mapping free parameters to the certified matrix set
//! (`H = XᵀX + εI`, block extraction, conditioning check, `E⁻¹`).
//!
//! Run: `cargo bench --bench certificate_bench`

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::StdRng;
use ren_core::prelude::*;

fn setup(n: usize, l: usize) -> (Certificate, FreeParameters) {
    let dims = Dimensions::new(1, 1, n, l);
    let mut rng = StdRng::seed_from_u64(42);
    let params = FreeParameters::random(&dims, 0.5, &mut rng).expect("valid std");
    (Certificate::new(dims, 1e-3, 1.0), params)
}

/// Benchmark derivation for growing state / nonlinearity sizes
fn bench_derive(c: &mut Criterion) {
    let mut group = c.benchmark_group("certificate_derive");

    for &(n, l) in &[(2, 2), (8, 8), (16, 16), (32, 32)] {
        let (cert, params) = setup(n, l);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("n{}_l{}", n, l)),
            &params,
            |b, params| b.iter(|| black_box(cert.derive(black_box(params)))),
        );
    }

    group.finish();
}

/// Benchmark the diagnostics used by `ren inspect`
fn bench_report(c: &mut Criterion) {
    let (cert, params) = setup(16, 16);
    let derived = cert.derive(&params).expect("certified");

    c.bench_function("certificate_report_n16_l16", |b| {
        b.iter(|| black_box(derived.report()))
    });
}

criterion_group!(benches, bench_derive, bench_report);
criterion_main!(benches);
