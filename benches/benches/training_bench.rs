//! # Training Benchmarks
//!
//! Finite-difference gradient estimation and a single Adam update on a
//! small identification problem.
//!
//! Run: `cargo bench --bench training_bench`

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::StdRng;
use ren_core::prelude::*;
use ren_sysid::{Adam, FiniteDifference, GradientEstimator, LossKind, SysIdDataset, gaussian_inputs};

fn problem() -> (ContractiveRen, SysIdDataset) {
    let dims = Dimensions::new(1, 1, 2, 2);
    let mut system = ContractiveRen::new(RenConfig::new(dims).with_seed(1)).expect("valid config");
    let mut rng = StdRng::seed_from_u64(2);
    let inputs = gaussian_inputs(8, 20, 1, 1.0, &mut rng).expect("valid std");
    let data = SysIdDataset::simulate(&mut system, inputs).expect("simulated");
    let model = ContractiveRen::new(RenConfig::new(dims).with_seed(3)).expect("valid config");
    (model, data)
}

fn bench_finite_difference(c: &mut Criterion) {
    let (mut model, data) = problem();
    let mut estimator = FiniteDifference::default();

    c.bench_function("finite_difference_gradient", |b| {
        b.iter(|| black_box(estimator.loss_and_gradient(&mut model, &data, LossKind::Mse)))
    });
}

fn bench_adam_step(c: &mut Criterion) {
    let (mut model, data) = problem();
    let grads = FiniteDifference::default()
        .loss_and_gradient(&mut model, &data, LossKind::Mse)
        .expect("gradient")
        .gradient;
    let mut adam = Adam::with_learning_rate(1e-3);

    c.bench_function("adam_step", |b| {
        b.iter(|| black_box(adam.step(model.parameters_mut(), &grads)))
    });
}

criterion_group!(benches, bench_finite_difference, bench_adam_step);
criterion_main!(benches);
