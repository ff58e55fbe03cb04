//! Integrated tests for ren-core

use crate::linalg::quadratic_form;
use crate::*;
use nalgebra::DMatrix;
use rand::SeedableRng;
use rand::rngs::StdRng;

fn random_inputs(batch: usize, horizon: usize, dim: usize, seed: u64) -> SequenceBatch {
    let mut rng = StdRng::seed_from_u64(seed);
    let m = linalg::random_normal(1, batch * horizon * dim, 1.0, &mut rng).unwrap();
    SequenceBatch::new(batch, horizon, dim, m.as_slice().to_vec()).unwrap()
}

#[test]
fn test_least_squares_initial_state() {
    let config = RenConfig::new(Dimensions::new(2, 1, 3, 4))
        .with_seed(21)
        .with_initial_state(InitialState::LeastSquares { target: vec![0.75] });
    let mut model = ContractiveRen::new(config).unwrap();

    // One output row, three states: C2 has full row rank
    assert!((model.y_init()[0] - 0.75).abs() < 1e-9);

    let out = model.run(&random_inputs(3, 6, 2, 1)).unwrap();
    for b in 0..3 {
        assert_eq!(out.get(b, 0, 0), model.y_init()[0]);
    }

    model.reset();
    assert_eq!(model.state().column(0).into_owned(), *model.x_init());
}

#[test]
fn test_run_length_and_first_output() {
    let config = RenConfig::new(Dimensions::new(2, 3, 4, 5)).with_seed(22);
    let mut model = ContractiveRen::new(config).unwrap();
    let out = model.run(&random_inputs(4, 9, 2, 2)).unwrap();

    assert_eq!(out.shape(), (4, 9, 3));
    for b in 0..4 {
        for k in 0..3 {
            assert_eq!(out.get(b, 0, k), model.y_init()[k]);
        }
    }
    assert!(out.is_finite());
}

#[test]
fn test_last_input_never_read() {
    let config = RenConfig::new(Dimensions::new(1, 1, 3, 3)).with_seed(23);
    let mut model = ContractiveRen::new(config).unwrap();

    let a = random_inputs(2, 7, 1, 3);
    let mut b = a.clone();
    b.set(0, 6, 0, 100.0);
    b.set(1, 6, 0, -100.0);

    assert_eq!(model.run(&a).unwrap(), model.run(&b).unwrap());
}

#[test]
fn test_pre_update_consumes_every_input() {
    let config = RenConfig::new(Dimensions::new(1, 1, 3, 3))
        .with_seed(24)
        .with_output_alignment(OutputAlignment::PreUpdate);
    let mut model = ContractiveRen::new(config).unwrap();

    let inputs = random_inputs(1, 5, 1, 4);
    let out = model.run(&inputs).unwrap();

    let derived = model.derive().unwrap();
    let engine = Engine::new(model.parameters(), &derived, OutputAlignment::PreUpdate);
    let x0 = DMatrix::from_column_slice(3, 1, model.x_init().as_slice());
    let first = engine.step(&x0, &inputs.time_slice(0)).unwrap();
    assert!((out.get(0, 0, 0) - first.output[(0, 0)]).abs() < 1e-12);

    // Output at the last instant depends on the last input
    let mut changed = inputs.clone();
    changed.set(0, 4, 0, 50.0);
    let out2 = model.run(&changed).unwrap();
    assert_ne!(out.get(0, 4, 0), out2.get(0, 4, 0));
}

#[test]
fn test_run_matches_repeated_steps() {
    let config = RenConfig::new(Dimensions::new(2, 2, 3, 3)).with_seed(25);
    let mut model = ContractiveRen::new(config).unwrap();
    let inputs = random_inputs(2, 5, 2, 5);
    let out = model.run(&inputs).unwrap();

    model.reset();
    for t in 0..4 {
        let y = model.step(&inputs.time_slice(t)).unwrap();
        assert!((y - out.time_slice(t + 1)).amax() < 1e-12);
    }
}

#[test]
fn test_contraction_of_incremental_metric() {
    let rho = 4.0;
    for seed in 0..5 {
        let config = RenConfig::new(Dimensions::new(2, 1, 4, 6))
            .with_seed(100 + seed)
            .with_contraction_rate_lb(rho);
        let model = ContractiveRen::new(config).unwrap();
        let derived = model.derive().unwrap();
        let metric = derived.contraction_metric().unwrap();
        let engine = Engine::new(model.parameters(), &derived, OutputAlignment::PostUpdate);

        let mut rng = StdRng::seed_from_u64(seed);
        let mut xa = linalg::random_normal(4, 1, 3.0, &mut rng).unwrap();
        let mut xb = linalg::random_normal(4, 1, 3.0, &mut rng).unwrap();
        let inputs = random_inputs(1, 15, 2, seed);

        let mut v = quadratic_form(&metric, &(&xa - &xb))[0];
        for t in 0..15 {
            let u = inputs.time_slice(t);
            xa = engine.step(&xa, &u).unwrap().state;
            xb = engine.step(&xb, &u).unwrap().state;
            let next = quadratic_form(&metric, &(&xa - &xb))[0];
            assert!(
                next <= v / rho * (1.0 + 1e-9) + 1e-14,
                "seed {} t {}: {} > {} / {}",
                seed,
                t,
                next,
                v,
                rho
            );
            v = next;
        }
    }
}

#[test]
fn test_trajectories_forget_initial_state() {
    let config = RenConfig::new(Dimensions::new(1, 1, 3, 3))
        .with_seed(26)
        .with_contraction_rate_lb(2.0);
    let model = ContractiveRen::new(config).unwrap();
    let derived = model.derive().unwrap();
    let engine = Engine::new(model.parameters(), &derived, OutputAlignment::PostUpdate);

    let mut xa = DMatrix::from_element(3, 1, 5.0);
    let mut xb = DMatrix::from_element(3, 1, -5.0);
    let initial = (&xa - &xb).norm();
    let inputs = random_inputs(1, 200, 1, 6);
    for t in 0..200 {
        let u = inputs.time_slice(t);
        xa = engine.step(&xa, &u).unwrap().state;
        xb = engine.step(&xb, &u).unwrap().state;
    }
    assert!((&xa - &xb).norm() < initial * 1e-3);
}

#[test]
fn test_zero_input_holds_zero_output() {
    let config = RenConfig::new(Dimensions::new(1, 1, 2, 2)).with_seed(27);
    let mut model = ContractiveRen::new(config).unwrap();
    assert_eq!(model.y_init()[0], 0.0);

    let out = model.run(&SequenceBatch::zeros(1, 5, 1)).unwrap();
    assert_eq!(out.shape(), (1, 5, 1));
    for t in 0..5 {
        assert_eq!(out.get(0, t, 0), model.y_init()[0]);
    }
}

#[test]
fn test_engine_shared_across_threads() {
    let config = RenConfig::new(Dimensions::new(1, 1, 3, 3)).with_seed(28);
    let model = ContractiveRen::new(config).unwrap();
    let derived = model.derive().unwrap();
    let engine = Engine::new(model.parameters(), &derived, OutputAlignment::PostUpdate);

    let results: Vec<DMatrix<f64>> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|k| {
                s.spawn(move || {
                    let u = DMatrix::from_element(1, 1, k as f64 * 0.1);
                    engine.step(&DMatrix::zeros(3, 1), &u).map(|o| o.output)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect()
    });

    let batched = engine
        .step(&DMatrix::zeros(3, 4), &DMatrix::from_fn(1, 4, |_, k| k as f64 * 0.1))
        .unwrap();
    for (k, y) in results.iter().enumerate() {
        assert!((y[(0, 0)] - batched.output[(0, k)]).abs() < 1e-12);
    }
}

#[test]
fn test_checkpoint_file_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.json");

    let config = RenConfig::new(Dimensions::new(2, 1, 3, 3))
        .with_seed(29)
        .with_initial_state(InitialState::LeastSquares { target: vec![0.3] });
    let mut model = ContractiveRen::new(config).unwrap();

    // Parameters moved after construction: x_init still refers to the old C2
    model.parameters_mut().c2[(0, 0)] += 0.5;
    let inputs = random_inputs(2, 6, 2, 7);
    let before = model.run(&inputs).unwrap();
    model.save(&path).unwrap();

    let mut restored = ContractiveRen::load(&path).unwrap();
    assert_eq!(restored.parameters(), model.parameters());
    assert_eq!(restored.x_init(), model.x_init());
    assert_eq!(restored.y_init(), model.y_init());
    assert_eq!(restored.run(&inputs).unwrap(), before);
}

#[test]
fn test_malformed_parameters_fail_without_panicking() {
    let mut model = ContractiveRen::new(RenConfig::new(Dimensions::new(1, 1, 2, 2)).with_seed(30)).unwrap();
    model.parameters_mut().d12 = DMatrix::zeros(1, 1);

    let step = model.step(&DMatrix::zeros(1, 1));
    assert!(matches!(step, Err(RenError::ShapeMismatch { .. })));
    let run = model.run(&random_inputs(1, 3, 1, 8));
    assert!(matches!(run, Err(RenError::ShapeMismatch { .. })));
}

#[test]
fn test_config_file_builds_model() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ren.toml");
    std::fs::write(
        &path,
        r#"
contraction_rate_lb = 2.0
seed = 3

[dimensions]
input = 1
output = 2
internal = 3
nonlinear = 4

[initial_state]
kind = "explicit"
state = [0.1, 0.2, 0.3]
"#,
    )
    .unwrap();

    let config = RenConfig::from_file(&path).unwrap();
    let model = ContractiveRen::new(config).unwrap();
    assert_eq!(model.parameters().x.shape(), (10, 10));
    assert_eq!(model.x_init().as_slice(), &[0.1, 0.2, 0.3]);
    assert_eq!(model.certificate().contraction_rate_lb, 2.0);
}
