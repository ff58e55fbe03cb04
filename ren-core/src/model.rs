//! Stateful contractive REN and sequence runner
//!
//! `ContractiveRen` owns the free parameters, the immutable `x_init`/`y_init`
//! pair and the current state. It is a thin single-writer wrapper around
//! [`Engine`]: every `step` re-derives the certified matrices from the
//! current parameters before running the recurrence, so parameter writes
//! from an optimizer are never observed through stale matrices.

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::certificate::{Certificate, DerivedMatrices};
use crate::config::{Dimensions, InitialState, OutputAlignment, RenConfig};
use crate::engine::Engine;
use crate::error::{RenError, Result};
use crate::linalg::{broadcast_columns, lstsq, shape_of};
use crate::params::{FreeParameters, parameter_shapes};
use crate::tensor::SequenceBatch;

/// Contractive recurrent equilibrium network
#[derive(Debug, Clone)]
pub struct ContractiveRen {
    config: RenConfig,
    params: FreeParameters,
    x_init: DVector<f64>,
    y_init: DVector<f64>,
    /// Current state, one column per batch entry (`n × B`)
    state: DMatrix<f64>,
}

impl ContractiveRen {
    /// Builds a model with Gaussian parameters (seeded from `config.seed` when set)
    pub fn new(config: RenConfig) -> Result<Self> {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(config, &mut rng)
    }

    /// Builds a model drawing its parameters from `rng`
    pub fn with_rng<R: Rng + ?Sized>(config: RenConfig, rng: &mut R) -> Result<Self> {
        config.validate()?;
        let params = FreeParameters::random(&config.dimensions, config.initialization_std, rng)?;
        Self::from_parameters(config, params)
    }

    /// Builds a model around existing parameters
    ///
    /// `x_init` is resolved against the `C2` given here and frozen.
    pub fn from_parameters(config: RenConfig, params: FreeParameters) -> Result<Self> {
        config.validate()?;
        params.validate(&config.dimensions)?;

        let x_init = resolve_initial_state(&config, &params.c2)?;
        let y_init = &params.c2 * &x_init;
        let state = broadcast_columns(&x_init, 1);

        debug!(
            dims = ?config.dimensions,
            initial_state = ?config.initial_state,
            "contractive REN constructed"
        );

        Ok(Self {
            config,
            params,
            x_init,
            y_init,
            state,
        })
    }

    /// Builds a model around existing parameters and a previously frozen
    /// `x_init`/`y_init` pair
    pub fn with_initial_pair(
        config: RenConfig,
        params: FreeParameters,
        x_init: DVector<f64>,
        y_init: DVector<f64>,
    ) -> Result<Self> {
        config.validate()?;
        params.validate(&config.dimensions)?;
        let dims = config.dimensions;
        if x_init.len() != dims.internal {
            return Err(RenError::shape("x_init", dims.internal, x_init.len()));
        }
        if y_init.len() != dims.output {
            return Err(RenError::shape("y_init", dims.output, y_init.len()));
        }

        let state = broadcast_columns(&x_init, 1);
        Ok(Self {
            config,
            params,
            x_init,
            y_init,
            state,
        })
    }

    pub fn config(&self) -> &RenConfig {
        &self.config
    }

    pub fn dimensions(&self) -> &Dimensions {
        &self.config.dimensions
    }

    pub fn output_alignment(&self) -> OutputAlignment {
        self.config.output_alignment
    }

    pub fn certificate(&self) -> Certificate {
        Certificate::from_config(&self.config)
    }

    pub fn parameters(&self) -> &FreeParameters {
        &self.params
    }

    /// Mutable access for optimizers; `x_init`/`y_init` are left untouched
    pub fn parameters_mut(&mut self) -> &mut FreeParameters {
        &mut self.params
    }

    /// Replaces all parameters after a shape check
    pub fn set_parameters(&mut self, params: FreeParameters) -> Result<()> {
        params.validate(&self.config.dimensions)?;
        self.params = params;
        Ok(())
    }

    /// Named, ordered parameter mapping (`X, Y, B2, C2, D21, D22, D12`)
    pub fn named_parameters(&self) -> Vec<(&'static str, &DMatrix<f64>)> {
        self.params.named()
    }

    /// Parameter shapes, for introspection and checkpointing
    pub fn parameter_shapes(&self) -> Vec<(&'static str, (usize, usize))> {
        parameter_shapes(&self.config.dimensions)
    }

    pub fn x_init(&self) -> &DVector<f64> {
        &self.x_init
    }

    pub fn y_init(&self) -> &DVector<f64> {
        &self.y_init
    }

    /// Current state (`n × B`)
    pub fn state(&self) -> &DMatrix<f64> {
        &self.state
    }

    /// Certified matrices for the current parameters
    pub fn derive(&self) -> Result<DerivedMatrices> {
        self.certificate().derive(&self.params)
    }

    /// `x ← x_init`
    pub fn reset(&mut self) {
        self.state = broadcast_columns(&self.x_init, 1);
    }

    /// One step for a batch of inputs (`m × B`), returns `p × B`
    ///
    /// A single-column state (right after `reset`) is broadcast over the batch.
    pub fn step(&mut self, u: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        let derived = self.derive()?;
        let engine = Engine::new(&self.params, &derived, self.config.output_alignment);

        let batch = u.ncols();
        let x = if self.state.ncols() == 1 && batch != 1 {
            broadcast_columns(&self.state.column(0).into_owned(), batch)
        } else if self.state.ncols() == batch {
            self.state.clone()
        } else {
            return Err(RenError::shape(
                "input batch",
                self.state.ncols(),
                batch,
            ));
        };

        let out = engine.step(&x, u)?;
        self.state = out.state;
        Ok(out.output)
    }

    /// Single-trajectory step
    pub fn step_vector(&mut self, u: &DVector<f64>) -> Result<DVector<f64>> {
        let u = DMatrix::from_column_slice(u.len(), 1, u.as_slice());
        let y = self.step(&u)?;
        Ok(DVector::from_column_slice(y.as_slice()))
    }

    /// Evaluates a full `(batch, T, m)` trajectory and returns `(batch, T, p)`
    ///
    /// With post-update alignment the output at time 0 is `y_init` and the
    /// input at `T-1` is never read: input `t` drives output `t+1`. With
    /// pre-update alignment input `t` drives output `t`.
    pub fn run(&mut self, inputs: &SequenceBatch) -> Result<SequenceBatch> {
        let (batch, horizon, dim) = inputs.shape();
        let dims = self.config.dimensions;
        if horizon > 0 && batch > 0 && dim != dims.input {
            return Err(RenError::shape(
                "run input",
                format!("(*, *, {})", dims.input),
                format!("({}, {}, {})", batch, horizon, dim),
            ));
        }

        self.reset();
        let mut outputs = SequenceBatch::zeros(batch, horizon, dims.output);
        if batch == 0 || horizon == 0 {
            return Ok(outputs);
        }

        let derived = self.derive()?;
        let engine = Engine::new(&self.params, &derived, self.config.output_alignment);
        let mut x = broadcast_columns(&self.x_init, batch);

        match self.config.output_alignment {
            OutputAlignment::PostUpdate => {
                outputs.set_time_slice(0, &broadcast_columns(&self.y_init, batch))?;
                for t in 0..horizon - 1 {
                    let out = engine.step(&x, &inputs.time_slice(t))?;
                    outputs.set_time_slice(t + 1, &out.output)?;
                    x = out.state;
                }
            }
            OutputAlignment::PreUpdate => {
                for t in 0..horizon {
                    let out = engine.step(&x, &inputs.time_slice(t))?;
                    outputs.set_time_slice(t, &out.output)?;
                    x = out.state;
                }
            }
        }

        debug!(batch, horizon, condition = derived.condition, "REN sequence evaluated");
        self.state = x;
        Ok(outputs)
    }
}

/// `x_init` for the configured initial-state choice
pub fn resolve_initial_state(config: &RenConfig, c2: &DMatrix<f64>) -> Result<DVector<f64>> {
    let n = config.dimensions.internal;
    match &config.initial_state {
        InitialState::Zero => Ok(DVector::zeros(n)),
        InitialState::Explicit { state } => {
            if state.len() != n {
                return Err(RenError::config(format!(
                    "initial state has length {}, expected {}",
                    state.len(),
                    n
                )));
            }
            Ok(DVector::from_column_slice(state))
        }
        InitialState::LeastSquares { target } => {
            if c2.ncols() != n {
                return Err(RenError::shape("C2", format!("(*, {})", n), shape_of(c2)));
            }
            lstsq(c2, &DVector::from_column_slice(target))
        }
    }
}
