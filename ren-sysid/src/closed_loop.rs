//! # Closed-Loop Simulation
//!
//! A REN in feedback with a controller. The recorded signals follow the
//! same time convention as [`ContractiveRen::run`], so closed-loop data can
//! be scored against the plant directly.
//!
//! Post-update alignment (the output at time 0 is `y_init`):
//!
//! ```text
//! y_0       = y_init
//! u_K,t     = K(y_t)
//! u_t       = u_ext,t − u_K,t
//! y_t+1     = REN.step(u_t)             t = 0..T-2
//! ```
//!
//! Pre-update alignment (the output at time t reads input t):
//!
//! ```text
//! u_t       = u_ext,t − u_K,t           (u_K,0 = 0)
//! y_t       = REN.step(u_t)
//! u_K,t+1   = K(y_t)
//! ```
//!
//! Used to generate identification data under feedback and to evaluate an
//! identified plant inside the loop it was recorded in.

use nalgebra::DMatrix;
use ren_core::linalg::broadcast_columns;
use ren_core::{ContractiveRen, OutputAlignment, SequenceBatch};

use crate::error::{SysIdError, SysIdResult};

/// Output feedback law `u_K = K(y)`, batched over columns
pub trait Controller {
    /// Maps outputs (`p × B`) to control inputs (`m × B`)
    fn control(&mut self, y: &DMatrix<f64>) -> SysIdResult<DMatrix<f64>>;

    /// Clears internal state before a new trajectory
    fn reset(&mut self) {}
}

/// Static output feedback `u_K = K·y`
#[derive(Debug, Clone, PartialEq)]
pub struct LinearController {
    /// `m × p`
    pub gain: DMatrix<f64>,
}

impl LinearController {
    pub fn new(gain: DMatrix<f64>) -> Self {
        Self { gain }
    }

    /// `K = k·I` for square loops
    pub fn scalar(dim: usize, k: f64) -> Self {
        Self::new(DMatrix::identity(dim, dim) * k)
    }
}

impl Controller for LinearController {
    fn control(&mut self, y: &DMatrix<f64>) -> SysIdResult<DMatrix<f64>> {
        if y.nrows() != self.gain.ncols() {
            return Err(SysIdError::InvalidConfig(format!(
                "controller gain expects {} outputs, got {}",
                self.gain.ncols(),
                y.nrows()
            )));
        }
        Ok(&self.gain * y)
    }
}

/// Signals recorded around the loop, all `(batch, T, ·)`
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedLoopTrajectory {
    /// `u_t` actually applied to the REN
    pub plant_inputs: SequenceBatch,
    pub outputs: SequenceBatch,
}

/// REN driven through a feedback controller
#[derive(Debug, Clone)]
pub struct ClosedLoopRen<C: Controller> {
    pub model: ContractiveRen,
    pub controller: C,
}

impl<C: Controller> ClosedLoopRen<C> {
    pub fn new(model: ContractiveRen, controller: C) -> Self {
        Self { model, controller }
    }

    /// Runs the loop over external inputs `(batch, T, m)`
    pub fn run(&mut self, external: &SequenceBatch) -> SysIdResult<ClosedLoopTrajectory> {
        let dims = *self.model.dimensions();
        let (batch, horizon, dim) = external.shape();
        if batch > 0 && horizon > 0 && dim != dims.input {
            return Err(SysIdError::InvalidDataset(format!(
                "external input width {} differs from model input {}",
                dim, dims.input
            )));
        }

        self.model.reset();
        self.controller.reset();

        let mut plant_inputs = SequenceBatch::zeros(batch, horizon, dims.input);
        let mut outputs = SequenceBatch::zeros(batch, horizon, dims.output);
        if batch == 0 || horizon == 0 {
            return Ok(ClosedLoopTrajectory {
                plant_inputs,
                outputs,
            });
        }

        match self.model.output_alignment() {
            OutputAlignment::PostUpdate => {
                let mut y = broadcast_columns(self.model.y_init(), batch);
                outputs.set_time_slice(0, &y)?;
                for t in 0..horizon {
                    let u_k = self.feedback(&y, dims.input, batch)?;
                    let u = external.time_slice(t) - &u_k;
                    plant_inputs.set_time_slice(t, &u)?;
                    if t + 1 < horizon {
                        y = self.model.step(&u)?;
                        outputs.set_time_slice(t + 1, &y)?;
                    }
                }
            }
            OutputAlignment::PreUpdate => {
                let mut u_k = DMatrix::zeros(dims.input, batch);
                for t in 0..horizon {
                    let u = external.time_slice(t) - &u_k;
                    let y = self.model.step(&u)?;
                    plant_inputs.set_time_slice(t, &u)?;
                    outputs.set_time_slice(t, &y)?;
                    u_k = self.feedback(&y, dims.input, batch)?;
                }
            }
        }

        Ok(ClosedLoopTrajectory {
            plant_inputs,
            outputs,
        })
    }

    fn feedback(&mut self, y: &DMatrix<f64>, input: usize, batch: usize) -> SysIdResult<DMatrix<f64>> {
        let u_k = self.controller.control(y)?;
        if u_k.shape() != (input, batch) {
            return Err(SysIdError::InvalidConfig(format!(
                "controller returned {:?}, expected {:?}",
                u_k.shape(),
                (input, batch)
            )));
        }
        Ok(u_k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ren_core::{Dimensions, RenConfig};

    fn model() -> ContractiveRen {
        ContractiveRen::new(RenConfig::new(Dimensions::new(1, 1, 3, 3)).with_seed(8)).unwrap()
    }

    #[test]
    fn test_zero_gain_matches_open_loop_run() {
        let mut open = model();
        let mut closed = ClosedLoopRen::new(model(), LinearController::scalar(1, 0.0));

        let external = SequenceBatch::new(2, 4, 1, vec![0.5, -0.2, 0.1, 0.9, 1.0, 0.0, -1.0, 0.3]).unwrap();
        let traj = closed.run(&external).unwrap();
        assert_eq!(traj.plant_inputs, external);
        assert_eq!(traj.outputs.get(0, 0, 0), open.y_init()[0]);

        let expected = open.run(&external).unwrap();
        for t in 0..4 {
            assert!((expected.time_slice(t) - traj.outputs.time_slice(t)).amax() < 1e-12, "t = {}", t);
        }
    }

    #[test]
    fn test_feedback_subtracts_current_output() {
        let k = 0.7;
        let mut closed = ClosedLoopRen::new(model(), LinearController::scalar(1, k));
        let external = SequenceBatch::new(1, 5, 1, vec![1.0, 0.5, 0.0, -0.5, -1.0]).unwrap();
        let traj = closed.run(&external).unwrap();

        for t in 0..5 {
            let expected = external.get(0, t, 0) - k * traj.outputs.get(0, t, 0);
            assert!((traj.plant_inputs.get(0, t, 0) - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_pre_update_loop_feeds_back_previous_output() {
        let config = RenConfig::new(Dimensions::new(1, 1, 3, 3))
            .with_seed(8)
            .with_output_alignment(OutputAlignment::PreUpdate);
        let k = 0.4;
        let mut closed = ClosedLoopRen::new(ContractiveRen::new(config).unwrap(), LinearController::scalar(1, k));
        let external = SequenceBatch::new(1, 4, 1, vec![1.0, -1.0, 0.5, 0.2]).unwrap();
        let traj = closed.run(&external).unwrap();

        assert_eq!(traj.plant_inputs.get(0, 0, 0), 1.0);
        for t in 1..4 {
            let expected = external.get(0, t, 0) - k * traj.outputs.get(0, t - 1, 0);
            assert!((traj.plant_inputs.get(0, t, 0) - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_gain_shape_checked() {
        let mut closed = ClosedLoopRen::new(model(), LinearController::new(DMatrix::zeros(1, 2)));
        let external = SequenceBatch::zeros(1, 3, 1);
        assert!(closed.run(&external).is_err());
    }
}
