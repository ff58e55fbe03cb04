//! # ren-sysid - System Identification with Contractive RENs
//!
//! Fits a [`ContractiveRen`](ren_core::ContractiveRen) to recorded
//! input/output trajectories.
//!
//! ## Features
//!
//! - **dataset**: paired trajectories, seeded train/validation/test split, mini-batches
//! - **loss**: MSE / MAE over `(batch, time, feature)`
//! - **optim**: SGD, Adam, gradient clipping over named free parameters
//! - **gradient**: `GradientEstimator` trait, central finite differences
//! - **closed_loop**: REN in feedback with a `Controller`
//! - **trainer**: epoch loop with per-epoch training and validation loss

pub mod error;
pub use error::{SysIdError, SysIdResult};

pub mod dataset;
pub use dataset::{DatasetSplit, SysIdDataset, gaussian_inputs};

pub mod loss;
pub use loss::{LossKind, mae, mse, sequence_loss};

pub mod optim;
pub use optim::{Adam, AdamConfig, clip_grad_norm, grad_norm, sgd_step};

pub mod gradient;
pub use gradient::{FiniteDifference, GradientEstimator, LossGradient};

pub mod closed_loop;
pub use closed_loop::{ClosedLoopRen, ClosedLoopTrajectory, Controller, LinearController};

pub mod trainer;
pub use trainer::{Trainer, TrainerConfig, TrainingHistory};

/// Prelude module with common re-exports
pub mod prelude {
    pub use crate::closed_loop::{ClosedLoopRen, Controller, LinearController};
    pub use crate::dataset::{DatasetSplit, SysIdDataset};
    pub use crate::error::{SysIdError, SysIdResult};
    pub use crate::gradient::{FiniteDifference, GradientEstimator};
    pub use crate::loss::LossKind;
    pub use crate::optim::Adam;
    pub use crate::trainer::{Trainer, TrainerConfig, TrainingHistory};
    pub use ren_core::prelude::*;
}
