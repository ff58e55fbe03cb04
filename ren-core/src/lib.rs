//! # ren-core - Contractive Recurrent Equilibrium Networks
//!
//! Discrete-time nonlinear dynamical models whose contraction is guaranteed
//! by construction: any real value of the free parameters maps to a model in
//! which two trajectories driven by the same input converge geometrically.
//!
//! ## Modules
//!
//! - [`config`]: `RenConfig`, dimensions, initial-state choice (TOML)
//! - [`params`]: free parameters `X, Y, B2, C2, D21, D22, D12`
//! - [`certificate`]: free parameters → certified matrices (`H`, `E⁻¹`, `Λ`, ...)
//! - [`engine`]: one time step, triangular equilibrium solve
//! - [`model`]: stateful `ContractiveRen` with `reset`, `step`, `run`
//! - [`tensor`]: `(batch, time, dim)` sequence batches
//! - [`checkpoint`]: JSON persistence
//!
//! ## Quick Start
//!
//! ```
//! use ren_core::prelude::*;
//!
//! let config = RenConfig::new(Dimensions::new(1, 1, 4, 4)).with_seed(7);
//! let mut model = ContractiveRen::new(config).unwrap();
//!
//! let inputs = SequenceBatch::zeros(2, 10, 1);
//! let outputs = model.run(&inputs).unwrap();
//! assert_eq!(outputs.shape(), (2, 10, 1));
//! ```

pub mod error;
pub use error::{RenError, Result};

pub mod linalg;

pub mod config;
pub use config::{Dimensions, InitialState, OutputAlignment, RenConfig};

pub mod params;
pub use params::{FreeParameters, PARAMETER_NAMES, parameter_shapes};

pub mod certificate;
pub use certificate::{Certificate, CertificateReport, DerivedMatrices};

pub mod engine;
pub use engine::{Engine, StepOutput};

pub mod tensor;
pub use tensor::SequenceBatch;

pub mod model;
pub use model::ContractiveRen;

pub mod checkpoint;
pub use checkpoint::{CHECKPOINT_VERSION, Checkpoint, InitialPair, NamedMatrix};

/// Prelude module with common re-exports
pub mod prelude {
    pub use crate::certificate::{Certificate, CertificateReport, DerivedMatrices};
    pub use crate::checkpoint::Checkpoint;
    pub use crate::config::{Dimensions, InitialState, OutputAlignment, RenConfig};
    pub use crate::engine::{Engine, StepOutput};
    pub use crate::error::{RenError, Result};
    pub use crate::model::ContractiveRen;
    pub use crate::params::FreeParameters;
    pub use crate::tensor::SequenceBatch;
}

#[cfg(test)]
mod tests;
