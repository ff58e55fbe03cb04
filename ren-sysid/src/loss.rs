//! # Loss Functions
//!
//! | Function | Description |
//! |----------|-------------|
//! | `mse` | Mean Squared Error over batch, time and feature |
//! | `mae` | Mean Absolute Error over batch, time and feature |
//! | `sequence_loss` | Runs a model over a dataset and scores it |

use ren_core::{ContractiveRen, SequenceBatch};

use crate::dataset::SysIdDataset;
use crate::error::{SysIdError, SysIdResult};

/// Loss used to score predictions against targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LossKind {
    #[default]
    Mse,
    Mae,
}

impl LossKind {
    pub fn evaluate(&self, pred: &SequenceBatch, target: &SequenceBatch) -> SysIdResult<f64> {
        match self {
            LossKind::Mse => mse(pred, target),
            LossKind::Mae => mae(pred, target),
        }
    }
}

/// Empty batches agree with each other whatever their recorded width, since
/// nested-array JSON cannot carry the width of an empty horizon
fn check_shapes(pred: &SequenceBatch, target: &SequenceBatch) -> SysIdResult<()> {
    if pred.as_slice().is_empty() && target.as_slice().is_empty() {
        return Ok(());
    }
    if pred.shape() != target.shape() {
        return Err(SysIdError::InvalidDataset(format!(
            "prediction shape {:?} differs from target shape {:?}",
            pred.shape(),
            target.shape()
        )));
    }
    Ok(())
}

/// Mean Squared Error: (1/N) Σ (ŷ - y)²
///
/// Zero for empty batches.
pub fn mse(pred: &SequenceBatch, target: &SequenceBatch) -> SysIdResult<f64> {
    check_shapes(pred, target)?;
    let n = pred.as_slice().len();
    if n == 0 {
        return Ok(0.0);
    }
    let sum: f64 = pred
        .as_slice()
        .iter()
        .zip(target.as_slice())
        .map(|(p, t)| (p - t) * (p - t))
        .sum();
    Ok(sum / n as f64)
}

/// Mean Absolute Error: (1/N) Σ |ŷ - y|
pub fn mae(pred: &SequenceBatch, target: &SequenceBatch) -> SysIdResult<f64> {
    check_shapes(pred, target)?;
    let n = pred.as_slice().len();
    if n == 0 {
        return Ok(0.0);
    }
    let sum: f64 = pred
        .as_slice()
        .iter()
        .zip(target.as_slice())
        .map(|(p, t)| (p - t).abs())
        .sum();
    Ok(sum / n as f64)
}

/// Resets the model, runs it over `data.inputs()` and scores against `data.outputs()`
pub fn sequence_loss(
    model: &mut ContractiveRen,
    data: &SysIdDataset,
    kind: LossKind,
) -> SysIdResult<f64> {
    let pred = model.run(data.inputs())?;
    kind.evaluate(&pred, data.outputs())
}
