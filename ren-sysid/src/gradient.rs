//! # Gradient Estimation
//!
//! Training only needs `∂loss/∂θ` for the free parameters. The estimator is
//! a trait so an analytic or adjoint implementation can replace the
//! finite-difference one without touching the trainer.

use nalgebra::DVector;
use ren_core::{ContractiveRen, FreeParameters};

use crate::dataset::SysIdDataset;
use crate::error::SysIdResult;
use crate::loss::{LossKind, sequence_loss};

/// Loss value and gradient for one batch
#[derive(Debug, Clone, PartialEq)]
pub struct LossGradient {
    pub loss: f64,
    /// Same shapes as the model parameters
    pub gradient: FreeParameters,
}

/// Source of parameter gradients
pub trait GradientEstimator {
    /// Loss at the current parameters and its gradient
    ///
    /// Parameters must be left as they were found.
    fn loss_and_gradient(
        &mut self,
        model: &mut ContractiveRen,
        batch: &SysIdDataset,
        loss: LossKind,
    ) -> SysIdResult<LossGradient>;
}

/// Central differences over the flat parameter vector
///
/// Costs `2·P + 1` sequence runs for `P` scalar parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FiniteDifference {
    pub step: f64,
}

impl Default for FiniteDifference {
    fn default() -> Self {
        Self { step: 1e-6 }
    }
}

impl FiniteDifference {
    pub fn new(step: f64) -> Self {
        Self { step }
    }

    /// Fills `grad`; the model is left at a perturbed point and must be restored
    fn central_differences(
        &self,
        model: &mut ContractiveRen,
        batch: &SysIdDataset,
        loss: LossKind,
        theta: &DVector<f64>,
        grad: &mut DVector<f64>,
    ) -> SysIdResult<()> {
        let mut probe = theta.clone();
        for k in 0..theta.len() {
            probe[k] = theta[k] + self.step;
            model.parameters_mut().set_flat(&probe)?;
            let plus = sequence_loss(model, batch, loss)?;

            probe[k] = theta[k] - self.step;
            model.parameters_mut().set_flat(&probe)?;
            let minus = sequence_loss(model, batch, loss)?;

            probe[k] = theta[k];
            grad[k] = (plus - minus) / (2.0 * self.step);
        }
        Ok(())
    }
}

impl GradientEstimator for FiniteDifference {
    fn loss_and_gradient(
        &mut self,
        model: &mut ContractiveRen,
        batch: &SysIdDataset,
        loss: LossKind,
    ) -> SysIdResult<LossGradient> {
        let theta = model.parameters().to_flat();
        let base = sequence_loss(model, batch, loss)?;

        let mut grad = DVector::zeros(theta.len());
        let result = self.central_differences(model, batch, loss, &theta, &mut grad);

        model.parameters_mut().set_flat(&theta)?;
        result?;

        let mut gradient = model.parameters().clone();
        gradient.set_flat(&grad)?;
        Ok(LossGradient {
            loss: base,
            gradient,
        })
    }
}
