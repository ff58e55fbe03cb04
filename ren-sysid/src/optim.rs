//! # Optimization Algorithms
//!
//! SGD and Adam over the named free parameters of a REN, plus gradient
//! clipping. Gradients are carried in a [`FreeParameters`] value with the
//! same shapes as the parameters they update.

use nalgebra::DMatrix;
use ren_core::FreeParameters;
use serde::{Deserialize, Serialize};

use crate::error::{SysIdError, SysIdResult};

/// SGD step: θ = θ - lr * ∇θ
pub fn sgd_step(
    params: &mut FreeParameters,
    gradients: &FreeParameters,
    learning_rate: f64,
) -> SysIdResult<()> {
    check_gradients(params, gradients)?;
    for ((_, p), (_, g)) in params.named_mut().into_iter().zip(gradients.named()) {
        *p -= g * learning_rate;
    }
    Ok(())
}

/// Global L2 norm over every gradient entry
pub fn grad_norm(gradients: &FreeParameters) -> f64 {
    gradients
        .named()
        .iter()
        .map(|(_, g)| g.norm_squared())
        .sum::<f64>()
        .sqrt()
}

/// Gradient clipping by global norm
pub fn clip_grad_norm(gradients: &mut FreeParameters, max_norm: f64) {
    let norm = grad_norm(gradients);
    if norm > max_norm && norm > 0.0 {
        let scale = max_norm / norm;
        for (_, g) in gradients.named_mut() {
            *g *= scale;
        }
    }
}

/// Every gradient must match its parameter's shape; nothing is updated otherwise
fn check_gradients(params: &FreeParameters, gradients: &FreeParameters) -> SysIdResult<()> {
    for ((name, p), (_, g)) in params.named().into_iter().zip(gradients.named()) {
        if p.shape() != g.shape() {
            return Err(SysIdError::InvalidConfig(format!(
                "gradient for {} has shape {:?}, parameter has {:?}",
                name,
                g.shape(),
                p.shape()
            )));
        }
    }
    Ok(())
}

/// Adam hyper-parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdamConfig {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub eps: f64,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-3,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
        }
    }
}

/// Adam optimizer with per-parameter first and second moments
#[derive(Debug, Clone)]
pub struct Adam {
    config: AdamConfig,
    /// `(m, v)` per parameter in canonical order, allocated on the first step
    /// and again whenever the parameter shapes change
    moments: Vec<(DMatrix<f64>, DMatrix<f64>)>,
    t: usize,
}

impl Adam {
    pub fn new(config: AdamConfig) -> Self {
        Self {
            config,
            moments: Vec::new(),
            t: 0,
        }
    }

    pub fn with_learning_rate(learning_rate: f64) -> Self {
        Self::new(AdamConfig {
            learning_rate,
            ..AdamConfig::default()
        })
    }

    pub fn config(&self) -> &AdamConfig {
        &self.config
    }

    /// Number of steps taken
    pub fn steps(&self) -> usize {
        self.t
    }

    pub fn reset(&mut self) {
        self.moments.clear();
        self.t = 0;
    }

    /// One Adam step with bias correction
    pub fn step(&mut self, params: &mut FreeParameters, gradients: &FreeParameters) -> SysIdResult<()> {
        check_gradients(params, gradients)?;
        let fits = self.moments.len() == params.named().len()
            && self
                .moments
                .iter()
                .zip(params.named())
                .all(|((m, _), (_, p))| m.shape() == p.shape());
        if !fits {
            // A differently shaped parameter set starts from fresh moments
            self.t = 0;
            self.moments = params
                .named()
                .into_iter()
                .map(|(_, p)| {
                    (
                        DMatrix::zeros(p.nrows(), p.ncols()),
                        DMatrix::zeros(p.nrows(), p.ncols()),
                    )
                })
                .collect();
        }

        let AdamConfig {
            learning_rate,
            beta1,
            beta2,
            eps,
        } = self.config;

        self.t += 1;
        let bias1 = 1.0 - beta1.powi(self.t as i32);
        let bias2 = 1.0 - beta2.powi(self.t as i32);

        for (((_, p), (_, g)), (m, v)) in params
            .named_mut()
            .into_iter()
            .zip(gradients.named())
            .zip(self.moments.iter_mut())
        {
            *m = &*m * beta1 + g * (1.0 - beta1);
            *v = &*v * beta2 + g.component_mul(g) * (1.0 - beta2);

            for ((pi, mi), vi) in p.iter_mut().zip(m.iter()).zip(v.iter()) {
                let m_hat = mi / bias1;
                let v_hat = vi / bias2;
                *pi -= learning_rate * m_hat / (v_hat.sqrt() + eps);
            }
        }
        Ok(())
    }
}
