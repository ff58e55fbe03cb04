//! # Stability-Certified Parameterization
//!
//! Maps the free parameters to the matrices of a contracting REN:
//!
//! ```text
//! H   = XᵀX + ε·I                     (2n+l) × (2n+l), block sizes (n, l, n)
//! P   = H33        F  = H31           B1 = H32
//! E   = ½ (H11 + ρ·P + Y − Yᵀ)        E⁻¹
//! Λ   = ½ diag(H22)
//! D11 = −strict_lower(H22)            C1 = −H21
//! ```
//!
//! `H ≻ 0` holds for any real `X`, which makes the recursion contract with
//! `V(Δx) = Δxᵀ EᵀP⁻¹E Δx` shrinking by at least `1/ρ` per step. Nothing is
//! checked at runtime except the conditioning of `E`.
//!
//! The derived set is a value, recomputed from the current parameters on
//! every evaluation. Nothing here is cached on the model.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::{Dimensions, RenConfig};
use crate::error::{RenError, Result};
use crate::linalg::{condition_number, inverse_residual, min_symmetric_eigenvalue, strict_lower};
use crate::params::FreeParameters;

/// Settings of the convex reparameterization
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Certificate {
    pub dimensions: Dimensions,
    /// `ε`
    pub pos_def_tol: f64,
    /// `ρ`
    pub contraction_rate_lb: f64,
    /// Largest accepted `κ(E)`
    pub max_condition: f64,
}

/// Matrices derived from [`FreeParameters`]
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedMatrices {
    pub h: DMatrix<f64>,
    pub p: DMatrix<f64>,
    pub f: DMatrix<f64>,
    pub b1: DMatrix<f64>,
    pub e: DMatrix<f64>,
    pub e_inv: DMatrix<f64>,
    /// Diagonal of `Λ`
    pub lambda: DVector<f64>,
    pub d11: DMatrix<f64>,
    pub c1: DMatrix<f64>,
    /// `κ(E)` measured while inverting
    pub condition: f64,
}

/// Numerical health of a derived set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CertificateReport {
    /// Smallest eigenvalue of `H` (≥ ε in exact arithmetic)
    pub min_eigenvalue_h: f64,
    /// Smallest entry of `Λ`
    pub min_lambda: f64,
    /// `κ(E)`
    pub condition_e: f64,
    /// `‖E⁻¹E − I‖∞`
    pub inverse_residual: f64,
}

impl Certificate {
    pub fn new(dimensions: Dimensions, pos_def_tol: f64, contraction_rate_lb: f64) -> Self {
        Self {
            dimensions,
            pos_def_tol,
            contraction_rate_lb,
            max_condition: 1e12,
        }
    }

    pub fn from_config(config: &RenConfig) -> Self {
        Self {
            dimensions: config.dimensions,
            pos_def_tol: config.pos_def_tol,
            contraction_rate_lb: config.contraction_rate_lb,
            max_condition: config.max_condition,
        }
    }

    pub fn with_max_condition(mut self, max_condition: f64) -> Self {
        self.max_condition = max_condition;
        self
    }

    /// Builds the certified matrix set from the current free parameters
    pub fn derive(&self, params: &FreeParameters) -> Result<DerivedMatrices> {
        let n = self.dimensions.internal;
        let l = self.dimensions.nonlinear;
        let size = self.dimensions.certificate_size();

        params.validate(&self.dimensions)?;

        let h = params.x.transpose() * &params.x
            + DMatrix::<f64>::identity(size, size) * self.pos_def_tol;

        // Block offsets along both axes: [0, n) | [n, n+l) | [n+l, 2n+l)
        let (o2, o3) = (n, n + l);
        let h11 = h.view((0, 0), (n, n)).into_owned();
        let h21 = h.view((o2, 0), (l, n)).into_owned();
        let h22 = h.view((o2, o2), (l, l)).into_owned();
        let h31 = h.view((o3, 0), (n, n)).into_owned();
        let h32 = h.view((o3, o2), (n, l)).into_owned();
        let h33 = h.view((o3, o3), (n, n)).into_owned();

        let e = (h11 + &h33 * self.contraction_rate_lb + &params.y - params.y.transpose()) * 0.5;
        let (e_inv, condition) = self.invert_e(&e)?;

        Ok(DerivedMatrices {
            p: h33,
            f: h31,
            b1: h32,
            e,
            e_inv,
            lambda: h22.diagonal() * 0.5,
            d11: -strict_lower(&h22),
            c1: -h21,
            condition,
            h,
        })
    }

    fn invert_e(&self, e: &DMatrix<f64>) -> Result<(DMatrix<f64>, f64)> {
        let condition = condition_number(e);
        if !condition.is_finite() || condition > self.max_condition {
            return Err(RenError::SingularMatrix { condition });
        }
        if condition > self.max_condition * 1e-3 {
            warn!(condition, limit = self.max_condition, "E is close to the conditioning limit");
        }
        let inv = e
            .clone()
            .try_inverse()
            .ok_or(RenError::SingularMatrix { condition })?;
        Ok((inv, condition))
    }
}

impl DerivedMatrices {
    /// Diagnostics used by tests and `ren inspect`
    pub fn report(&self) -> CertificateReport {
        CertificateReport {
            min_eigenvalue_h: min_symmetric_eigenvalue(&self.h),
            min_lambda: self.lambda.min(),
            condition_e: self.condition,
            inverse_residual: inverse_residual(&self.e, &self.e_inv),
        }
    }

    /// Contraction metric `EᵀP⁻¹E`, `None` if `P` lost definiteness numerically
    pub fn contraction_metric(&self) -> Option<DMatrix<f64>> {
        let p_inv = self.p.clone().cholesky()?.inverse();
        Some(self.e.transpose() * p_inv * &self.e)
    }
}
