//! # Equilibrium Recurrence Engine
//!
//! One REN time step with explicit state threading:
//!
//! ```text
//! v_i = C1[i]·x + D11[i,:]·w + D12[i]·u      i = 0..l-1, in order
//! w_i = tanh(v_i / Λ_i)
//! x⁺  = E⁻¹ (F·x + B1·w + B2·u)
//! y   = C2·x⁺ + D21·w + D22·u                 (PostUpdate)
//! y   = C2·x  + D21·w + D22·u                 (PreUpdate)
//! ```
//!
//! `D11` is strictly lower triangular, so row `i` only reads `w_0..w_{i-1}`
//! and a single ordered pass solves the implicit equation exactly.
//!
//! The engine borrows parameters and derived matrices and never owns state,
//! so independent trajectories can be stepped concurrently from one derived
//! set. Batches are matrices with one column per trajectory.

use nalgebra::{DMatrix, DVector};

use crate::certificate::DerivedMatrices;
use crate::config::OutputAlignment;
use crate::error::{RenError, Result};
use crate::linalg::shape_of;
use crate::params::FreeParameters;

/// Result of one step for a batch
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutput {
    /// Next state `x⁺` (`n × B`)
    pub state: DMatrix<f64>,
    /// Output `y` (`p × B`)
    pub output: DMatrix<f64>,
    /// Equilibrium `w` (`l × B`)
    pub equilibrium: DMatrix<f64>,
}

/// Pure per-step recurrence over borrowed matrices
#[derive(Debug, Clone, Copy)]
pub struct Engine<'a> {
    params: &'a FreeParameters,
    derived: &'a DerivedMatrices,
    alignment: OutputAlignment,
}

impl<'a> Engine<'a> {
    pub fn new(
        params: &'a FreeParameters,
        derived: &'a DerivedMatrices,
        alignment: OutputAlignment,
    ) -> Self {
        Self {
            params,
            derived,
            alignment,
        }
    }

    pub fn alignment(&self) -> OutputAlignment {
        self.alignment
    }

    /// Solves `w = tanh(Λ⁻¹(C1·x + D11·w + D12·u))` row by row
    pub fn solve_equilibrium(&self, x: &DMatrix<f64>, u: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        self.check_batch(x, u)?;
        Ok(self.equilibrium(x, u))
    }

    fn equilibrium(&self, x: &DMatrix<f64>, u: &DMatrix<f64>) -> DMatrix<f64> {
        let l = self.derived.lambda.len();
        let batch = x.ncols();
        let mut w = DMatrix::<f64>::zeros(l, batch);

        for i in 0..l {
            let v = self.derived.c1.row(i) * x
                + self.derived.d11.row(i) * &w
                + self.params.d12.row(i) * u;
            let lambda_i = self.derived.lambda[i];
            for b in 0..batch {
                w[(i, b)] = (v[b] / lambda_i).tanh();
            }
        }
        w
    }

    /// Advances a batch of states by one step
    pub fn step(&self, x: &DMatrix<f64>, u: &DMatrix<f64>) -> Result<StepOutput> {
        self.check_batch(x, u)?;

        let w = self.equilibrium(x, u);
        let next = &self.derived.e_inv
            * (&self.derived.f * x + &self.derived.b1 * &w + &self.params.b2 * u);

        let read = match self.alignment {
            OutputAlignment::PostUpdate => &next,
            OutputAlignment::PreUpdate => x,
        };
        let output = &self.params.c2 * read + &self.params.d21 * &w + &self.params.d22 * u;

        Ok(StepOutput {
            state: next,
            output,
            equilibrium: w,
        })
    }

    /// Single-trajectory convenience wrapper, returns `(x⁺, y)`
    pub fn step_vector(
        &self,
        x: &DVector<f64>,
        u: &DVector<f64>,
    ) -> Result<(DVector<f64>, DVector<f64>)> {
        let x = DMatrix::from_column_slice(x.len(), 1, x.as_slice());
        let u = DMatrix::from_column_slice(u.len(), 1, u.as_slice());
        let out = self.step(&x, &u)?;
        Ok((
            DVector::from_column_slice(out.state.as_slice()),
            DVector::from_column_slice(out.output.as_slice()),
        ))
    }

    /// Parameters must agree with the derived set they are paired with
    fn check_parameters(&self) -> Result<()> {
        let n = self.derived.e.nrows();
        let l = self.derived.lambda.len();
        let m = self.params.b2.ncols();
        let p = self.params.c2.nrows();
        let expected = [
            ("B2", &self.params.b2, (n, m)),
            ("C2", &self.params.c2, (p, n)),
            ("D21", &self.params.d21, (p, l)),
            ("D22", &self.params.d22, (p, m)),
            ("D12", &self.params.d12, (l, m)),
        ];
        for (name, mat, (rows, cols)) in expected {
            if mat.shape() != (rows, cols) {
                return Err(RenError::shape(
                    format!("parameter {}", name),
                    format!("({}, {})", rows, cols),
                    shape_of(mat),
                ));
            }
        }
        Ok(())
    }

    fn check_batch(&self, x: &DMatrix<f64>, u: &DMatrix<f64>) -> Result<()> {
        self.check_parameters()?;
        let n = self.derived.e.nrows();
        let m = self.params.b2.ncols();
        if x.nrows() != n {
            return Err(RenError::shape("state", format!("({}, B)", n), shape_of(x)));
        }
        if u.nrows() != m {
            return Err(RenError::shape("input", format!("({}, B)", m), shape_of(u)));
        }
        if x.ncols() != u.ncols() {
            return Err(RenError::shape(
                "batch size",
                x.ncols(),
                u.ncols(),
            ));
        }
        Ok(())
    }
}
