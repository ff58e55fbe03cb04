//! # Linear Algebra Helpers
//!
//! Dense matrix utilities shared by the certificate construction and the
//! recurrence engine. Everything here works on `nalgebra` dynamic matrices.
//!
//! ## Batch layout
//!
//! A batch at a single instant is a matrix whose **columns** are the batch
//! entries: states are `n × B`, inputs `m × B`, outputs `p × B`.

use nalgebra::{DMatrix, DVector, SymmetricEigen};
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::error::{RenError, Result};

/// Tolerance used when solving least-squares problems through the SVD
pub const LSTSQ_EPS: f64 = 1e-12;

/// Strictly lower-triangular part of a square matrix (diagonal excluded)
pub fn strict_lower(a: &DMatrix<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| if i > j { a[(i, j)] } else { 0.0 })
}

/// Checks that every entry on or above the diagonal is exactly zero
pub fn is_strictly_lower(a: &DMatrix<f64>) -> bool {
    (0..a.nrows()).all(|i| (i..a.ncols()).all(|j| a[(i, j)] == 0.0))
}

/// Symmetry check within an absolute tolerance
pub fn is_symmetric(a: &DMatrix<f64>, tol: f64) -> bool {
    a.is_square() && (0..a.nrows()).all(|i| (0..i).all(|j| (a[(i, j)] - a[(j, i)]).abs() <= tol))
}

/// 2-norm condition number `σmax / σmin`
///
/// Returns `+∞` for an exactly singular matrix and NaN when the matrix holds
/// non-finite entries, so callers can reject both with `is_finite`.
pub fn condition_number(a: &DMatrix<f64>) -> f64 {
    if a.iter().any(|v| !v.is_finite()) {
        return f64::NAN;
    }
    let sv = a.clone().singular_values();
    let max = sv.max();
    let min = sv.min();
    if min <= 0.0 {
        f64::INFINITY
    } else {
        max / min
    }
}

/// Smallest eigenvalue of a symmetric matrix
pub fn min_symmetric_eigenvalue(a: &DMatrix<f64>) -> f64 {
    SymmetricEigen::new(a.clone()).eigenvalues.min()
}

/// `‖A⁻¹·A − I‖∞` (largest absolute entry)
pub fn inverse_residual(a: &DMatrix<f64>, a_inv: &DMatrix<f64>) -> f64 {
    let n = a.nrows();
    (a_inv * a - DMatrix::<f64>::identity(n, n)).amax()
}

/// Minimum-norm least-squares solution of `A·x = b`
pub fn lstsq(a: &DMatrix<f64>, b: &DVector<f64>) -> Result<DVector<f64>> {
    if a.nrows() != b.len() {
        return Err(RenError::shape(
            "least-squares right-hand side",
            a.nrows(),
            b.len(),
        ));
    }
    a.clone()
        .svd(true, true)
        .solve(b, LSTSQ_EPS)
        .map_err(|e| RenError::config(format!("least-squares solve failed: {}", e)))
}

/// Repeats a column vector `batch` times (`len × batch`)
pub fn broadcast_columns(v: &DVector<f64>, batch: usize) -> DMatrix<f64> {
    DMatrix::from_fn(v.len(), batch, |i, _| v[i])
}

/// Gaussian matrix with zero mean and the given standard deviation
pub fn random_normal<R: Rng + ?Sized>(
    rows: usize,
    cols: usize,
    std: f64,
    rng: &mut R,
) -> Result<DMatrix<f64>> {
    let normal = Normal::new(0.0, std)
        .map_err(|e| RenError::config(format!("initialization std {}: {}", std, e)))?;
    Ok(DMatrix::from_fn(rows, cols, |_, _| normal.sample(rng)))
}

/// Quadratic form `dᵀ·M·d` evaluated per column of `d`
pub fn quadratic_form(m: &DMatrix<f64>, d: &DMatrix<f64>) -> Vec<f64> {
    let md = m * d;
    (0..d.ncols())
        .map(|j| d.column(j).dot(&md.column(j)))
        .collect()
}

/// Human-readable shape, e.g. `(3, 4)`
pub fn shape_of(a: &DMatrix<f64>) -> String {
    format!("({}, {})", a.nrows(), a.ncols())
}
