//! Free (trainable) parameters of a contractive REN
//!
//! These are the only matrices an optimizer touches. They are unconstrained:
//! any real values map to a certified model through
//! [`Certificate::derive`](crate::certificate::Certificate::derive).

use nalgebra::{DMatrix, DVector};
use rand::Rng;

use crate::config::Dimensions;
use crate::error::{RenError, Result};
use crate::linalg::{random_normal, shape_of};

/// Parameter names in their canonical order
pub const PARAMETER_NAMES: [&str; 7] = ["X", "Y", "B2", "C2", "D21", "D22", "D12"];

/// Trainable matrices `X, Y, B2, C2, D21, D22, D12`
#[derive(Debug, Clone, PartialEq)]
pub struct FreeParameters {
    /// `(2n+l) × (2n+l)`
    pub x: DMatrix<f64>,
    /// `n × n`
    pub y: DMatrix<f64>,
    /// `n × m`
    pub b2: DMatrix<f64>,
    /// `p × n`
    pub c2: DMatrix<f64>,
    /// `p × l`
    pub d21: DMatrix<f64>,
    /// `p × m`
    pub d22: DMatrix<f64>,
    /// `l × m`
    pub d12: DMatrix<f64>,
}

/// Expected `(rows, cols)` of every parameter, in canonical order
pub fn parameter_shapes(dims: &Dimensions) -> Vec<(&'static str, (usize, usize))> {
    let (m, p, n, l) = (dims.input, dims.output, dims.internal, dims.nonlinear);
    let s = dims.certificate_size();
    vec![
        ("X", (s, s)),
        ("Y", (n, n)),
        ("B2", (n, m)),
        ("C2", (p, n)),
        ("D21", (p, l)),
        ("D22", (p, m)),
        ("D12", (l, m)),
    ]
}

impl FreeParameters {
    /// Gaussian initialization with the given standard deviation
    pub fn random<R: Rng + ?Sized>(dims: &Dimensions, std: f64, rng: &mut R) -> Result<Self> {
        let mut mats = Vec::with_capacity(PARAMETER_NAMES.len());
        for (_, (rows, cols)) in parameter_shapes(dims) {
            mats.push(random_normal(rows, cols, std, rng)?);
        }
        Self::from_ordered(mats)
    }

    /// All-zero parameters
    pub fn zeros(dims: &Dimensions) -> Self {
        let (m, p, n, l) = (dims.input, dims.output, dims.internal, dims.nonlinear);
        let s = dims.certificate_size();
        Self {
            x: DMatrix::zeros(s, s),
            y: DMatrix::zeros(n, n),
            b2: DMatrix::zeros(n, m),
            c2: DMatrix::zeros(p, n),
            d21: DMatrix::zeros(p, l),
            d22: DMatrix::zeros(p, m),
            d12: DMatrix::zeros(l, m),
        }
    }

    fn from_ordered(mats: Vec<DMatrix<f64>>) -> Result<Self> {
        let [x, y, b2, c2, d21, d22, d12]: [DMatrix<f64>; 7] = mats
            .try_into()
            .map_err(|v: Vec<_>| RenError::shape("parameter list", 7, v.len()))?;
        Ok(Self {
            x,
            y,
            b2,
            c2,
            d21,
            d22,
            d12,
        })
    }

    /// Named, ordered view used by optimizers and checkpoints
    pub fn named(&self) -> Vec<(&'static str, &DMatrix<f64>)> {
        vec![
            ("X", &self.x),
            ("Y", &self.y),
            ("B2", &self.b2),
            ("C2", &self.c2),
            ("D21", &self.d21),
            ("D22", &self.d22),
            ("D12", &self.d12),
        ]
    }

    /// Mutable counterpart of [`FreeParameters::named`]
    pub fn named_mut(&mut self) -> Vec<(&'static str, &mut DMatrix<f64>)> {
        vec![
            ("X", &mut self.x),
            ("Y", &mut self.y),
            ("B2", &mut self.b2),
            ("C2", &mut self.c2),
            ("D21", &mut self.d21),
            ("D22", &mut self.d22),
            ("D12", &mut self.d12),
        ]
    }

    pub fn get(&self, name: &str) -> Option<&DMatrix<f64>> {
        self.named().into_iter().find(|(n, _)| *n == name).map(|(_, m)| m)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut DMatrix<f64>> {
        self.named_mut()
            .into_iter()
            .find(|(n, _)| *n == name)
            .map(|(_, m)| m)
    }

    /// Total number of scalar parameters
    pub fn num_parameters(&self) -> usize {
        self.named().iter().map(|(_, m)| m.len()).sum()
    }

    /// Checks every matrix against the shapes implied by `dims`
    pub fn validate(&self, dims: &Dimensions) -> Result<()> {
        for ((name, mat), (_, (rows, cols))) in self.named().into_iter().zip(parameter_shapes(dims)) {
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

    pub fn is_finite(&self) -> bool {
        self.named().iter().all(|(_, m)| m.iter().all(|v| v.is_finite()))
    }

    /// Concatenation of all parameters (canonical order, column-major within each)
    pub fn to_flat(&self) -> DVector<f64> {
        let data: Vec<f64> = self
            .named()
            .into_iter()
            .flat_map(|(_, m)| m.as_slice().to_vec())
            .collect();
        DVector::from_vec(data)
    }

    /// Inverse of [`FreeParameters::to_flat`]
    pub fn set_flat(&mut self, flat: &DVector<f64>) -> Result<()> {
        let expected = self.num_parameters();
        if flat.len() != expected {
            return Err(RenError::shape("flat parameter vector", expected, flat.len()));
        }
        let mut offset = 0;
        for (_, mat) in self.named_mut() {
            let len = mat.len();
            mat.as_mut_slice()
                .copy_from_slice(&flat.as_slice()[offset..offset + len]);
            offset += len;
        }
        Ok(())
    }
}
