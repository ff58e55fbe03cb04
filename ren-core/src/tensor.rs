//! # Sequence Batches
//!
//! `(batch, time, dim)` arrays exchanged with data sources and the
//! identification harness. Stored row-major in a flat buffer; the engine
//! consumes one time instant at a time as a `dim × batch` matrix.
//!
//! Serializes as nested arrays `[[[f64; dim]; time]; batch]`. A batch with
//! an empty horizon reads back with width 0.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::{RenError, Result};

/// Batched trajectories with shape `(batch, time, dim)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<Vec<f64>>>", into = "Vec<Vec<Vec<f64>>>")]
pub struct SequenceBatch {
    batch: usize,
    horizon: usize,
    dim: usize,
    data: Vec<f64>,
}

impl SequenceBatch {
    /// Wraps a row-major buffer of length `batch·horizon·dim`
    pub fn new(batch: usize, horizon: usize, dim: usize, data: Vec<f64>) -> Result<Self> {
        let expected = batch * horizon * dim;
        if data.len() != expected {
            return Err(RenError::shape(
                "sequence buffer",
                format!("{} values for ({}, {}, {})", expected, batch, horizon, dim),
                data.len(),
            ));
        }
        Ok(Self {
            batch,
            horizon,
            dim,
            data,
        })
    }

    pub fn zeros(batch: usize, horizon: usize, dim: usize) -> Self {
        Self {
            batch,
            horizon,
            dim,
            data: vec![0.0; batch * horizon * dim],
        }
    }

    /// Builds a batch from nested `[batch][time][dim]` vectors
    pub fn from_nested(nested: Vec<Vec<Vec<f64>>>) -> Result<Self> {
        let batch = nested.len();
        let horizon = nested.first().map_or(0, |s| s.len());
        let dim = nested
            .first()
            .and_then(|s| s.first())
            .map_or(0, |v| v.len());

        let mut data = Vec::with_capacity(batch * horizon * dim);
        for (b, seq) in nested.into_iter().enumerate() {
            if seq.len() != horizon {
                return Err(RenError::shape(
                    format!("sequence {} length", b),
                    horizon,
                    seq.len(),
                ));
            }
            for (t, v) in seq.into_iter().enumerate() {
                if v.len() != dim {
                    return Err(RenError::shape(
                        format!("sequence {} step {} width", b, t),
                        dim,
                        v.len(),
                    ));
                }
                data.extend(v);
            }
        }
        Self::new(batch, horizon, dim, data)
    }

    pub fn to_nested(&self) -> Vec<Vec<Vec<f64>>> {
        (0..self.batch)
            .map(|b| {
                (0..self.horizon)
                    .map(|t| self.data[self.offset(b, t, 0)..self.offset(b, t, 0) + self.dim].to_vec())
                    .collect()
            })
            .collect()
    }

    /// `(batch, time, dim)`
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.batch, self.horizon, self.dim)
    }

    pub fn batch_size(&self) -> usize {
        self.batch
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    #[inline]
    fn offset(&self, b: usize, t: usize, d: usize) -> usize {
        (b * self.horizon + t) * self.dim + d
    }

    pub fn get(&self, b: usize, t: usize, d: usize) -> f64 {
        self.data[self.offset(b, t, d)]
    }

    pub fn set(&mut self, b: usize, t: usize, d: usize, value: f64) {
        let idx = self.offset(b, t, d);
        self.data[idx] = value;
    }

    /// All batch entries at time `t` as a `dim × batch` matrix
    pub fn time_slice(&self, t: usize) -> DMatrix<f64> {
        DMatrix::from_fn(self.dim, self.batch, |d, b| self.get(b, t, d))
    }

    /// Writes a `dim × batch` matrix at time `t`
    pub fn set_time_slice(&mut self, t: usize, values: &DMatrix<f64>) -> Result<()> {
        if values.shape() != (self.dim, self.batch) {
            return Err(RenError::shape(
                format!("time slice {}", t),
                format!("({}, {})", self.dim, self.batch),
                format!("({}, {})", values.nrows(), values.ncols()),
            ));
        }
        for b in 0..self.batch {
            for d in 0..self.dim {
                self.set(b, t, d, values[(d, b)]);
            }
        }
        Ok(())
    }

    /// One trajectory as a `time × dim` matrix
    pub fn sequence(&self, b: usize) -> DMatrix<f64> {
        DMatrix::from_fn(self.horizon, self.dim, |t, d| self.get(b, t, d))
    }

    /// New batch made of the selected trajectories, in the given order
    pub fn select(&self, indices: &[usize]) -> Result<Self> {
        let stride = self.horizon * self.dim;
        let mut data = Vec::with_capacity(indices.len() * stride);
        for &b in indices {
            if b >= self.batch {
                return Err(RenError::shape("batch index", format!("< {}", self.batch), b));
            }
            data.extend_from_slice(&self.data[b * stride..(b + 1) * stride]);
        }
        Self::new(indices.len(), self.horizon, self.dim, data)
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }
}

impl TryFrom<Vec<Vec<Vec<f64>>>> for SequenceBatch {
    type Error = RenError;

    fn try_from(nested: Vec<Vec<Vec<f64>>>) -> Result<Self> {
        Self::from_nested(nested)
    }
}

impl From<SequenceBatch> for Vec<Vec<Vec<f64>>> {
    fn from(batch: SequenceBatch) -> Self {
        batch.to_nested()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SequenceBatch {
        // batch 2, time 3, dim 2
        SequenceBatch::from_nested(vec![
            vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]],
            vec![vec![7.0, 8.0], vec![9.0, 10.0], vec![11.0, 12.0]],
        ])
        .unwrap()
    }

    #[test]
    fn test_shape_and_indexing() {
        let s = sample();
        assert_eq!(s.shape(), (2, 3, 2));
        assert_eq!(s.get(1, 2, 0), 11.0);
        assert_eq!(s.get(0, 1, 1), 4.0);
    }

    #[test]
    fn test_time_slice_columns_are_batch_entries() {
        let s = sample();
        let slice = s.time_slice(1);
        assert_eq!(slice.shape(), (2, 2));
        assert_eq!(slice[(0, 0)], 3.0);
        assert_eq!(slice[(1, 1)], 10.0);
    }

    #[test]
    fn test_set_time_slice() {
        let mut s = SequenceBatch::zeros(2, 3, 2);
        let values = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        s.set_time_slice(2, &values).unwrap();
        assert_eq!(s.get(0, 2, 0), 1.0);
        assert_eq!(s.get(1, 2, 0), 2.0);
        assert_eq!(s.get(0, 2, 1), 3.0);
        assert!(s.set_time_slice(0, &DMatrix::zeros(3, 2)).is_err());
    }

    #[test]
    fn test_rejects_ragged() {
        let ragged = vec![vec![vec![1.0]], vec![vec![1.0], vec![2.0]]];
        assert!(SequenceBatch::from_nested(ragged).is_err());
        let ragged_dim = vec![vec![vec![1.0], vec![2.0, 3.0]]];
        assert!(SequenceBatch::from_nested(ragged_dim).is_err());
    }

    #[test]
    fn test_select() {
        let s = sample();
        let picked = s.select(&[1]).unwrap();
        assert_eq!(picked.shape(), (1, 3, 2));
        assert_eq!(picked.get(0, 0, 0), 7.0);
        assert!(s.select(&[2]).is_err());
    }

    #[test]
    fn test_json_nested_format() {
        let s = sample();
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.starts_with("[[[1.0,2.0]"));
        let back: SequenceBatch = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn test_sequence_view() {
        let s = sample();
        let seq = s.sequence(0);
        assert_eq!(seq.shape(), (3, 2));
        assert_eq!(seq[(2, 1)], 6.0);
    }
}
