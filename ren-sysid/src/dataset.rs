//! # Identification Datasets
//!
//! Paired `(input, output)` trajectories with shapes `(batch, T, m)` and
//! `(batch, T, p)`. Signals can be split into train/validation/test sets
//! and iterated in mini-batches. Files are JSON:
//!
//! ```json
//! { "inputs": [[[0.1], [0.2]]], "outputs": [[[0.0], [0.05]]] }
//! ```

use std::fs;
use std::path::Path;

use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use ren_core::{ContractiveRen, SequenceBatch};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SysIdError, SysIdResult};

/// Paired input/output trajectories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SysIdDataset {
    inputs: SequenceBatch,
    outputs: SequenceBatch,
}

/// Train/validation/test partition of a dataset
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSplit {
    pub train: SysIdDataset,
    pub validation: SysIdDataset,
    pub test: SysIdDataset,
}

impl SysIdDataset {
    /// Pairs inputs with outputs; both must hold the same signals over the same horizon
    pub fn new(inputs: SequenceBatch, outputs: SequenceBatch) -> SysIdResult<Self> {
        let (bi, ti, _) = inputs.shape();
        let (bo, to, _) = outputs.shape();
        if bi != bo || ti != to {
            return Err(SysIdError::InvalidDataset(format!(
                "inputs cover {} signals over {} steps but outputs cover {} over {}",
                bi, ti, bo, to
            )));
        }
        Ok(Self { inputs, outputs })
    }

    /// Dataset whose outputs are produced by a reference model
    pub fn simulate(system: &mut ContractiveRen, inputs: SequenceBatch) -> SysIdResult<Self> {
        let outputs = system.run(&inputs)?;
        Self::new(inputs, outputs)
    }

    pub fn inputs(&self) -> &SequenceBatch {
        &self.inputs
    }

    pub fn outputs(&self) -> &SequenceBatch {
        &self.outputs
    }

    /// Number of signals
    pub fn len(&self) -> usize {
        self.inputs.batch_size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn horizon(&self) -> usize {
        self.inputs.horizon()
    }

    pub fn input_dim(&self) -> usize {
        self.inputs.dim()
    }

    pub fn output_dim(&self) -> usize {
        self.outputs.dim()
    }

    /// Dataset made of the selected signals, in the given order
    pub fn subset(&self, indices: &[usize]) -> SysIdResult<Self> {
        Ok(Self {
            inputs: self.inputs.select(indices)?,
            outputs: self.outputs.select(indices)?,
        })
    }

    /// Seeded random split: ⌊n/2⌋ train, ⌊n/4⌋ validation, the rest test
    pub fn split(&self, seed: u64) -> SysIdResult<DatasetSplit> {
        let n = self.len();
        let train_len = n / 2;
        let val_len = n / 4;

        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut StdRng::seed_from_u64(seed));

        let split = DatasetSplit {
            train: self.subset(&order[..train_len])?,
            validation: self.subset(&order[train_len..train_len + val_len])?,
            test: self.subset(&order[train_len + val_len..])?,
        };
        debug!(
            train = split.train.len(),
            validation = split.validation.len(),
            test = split.test.len(),
            "dataset split"
        );
        Ok(split)
    }

    /// Consecutive mini-batches of at most `batch_size` signals
    pub fn batches(&self, batch_size: usize) -> SysIdResult<Vec<Self>> {
        let order: Vec<usize> = (0..self.len()).collect();
        self.batches_in_order(&order, batch_size)
    }

    /// Mini-batches over a fresh random permutation of the signals
    pub fn shuffled_batches<R: Rng + ?Sized>(
        &self,
        batch_size: usize,
        rng: &mut R,
    ) -> SysIdResult<Vec<Self>> {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(rng);
        self.batches_in_order(&order, batch_size)
    }

    fn batches_in_order(&self, order: &[usize], batch_size: usize) -> SysIdResult<Vec<Self>> {
        if batch_size == 0 {
            return Err(SysIdError::InvalidConfig("batch size must be positive".into()));
        }
        order.chunks(batch_size).map(|chunk| self.subset(chunk)).collect()
    }

    /// Adds i.i.d. Gaussian noise to every output sample
    pub fn add_output_noise<R: Rng + ?Sized>(&mut self, std: f64, rng: &mut R) -> SysIdResult<()> {
        let normal = Normal::new(0.0, std)
            .map_err(|e| SysIdError::InvalidConfig(format!("noise std {}: {}", std, e)))?;
        let (batch, horizon, dim) = self.outputs.shape();
        for b in 0..batch {
            for t in 0..horizon {
                for d in 0..dim {
                    let noisy = self.outputs.get(b, t, d) + normal.sample(rng);
                    self.outputs.set(b, t, d, noisy);
                }
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> SysIdResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> SysIdResult<Self> {
        let raw: Self = serde_json::from_str(json)?;
        Self::new(raw.inputs, raw.outputs)
    }

    pub fn save(&self, path: &Path) -> SysIdResult<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> SysIdResult<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }
}

/// Gaussian excitation signals of shape `(batch, horizon, dim)`
pub fn gaussian_inputs<R: Rng + ?Sized>(
    batch: usize,
    horizon: usize,
    dim: usize,
    std: f64,
    rng: &mut R,
) -> SysIdResult<SequenceBatch> {
    let normal = Normal::new(0.0, std)
        .map_err(|e| SysIdError::InvalidConfig(format!("input std {}: {}", std, e)))?;
    let data = (0..batch * horizon * dim).map(|_| normal.sample(rng)).collect();
    Ok(SequenceBatch::new(batch, horizon, dim, data)?)
}
