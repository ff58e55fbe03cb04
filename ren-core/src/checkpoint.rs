//! # Checkpoints
//!
//! JSON snapshot of a model: its configuration, the free parameters and the
//! frozen `x_init`/`y_init` pair, nothing derived. Version 1 files carry no
//! initial pair; for those it is rebuilt from the configuration and the
//! restored `C2`.

use std::fs;
use std::path::Path;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::RenConfig;
use crate::error::{RenError, Result};
use crate::model::ContractiveRen;
use crate::params::{FreeParameters, PARAMETER_NAMES, parameter_shapes};

/// Current checkpoint format version
pub const CHECKPOINT_VERSION: u32 = 2;

/// Matrix stored row-major with its shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedMatrix {
    pub name: String,
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f64>,
}

impl NamedMatrix {
    pub fn from_matrix(name: &str, m: &DMatrix<f64>) -> Self {
        let data = (0..m.nrows())
            .flat_map(|i| (0..m.ncols()).map(move |j| m[(i, j)]))
            .collect();
        Self {
            name: name.to_string(),
            rows: m.nrows(),
            cols: m.ncols(),
            data,
        }
    }

    pub fn to_matrix(&self) -> Result<DMatrix<f64>> {
        if self.data.len() != self.rows * self.cols {
            return Err(RenError::shape(
                format!("checkpoint entry {}", self.name),
                format!("{} values", self.rows * self.cols),
                self.data.len(),
            ));
        }
        Ok(DMatrix::from_row_slice(self.rows, self.cols, &self.data))
    }
}

/// `x_init`/`y_init` as they were when the snapshot was taken
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialPair {
    pub x_init: Vec<f64>,
    pub y_init: Vec<f64>,
}

/// Serializable model snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u32,
    pub config: RenConfig,
    pub parameters: Vec<NamedMatrix>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial: Option<InitialPair>,
}

impl Checkpoint {
    pub fn from_model(model: &ContractiveRen) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            config: model.config().clone(),
            parameters: model
                .named_parameters()
                .into_iter()
                .map(|(name, m)| NamedMatrix::from_matrix(name, m))
                .collect(),
            initial: Some(InitialPair {
                x_init: model.x_init().as_slice().to_vec(),
                y_init: model.y_init().as_slice().to_vec(),
            }),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let checkpoint: Self = serde_json::from_str(json)?;
        if checkpoint.version > CHECKPOINT_VERSION {
            return Err(RenError::Serialization(format!(
                "checkpoint version {} is newer than supported version {}",
                checkpoint.version, CHECKPOINT_VERSION
            )));
        }
        Ok(checkpoint)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        info!(path = %path.display(), "checkpoint saved");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Rebuilds the free parameters, checking names and shapes against the config
    pub fn parameters(&self) -> Result<FreeParameters> {
        let dims = &self.config.dimensions;
        dims.validate()?;

        for entry in &self.parameters {
            if !PARAMETER_NAMES.contains(&entry.name.as_str()) {
                return Err(RenError::config(format!(
                    "unknown parameter '{}' in checkpoint",
                    entry.name
                )));
            }
        }

        let mut params = FreeParameters::zeros(dims);
        for (name, (rows, cols)) in parameter_shapes(dims) {
            let entry = self
                .parameters
                .iter()
                .find(|e| e.name == name)
                .ok_or_else(|| RenError::config(format!("checkpoint is missing parameter '{}'", name)))?;
            if (entry.rows, entry.cols) != (rows, cols) {
                return Err(RenError::shape(
                    format!("checkpoint parameter {}", name),
                    format!("({}, {})", rows, cols),
                    format!("({}, {})", entry.rows, entry.cols),
                ));
            }
            if let Some(slot) = params.get_mut(name) {
                *slot = entry.to_matrix()?;
            }
        }
        Ok(params)
    }
}

impl ContractiveRen {
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint::from_model(self)
    }

    /// Restores a model with the stored `x_init`/`y_init`
    ///
    /// Snapshots without an initial pair resolve it from the config against
    /// the stored `C2`.
    pub fn from_checkpoint(checkpoint: &Checkpoint) -> Result<Self> {
        let params = checkpoint.parameters()?;
        let config = checkpoint.config.clone();
        match &checkpoint.initial {
            Some(pair) => Self::with_initial_pair(
                config,
                params,
                DVector::from_column_slice(&pair.x_init),
                DVector::from_column_slice(&pair.y_init),
            ),
            None => Self::from_parameters(config, params),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.checkpoint().save(path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_checkpoint(&Checkpoint::load(path)?)
    }
}
