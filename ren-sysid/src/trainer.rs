//! # Training Loop
//!
//! Mini-batch gradient descent on the free parameters of a REN. Each epoch
//! shuffles the training signals, runs every batch from `x_init`, steps Adam
//! on the estimated gradient and records the mean batch loss. Validation
//! loss is computed on unshuffled batches without touching the parameters.

use rand::SeedableRng;
use rand::rngs::StdRng;
use ren_core::ContractiveRen;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dataset::SysIdDataset;
use crate::error::{SysIdError, SysIdResult};
use crate::gradient::{FiniteDifference, GradientEstimator};
use crate::loss::{LossKind, sequence_loss};
use crate::optim::{Adam, clip_grad_norm, grad_norm};

/// Training hyper-parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    /// Seed of the batch shuffling
    #[serde(default)]
    pub seed: u64,
    /// Finite-difference step
    #[serde(default = "default_fd_step")]
    pub fd_step: f64,
    #[serde(default)]
    pub max_grad_norm: Option<f64>,
}

fn default_epochs() -> usize {
    50
}

fn default_batch_size() -> usize {
    8
}

fn default_learning_rate() -> f64 {
    1e-2
}

fn default_fd_step() -> f64 {
    1e-6
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            epochs: default_epochs(),
            batch_size: default_batch_size(),
            learning_rate: default_learning_rate(),
            seed: 0,
            fd_step: default_fd_step(),
            max_grad_norm: None,
        }
    }
}

impl TrainerConfig {
    pub fn validate(&self) -> SysIdResult<()> {
        if self.batch_size == 0 {
            return Err(SysIdError::InvalidConfig("batch_size must be positive".into()));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(SysIdError::InvalidConfig(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.fd_step.is_finite() && self.fd_step > 0.0) {
            return Err(SysIdError::InvalidConfig(format!(
                "fd_step must be positive, got {}",
                self.fd_step
            )));
        }
        if let Some(max) = self.max_grad_norm {
            if !(max > 0.0) {
                return Err(SysIdError::InvalidConfig(format!(
                    "max_grad_norm must be positive, got {}",
                    max
                )));
            }
        }
        Ok(())
    }
}

/// Per-epoch losses
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub train_losses: Vec<f64>,
    /// Empty when training ran without a validation set
    pub val_losses: Vec<f64>,
}

impl TrainingHistory {
    pub fn epochs(&self) -> usize {
        self.train_losses.len()
    }

    pub fn final_train_loss(&self) -> Option<f64> {
        self.train_losses.last().copied()
    }

    /// `(epoch, loss)` of the lowest validation loss
    pub fn best_validation(&self) -> Option<(usize, f64)> {
        self.val_losses
            .iter()
            .copied()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }
}

/// Mini-batch trainer
pub struct Trainer<G: GradientEstimator = FiniteDifference> {
    config: TrainerConfig,
    estimator: G,
    optimizer: Adam,
    loss: LossKind,
    rng: StdRng,
}

impl Trainer<FiniteDifference> {
    /// Trainer using central finite differences with `config.fd_step`
    pub fn new(config: TrainerConfig) -> SysIdResult<Self> {
        let estimator = FiniteDifference::new(config.fd_step);
        Self::with_estimator(config, estimator)
    }
}

impl<G: GradientEstimator> Trainer<G> {
    pub fn with_estimator(config: TrainerConfig, estimator: G) -> SysIdResult<Self> {
        config.validate()?;
        Ok(Self {
            optimizer: Adam::with_learning_rate(config.learning_rate),
            rng: StdRng::seed_from_u64(config.seed),
            loss: LossKind::Mse,
            estimator,
            config,
        })
    }

    pub fn with_loss(mut self, loss: LossKind) -> Self {
        self.loss = loss;
        self
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Mean batch loss over `data`, parameters untouched
    pub fn evaluate(&self, model: &mut ContractiveRen, data: &SysIdDataset) -> SysIdResult<f64> {
        let batches = data.batches(self.config.batch_size)?;
        if batches.is_empty() {
            return Ok(0.0);
        }
        let mut total = 0.0;
        for batch in &batches {
            total += sequence_loss(model, batch, self.loss)?;
        }
        Ok(total / batches.len() as f64)
    }

    /// One pass over the shuffled training set, returns the mean batch loss
    pub fn train_epoch(
        &mut self,
        model: &mut ContractiveRen,
        train: &SysIdDataset,
        epoch: usize,
    ) -> SysIdResult<f64> {
        let batches = train.shuffled_batches(self.config.batch_size, &mut self.rng)?;
        let mut total = 0.0;

        for (index, batch) in batches.iter().enumerate() {
            let mut lg = self.estimator.loss_and_gradient(model, batch, self.loss)?;
            if !lg.loss.is_finite() || !lg.gradient.is_finite() {
                return Err(SysIdError::Diverged {
                    epoch,
                    loss: lg.loss,
                });
            }
            if let Some(max) = self.config.max_grad_norm {
                clip_grad_norm(&mut lg.gradient, max);
            }
            debug!(epoch, batch = index, loss = lg.loss, grad_norm = grad_norm(&lg.gradient), "batch");

            self.optimizer.step(model.parameters_mut(), &lg.gradient)?;
            if !model.parameters().is_finite() {
                return Err(SysIdError::Diverged {
                    epoch,
                    loss: lg.loss,
                });
            }
            total += lg.loss;
        }

        Ok(if batches.is_empty() {
            0.0
        } else {
            total / batches.len() as f64
        })
    }

    /// Trains for `config.epochs` epochs
    pub fn fit(
        &mut self,
        model: &mut ContractiveRen,
        train: &SysIdDataset,
        validation: Option<&SysIdDataset>,
    ) -> SysIdResult<TrainingHistory> {
        if train.is_empty() {
            return Err(SysIdError::InvalidDataset("training set is empty".into()));
        }
        let dims = model.dimensions();
        if train.input_dim() != dims.input || train.output_dim() != dims.output {
            return Err(SysIdError::InvalidDataset(format!(
                "dataset is {} → {}, model is {} → {}",
                train.input_dim(),
                train.output_dim(),
                dims.input,
                dims.output
            )));
        }

        let mut history = TrainingHistory::default();
        for epoch in 1..=self.config.epochs {
            let train_loss = self.train_epoch(model, train, epoch)?;
            history.train_losses.push(train_loss);

            match validation {
                Some(val) if !val.is_empty() => {
                    let val_loss = self.evaluate(model, val)?;
                    history.val_losses.push(val_loss);
                    info!(epoch, train_loss, val_loss, "epoch complete");
                }
                _ => info!(epoch, train_loss, "epoch complete"),
            }
        }
        Ok(history)
    }
}
