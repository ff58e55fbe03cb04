//! REN model configuration (ren.toml)
//!
//! Construction-time settings: dimensions, initial-state choice,
//! parameter initialization scale, positive-definiteness tolerance `ε`,
//! contraction-rate lower bound `ρ` and output alignment.
//!
//! ```toml
//! pos_def_tol = 0.001
//! contraction_rate_lb = 1.0
//! output_alignment = "post_update"
//!
//! [dimensions]
//! input = 1
//! output = 1
//! internal = 8
//! nonlinear = 8
//!
//! [initial_state]
//! kind = "least_squares"
//! target = [0.5]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RenError, Result};

/// Model dimensions: `m` input, `p` output, `n` internal state, `l` nonlinearity width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    /// Input size `m`
    pub input: usize,
    /// Output size `p`
    pub output: usize,
    /// Internal state size `n`
    pub internal: usize,
    /// Nonlinearity width `l`
    pub nonlinear: usize,
}

impl Dimensions {
    pub fn new(input: usize, output: usize, internal: usize, nonlinear: usize) -> Self {
        Self {
            input,
            output,
            internal,
            nonlinear,
        }
    }

    /// Side of `X` and `H`: `2n + l`
    pub fn certificate_size(&self) -> usize {
        2 * self.internal + self.nonlinear
    }

    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("input", self.input),
            ("output", self.output),
            ("internal", self.internal),
            ("nonlinear", self.nonlinear),
        ];
        for (name, value) in fields {
            if value == 0 {
                return Err(RenError::config(format!("dimension '{}' must be positive", name)));
            }
        }
        Ok(())
    }
}

/// How `x_init` is obtained at construction
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InitialState {
    /// `x_init = 0`
    #[default]
    Zero,
    /// Explicit internal state of length `n`
    Explicit { state: Vec<f64> },
    /// Least-squares fit of `C2·x = target` (target of length `p`)
    LeastSquares { target: Vec<f64> },
}

/// Which state the output map reads
///
/// `PostUpdate` computes `y = C2·x_{t+1} + D21·w + D22·u` and keeps bit
/// compatibility with previously trained models. `PreUpdate` computes
/// `y = C2·x_t + D21·w + D22·u`, the three-equation REN form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputAlignment {
    #[default]
    PostUpdate,
    PreUpdate,
}

/// REN construction settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenConfig {
    pub dimensions: Dimensions,

    #[serde(default)]
    pub initial_state: InitialState,

    /// Std of the Gaussian used for the free parameters
    #[serde(default = "default_initialization_std")]
    pub initialization_std: f64,

    /// `ε` in `H = XᵀX + ε·I`
    #[serde(default = "default_pos_def_tol")]
    pub pos_def_tol: f64,

    /// `ρ` in `E = ½(H11 + ρ·P + Y − Yᵀ)`
    #[serde(default = "default_contraction_rate_lb")]
    pub contraction_rate_lb: f64,

    #[serde(default)]
    pub output_alignment: OutputAlignment,

    /// Largest accepted condition number of `E`
    #[serde(default = "default_max_condition")]
    pub max_condition: f64,

    /// Seed for parameter initialization (entropy when absent)
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_initialization_std() -> f64 {
    0.5
}

fn default_pos_def_tol() -> f64 {
    0.001
}

fn default_contraction_rate_lb() -> f64 {
    1.0
}

fn default_max_condition() -> f64 {
    1e12
}

impl RenConfig {
    /// Configuration with default settings for the given dimensions
    pub fn new(dimensions: Dimensions) -> Self {
        Self {
            dimensions,
            initial_state: InitialState::Zero,
            initialization_std: default_initialization_std(),
            pos_def_tol: default_pos_def_tol(),
            contraction_rate_lb: default_contraction_rate_lb(),
            output_alignment: OutputAlignment::default(),
            max_condition: default_max_condition(),
            seed: None,
        }
    }

    pub fn with_initial_state(mut self, initial_state: InitialState) -> Self {
        self.initial_state = initial_state;
        self
    }

    pub fn with_initialization_std(mut self, std: f64) -> Self {
        self.initialization_std = std;
        self
    }

    pub fn with_pos_def_tol(mut self, eps: f64) -> Self {
        self.pos_def_tol = eps;
        self
    }

    pub fn with_contraction_rate_lb(mut self, rho: f64) -> Self {
        self.contraction_rate_lb = rho;
        self
    }

    pub fn with_output_alignment(mut self, alignment: OutputAlignment) -> Self {
        self.output_alignment = alignment;
        self
    }

    pub fn with_max_condition(mut self, max_condition: f64) -> Self {
        self.max_condition = max_condition;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Rejects non-positive `ε`/`ρ`, zero dimensions and malformed initial states
    pub fn validate(&self) -> Result<()> {
        self.dimensions.validate()?;

        if !(self.pos_def_tol.is_finite() && self.pos_def_tol > 0.0) {
            return Err(RenError::config(format!(
                "pos_def_tol must be positive and finite, got {}",
                self.pos_def_tol
            )));
        }
        if !(self.contraction_rate_lb.is_finite() && self.contraction_rate_lb > 0.0) {
            return Err(RenError::config(format!(
                "contraction_rate_lb must be positive and finite, got {}",
                self.contraction_rate_lb
            )));
        }
        if !(self.initialization_std.is_finite() && self.initialization_std >= 0.0) {
            return Err(RenError::config(format!(
                "initialization_std must be non-negative and finite, got {}",
                self.initialization_std
            )));
        }
        if !(self.max_condition > 1.0) {
            return Err(RenError::config(format!(
                "max_condition must exceed 1, got {}",
                self.max_condition
            )));
        }

        match &self.initial_state {
            InitialState::Zero => {}
            InitialState::Explicit { state } => {
                check_vector("initial state", state, self.dimensions.internal)?;
            }
            InitialState::LeastSquares { target } => {
                check_vector("initial output target", target, self.dimensions.output)?;
            }
        }
        Ok(())
    }

    /// Parse a configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file path
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RenError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    /// Serialize configuration to a TOML string
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn check_vector(what: &str, values: &[f64], expected: usize) -> Result<()> {
    if values.len() != expected {
        return Err(RenError::config(format!(
            "{} has length {}, expected {}",
            what,
            values.len(),
            expected
        )));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(RenError::config(format!("{} contains non-finite values", what)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims() -> Dimensions {
        Dimensions::new(1, 1, 2, 2)
    }

    #[test]
    fn test_defaults() {
        let cfg = RenConfig::new(dims());
        assert_eq!(cfg.initial_state, InitialState::Zero);
        assert_eq!(cfg.output_alignment, OutputAlignment::PostUpdate);
        assert!((cfg.pos_def_tol - 0.001).abs() < 1e-15);
        assert!((cfg.contraction_rate_lb - 1.0).abs() < 1e-15);
        assert!((cfg.initialization_std - 0.5).abs() < 1e-15);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_certificate_size() {
        assert_eq!(Dimensions::new(3, 2, 4, 5).certificate_size(), 13);
    }

    #[test]
    fn test_rejects_non_positive_tolerances() {
        assert!(RenConfig::new(dims()).with_pos_def_tol(0.0).validate().is_err());
        assert!(RenConfig::new(dims()).with_pos_def_tol(-1e-3).validate().is_err());
        assert!(RenConfig::new(dims()).with_contraction_rate_lb(0.0).validate().is_err());
        assert!(RenConfig::new(dims()).with_contraction_rate_lb(f64::NAN).validate().is_err());
    }

    #[test]
    fn test_rejects_zero_dimension() {
        let err = RenConfig::new(Dimensions::new(1, 1, 0, 2)).validate().unwrap_err();
        assert!(err.to_string().contains("internal"));
    }

    #[test]
    fn test_rejects_wrong_initial_state_length() {
        let cfg = RenConfig::new(dims())
            .with_initial_state(InitialState::Explicit { state: vec![1.0, 2.0, 3.0] });
        assert!(matches!(cfg.validate(), Err(RenError::InvalidConfiguration(_))));

        let cfg = RenConfig::new(dims())
            .with_initial_state(InitialState::LeastSquares { target: vec![1.0, 2.0] });
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            contraction_rate_lb = 2.0
            output_alignment = "pre_update"
            seed = 42

            [dimensions]
            input = 1
            output = 1
            internal = 8
            nonlinear = 4

            [initial_state]
            kind = "least_squares"
            target = [0.5]
        "#;

        let cfg = RenConfig::from_toml(toml).unwrap();
        assert_eq!(cfg.dimensions, Dimensions::new(1, 1, 8, 4));
        assert_eq!(cfg.output_alignment, OutputAlignment::PreUpdate);
        assert_eq!(cfg.initial_state, InitialState::LeastSquares { target: vec![0.5] });
        assert_eq!(cfg.seed, Some(42));
        assert!((cfg.pos_def_tol - 0.001).abs() < 1e-15);
    }

    #[test]
    fn test_parse_toml_rejects_invalid() {
        let toml = r#"
            pos_def_tol = -1.0

            [dimensions]
            input = 1
            output = 1
            internal = 2
            nonlinear = 2
        "#;
        assert!(RenConfig::from_toml(toml).is_err());
    }

    #[test]
    fn test_toml_roundtrip() {
        let cfg = RenConfig::new(dims())
            .with_initial_state(InitialState::Explicit { state: vec![0.1, -0.2] })
            .with_seed(3);
        let text = cfg.to_toml().unwrap();
        let back = RenConfig::from_toml(&text).unwrap();
        assert_eq!(cfg, back);
    }
}
