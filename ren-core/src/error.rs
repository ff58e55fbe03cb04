//! Error types for ren-core

use thiserror::Error;

/// Result type for ren-core operations
pub type Result<T> = std::result::Result<T, RenError>;

/// ren-core error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenError {
    /// Tensor dimensions disagree with the configured model dimensions
    #[error("Shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: String,
        expected: String,
        actual: String,
    },

    /// `E` could not be inverted reliably
    #[error("Singular matrix: condition number {condition:e}")]
    SingularMatrix { condition: f64 },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl RenError {
    /// Shorthand for a [`RenError::ShapeMismatch`]
    pub fn shape(
        context: impl Into<String>,
        expected: impl std::fmt::Display,
        actual: impl std::fmt::Display,
    ) -> Self {
        RenError::ShapeMismatch {
            context: context.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Shorthand for a [`RenError::InvalidConfiguration`]
    pub fn config(msg: impl Into<String>) -> Self {
        RenError::InvalidConfiguration(msg.into())
    }
}

impl From<std::io::Error> for RenError {
    fn from(err: std::io::Error) -> Self {
        RenError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for RenError {
    fn from(err: serde_json::Error) -> Self {
        RenError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for RenError {
    fn from(err: toml::de::Error) -> Self {
        RenError::InvalidConfiguration(err.to_string())
    }
}

impl From<toml::ser::Error> for RenError {
    fn from(err: toml::ser::Error) -> Self {
        RenError::Serialization(err.to_string())
    }
}
