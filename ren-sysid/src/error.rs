//! Error types for ren-sysid

use ren_core::RenError;
use thiserror::Error;

/// Result type for ren-sysid operations
pub type SysIdResult<T> = std::result::Result<T, SysIdError>;

/// ren-sysid error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SysIdError {
    #[error(transparent)]
    Model(#[from] RenError),

    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("Invalid training configuration: {0}")]
    InvalidConfig(String),

    /// Loss or parameters became non-finite
    #[error("Training diverged at epoch {epoch}: loss {loss}")]
    Diverged { epoch: usize, loss: f64 },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for SysIdError {
    fn from(err: std::io::Error) -> Self {
        SysIdError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for SysIdError {
    fn from(err: serde_json::Error) -> Self {
        SysIdError::Serialization(err.to_string())
    }
}
