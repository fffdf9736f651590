//! Error taxonomy for level analysis.

use thiserror::Error;

/// Errors surfaced by the level pipeline, its loaders and the orchestrator.
#[derive(Debug, Error)]
pub enum LevelError {
    #[error("Insufficient data: required {required} bars, got {got}")]
    InsufficientData { required: usize, got: usize },

    #[error("Invalid series: {0}")]
    InvalidSeries(String),

    #[error("Invalid parameter: {name} - {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Confidence model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Timed out loading {symbol} after {after_ms} ms")]
    Timeout { symbol: String, after_ms: u64 },

    #[error("No series available for {0}")]
    SeriesNotFound(String),

    #[error("Data source failed for {symbol}: {reason}")]
    DataSource { symbol: String, reason: String },

    #[error("Analysis of {0} was cancelled before it started")]
    Cancelled(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LevelError {
    /// Errors a retry policy is allowed to retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LevelError::Timeout { .. } | LevelError::DataSource { .. })
    }

    pub fn invalid_parameter(name: &str, reason: impl Into<String>) -> Self {
        LevelError::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for LevelError {
    fn from(e: serde_json::Error) -> Self {
        LevelError::Decode(e.to_string())
    }
}

impl From<bincode::Error> for LevelError {
    fn from(e: bincode::Error) -> Self {
        LevelError::Decode(e.to_string())
    }
}

/// Result alias for level operations.
pub type Result<T> = std::result::Result<T, LevelError>;
