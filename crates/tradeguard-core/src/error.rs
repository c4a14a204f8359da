//! Error types for tradeguard-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("Invalid limit {field}: {reason}")]
    InvalidLimit { field: &'static str, reason: String },

    #[error("Invalid input {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },
}

impl CoreError {
    pub(crate) fn limit(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidLimit {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn input(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            reason: reason.into(),
        }
    }
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
