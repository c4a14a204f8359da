//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Risk error: {0}")]
    Risk(#[from] tradeguard_risk::RiskError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] tradeguard_telemetry::TelemetryError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] tradeguard_persistence::PersistenceError),

    #[error("Invalid JSON argument: {0}")]
    Json(#[from] serde_json::Error),
}

pub type AppResult<T> = Result<T, AppError>;
