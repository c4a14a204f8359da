//! Risk error types.
//!
//! A denied action is not an error: it is an `Ok(RiskDecision)` with
//! `allowed == false`. These variants cover bad configuration, malformed
//! caller input and store failures.

use thiserror::Error;
use tradeguard_core::CoreError;

#[derive(Debug, Error)]
pub enum RiskError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Breaker store error: {0}")]
    Store(String),
}

impl From<CoreError> for RiskError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidLimit { .. } => Self::Config(err.to_string()),
            CoreError::InvalidInput { .. } => Self::InvalidInput(err.to_string()),
        }
    }
}

pub type RiskResult<T> = Result<T, RiskError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tradeguard_core::{ActionParams, RiskLimits};

    #[test]
    fn test_limit_error_maps_to_config() {
        let err: RiskError = RiskLimits::new(dec!(-1)).validate().unwrap_err().into();
        assert!(matches!(err, RiskError::Config(_)));
        assert!(err.to_string().contains("max_position_size_usd"));
    }

    #[test]
    fn test_input_error_maps_to_invalid_input() {
        let err: RiskError = ActionParams::new(dec!(0), dec!(0), dec!(0))
            .validate()
            .unwrap_err()
            .into();
        assert!(matches!(err, RiskError::InvalidInput(_)));
    }
}
