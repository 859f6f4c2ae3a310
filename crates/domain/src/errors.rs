//! Domain error types.

use thiserror::Error;

/// Errors raised by the feature flag domain model and strategy evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// Malformed construction, mutation or evaluation input.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Strategy configuration present but inconsistent with the strategy type.
    #[error("Strategy configuration error: {0}")]
    StrategyConfig(String),
}

impl DomainError {
    /// Short machine-readable code, used in API responses and metric labels.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::InvalidArgument(_) => "invalid_argument",
            DomainError::StrategyConfig(_) => "strategy_config_error",
        }
    }
}

impl From<validator::ValidationError> for DomainError {
    fn from(err: validator::ValidationError) -> Self {
        let message = err
            .message
            .map(|m| m.to_string())
            .unwrap_or_else(|| err.code.to_string());
        DomainError::InvalidArgument(message)
    }
}
