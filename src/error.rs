//! Crate-level error type for configuration and composition

use thiserror::Error;

/// Result alias used by configuration and wiring code
pub type Result<T> = std::result::Result<T, ForgeError>;

/// Errors raised outside of a running pipeline
#[derive(Debug, Error)]
pub enum ForgeError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Remote source error: {0}")]
    Remote(#[from] crate::aggregator::RemoteError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<::config::ConfigError> for ForgeError {
    fn from(err: ::config::ConfigError) -> Self {
        ForgeError::Configuration(err.to_string())
    }
}

impl From<crate::context::BudgetError> for ForgeError {
    fn from(err: crate::context::BudgetError) -> Self {
        ForgeError::Configuration(err.to_string())
    }
}
