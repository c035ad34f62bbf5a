//! Error taxonomy for prior construction and sampling.

use thiserror::Error;

/// Errors raised while building or sampling a prior
#[derive(Debug, Error)]
pub enum PriorError {
    /// Missing or unknown configuration key, unknown distribution, model or
    /// fit-data name, or an invalid hyperparameter.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A pixelated profile was sampled before its image geometry was set up.
    #[error("Not configured: {0}")]
    NotConfigured(String),

    /// The requested profile or rendering option is not implemented.
    #[error("Unsupported profile: {0}")]
    UnsupportedProfile(String),

    /// A bounded rejection loop gave up.
    #[error("Gave up on {what} after {attempts} attempts")]
    RetryExhausted { what: String, attempts: u64 },

    #[error("Failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PriorError {
    /// Shorthand for a [`PriorError::Config`] built from anything displayable.
    pub fn config(msg: impl Into<String>) -> Self {
        PriorError::Config(msg.into())
    }
}

impl From<shared::GridError> for PriorError {
    fn from(err: shared::GridError) -> Self {
        PriorError::Config(format!("invalid grid: {err}"))
    }
}

impl From<shared::algo::QuadratureError> for PriorError {
    fn from(err: shared::algo::QuadratureError) -> Self {
        PriorError::Config(format!("distance integral failed: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, PriorError>;
