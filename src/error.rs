use thiserror::Error;

use crate::core::ranker::RankerError;
use crate::services::ProviderError;

/// Errors surfaced by the matching engine
///
/// Per-pair problems (`Input`, `Dependency`) are collected alongside a batch's
/// successful results rather than aborting it.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("Invalid input for {id}: {reason}")]
    Input { id: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Dependency failure: {0}")]
    Dependency(#[from] ProviderError),

    #[error("Ranker error: {0}")]
    Ranker(#[from] RankerError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MatchError {
    pub fn input(id: impl Into<String>, reason: impl Into<String>) -> Self {
        MatchError::Input {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

impl From<config::ConfigError> for MatchError {
    fn from(err: config::ConfigError) -> Self {
        MatchError::Config(err.to_string())
    }
}

impl From<rayon::ThreadPoolBuildError> for MatchError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        MatchError::Config(format!("worker pool: {}", err))
    }
}
