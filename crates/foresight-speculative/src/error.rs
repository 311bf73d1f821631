//! Error types for speculative navigation

use foresight_network::NetworkError;
use thiserror::Error;

/// Result type for speculative operations
pub type Result<T> = std::result::Result<T, SpeculativeError>;

/// Errors raised while setting up a navigator.
///
/// Navigation itself never fails with an error; abnormal outcomes are
/// reported as `exit` events instead.
#[derive(Error, Debug)]
pub enum SpeculativeError {
    /// A page URL could not be parsed
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Configuration could not be parsed
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Network layer error
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),
}

impl From<serde_json::Error> for SpeculativeError {
    fn from(e: serde_json::Error) -> Self {
        SpeculativeError::Config(e.to_string())
    }
}

impl SpeculativeError {
    pub(crate) fn invalid_url(url: &str, error: impl std::fmt::Display) -> Self {
        SpeculativeError::InvalidUrl {
            url: url.to_string(),
            reason: error.to_string(),
        }
    }
}
