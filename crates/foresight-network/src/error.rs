//! Error types for network operations

use thiserror::Error;

/// Result type for network operations
pub type Result<T> = std::result::Result<T, NetworkError>;

/// Errors that can occur while fetching a page
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// Server answered with a non-success status
    #[error("HTTP error: {status} - {message}")]
    Http { status: u16, message: String },

    /// Network connection failed
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Request timeout
    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Response body could not be parsed
    #[error("Failed to decode response body: {0}")]
    Decode(String),

    /// Client configuration error
    #[error("Client configuration error: {0}")]
    Configuration(String),

    /// The fetch was aborted before it settled
    #[error("Request cancelled")]
    Cancelled,
}

impl NetworkError {
    /// Whether the error came from an abort rather than the transport
    pub fn is_cancelled(&self) -> bool {
        matches!(self, NetworkError::Cancelled)
    }

    /// HTTP status, when the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            NetworkError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for NetworkError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            NetworkError::Timeout(crate::config::DEFAULT_TIMEOUT.as_millis() as u64)
        } else if e.is_connect() {
            NetworkError::Connection(e.to_string())
        } else if e.is_decode() {
            NetworkError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            NetworkError::Http {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            NetworkError::Connection(e.to_string())
        }
    }
}

impl From<url::ParseError> for NetworkError {
    fn from(e: url::ParseError) -> Self {
        NetworkError::InvalidUrl(e.to_string())
    }
}

impl From<serde_json::Error> for NetworkError {
    fn from(e: serde_json::Error) -> Self {
        NetworkError::Decode(e.to_string())
    }
}
