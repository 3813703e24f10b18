//! Error types for gateway operations.

use thiserror::Error;

/// Errors that can occur talking to the contact service.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The service rejected the filter shape of a list request.
    #[error("filter not supported: {0}")]
    FilterUnsupported(String),

    /// The service answered with a non-success status.
    #[error("HTTP {status} from {method} {url}: {body}")]
    Http {
        /// Response status code.
        status: u16,
        /// Request method.
        method: String,
        /// Request URL.
        url: String,
        /// Response body, possibly truncated.
        body: String,
    },

    /// The request never produced a response (connect, timeout, TLS).
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Invalid or missing connection configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The referenced contact does not exist.
    #[error("contact not found: {0}")]
    NotFound(String),
}

impl GatewayError {
    /// Returns true if the service rejected the filter shape.
    pub fn is_filter_unsupported(&self) -> bool {
        matches!(self, GatewayError::FilterUnsupported(_))
    }

    /// Returns true for failures worth retrying (network, 5xx, 429).
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::Transport(_) => true,
            GatewayError::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GatewayError::Transport(format!("invalid response body: {}", err))
        } else {
            GatewayError::Transport(err.to_string())
        }
    }
}

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
