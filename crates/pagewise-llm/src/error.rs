//! Error types for backend calls.

use thiserror::Error;

/// Errors that can occur when calling a model or embedding backend.
#[derive(Error, Debug)]
pub enum LlmError {
    /// Backend could not be reached.
    #[error("Backend at {host} is unreachable")]
    Unreachable { host: String },

    /// Request timeout.
    #[error("Request timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// API returned an error response.
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// Response was well-formed JSON but not what we asked for.
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Backend returned a different number of results than inputs.
    #[error("Expected {expected} results, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Every configured endpoint failed for one call.
    #[error("All {attempts} endpoints failed, last error: {last}")]
    AllEndpointsFailed { attempts: usize, last: Box<LlmError> },

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LlmError {
    /// Whether the error came from the transport rather than the backend's answer.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Unreachable { .. } | LlmError::Timeout { .. } => true,
            LlmError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request() || e.is_body(),
            _ => false,
        }
    }

    /// Map a failed `send()` into the most specific variant.
    pub(crate) fn from_send(err: reqwest::Error, host: &str, timeout_secs: u64) -> Self {
        if err.is_connect() {
            LlmError::Unreachable {
                host: host.to_string(),
            }
        } else if err.is_timeout() {
            LlmError::Timeout {
                seconds: timeout_secs,
            }
        } else {
            LlmError::Http(err)
        }
    }
}

/// Result type for backend operations.
pub type LlmResult<T> = Result<T, LlmError>;
