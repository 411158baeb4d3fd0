use std::time::Duration;
use thiserror::Error;

/// Errors from the completion service and structured response handling
#[derive(Debug, Error)]
pub enum LlmError {
    /// Missing API key, unsupported provider, ...
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection failed before a response arrived
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The response could not be parsed into the requested schema
    #[error("No valid structured response: {0}")]
    NoStructuredResponse(String),
}

impl LlmError {
    /// Whether a retry has a chance of succeeding
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Network(_) | LlmError::Timeout(_) => true,
            LlmError::Api { status, .. } => *status == 429 || *status >= 500,
            LlmError::Config(_) | LlmError::NoStructuredResponse(_) => false,
        }
    }
}
