//! Error types for the LLM layer

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while talking to Gemini
#[derive(Debug, Error)]
pub enum LlmError {
    /// Authentication/token issues
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// HTTP request failures
    #[error("HTTP error (status {status}): {body}")]
    HttpError { status: u16, body: String },

    /// SSE stream transport or framing failures
    #[error("Stream error: {0}")]
    StreamError(String),

    /// JSON encoding/decoding issues
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Upstream quota exhausted (HTTP 429)
    #[error("Rate limit exceeded (retry after {retry_after:?})")]
    RateLimitExceeded { retry_after: Option<Duration> },

    /// Request rejected as malformed (HTTP 400)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Error object reported by Gemini itself
    #[error("Provider error ({code}): {message}")]
    ProviderError { code: String, message: String },
}

impl LlmError {
    /// Build the error for a non-success HTTP response.
    ///
    /// `retry_after` is the raw `Retry-After` header value, only consulted for 429s.
    pub fn from_status(status: u16, retry_after: Option<&str>, body: String) -> Self {
        if status == 429 {
            let retry_after = retry_after
                .and_then(|value| value.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return LlmError::RateLimitExceeded { retry_after };
        }
        if status == 400 {
            return LlmError::InvalidRequest(body);
        }
        LlmError::HttpError { status, body }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::SerializationError(err.to_string())
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::HttpError {
            status: err.status().map(|s| s.as_u16()).unwrap_or(0),
            body: err.to_string(),
        }
    }
}
