//! Unified error handling for `llm-service`.
//!
//! One top-level [`LlmError`] for the whole library, with provider-aware
//! HTTP status mapping. [`LlmError::is_transient`] drives the retry policy:
//! timeouts, rate limits and server errors may be retried; everything else
//! is a terminal failure for the call that produced it.

use reqwest::StatusCode;
use thiserror::Error;

/// Unified result alias for the entire crate.
pub type Result<T> = std::result::Result<T, LlmError>;

/// Top-level error for the `llm-service` crate.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum LlmError {
    /// Configuration/validation errors (startup/readiness).
    #[error("config error: {0}")]
    Config(String),

    /// Underlying HTTP transport error (e.g., `reqwest::Error`).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Upstream returned a non-successful HTTP status.
    #[error("HTTP {status} from {url}: {snippet}")]
    HttpStatus {
        /// Numeric HTTP status code.
        status: StatusCode,
        /// Request URL.
        url: String,
        /// Short snippet of the response body (trimmed).
        snippet: String,
    },

    /// Response payload could not be decoded as expected.
    #[error("decode error: {0}")]
    Decode(String),

    /// Retries exhausted; wraps the last transient error.
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<LlmError>,
    },
}

impl LlmError {
    /// Whether a retry may succeed: transport-level failures (timeouts,
    /// connection resets) and 408/429/5xx statuses. Config and decode
    /// errors never heal on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            LlmError::HttpStatus { status, .. } => {
                status.as_u16() == 408 || status.as_u16() == 429 || status.is_server_error()
            }
            _ => false,
        }
    }
}

/// Trims an upstream error body down to a loggable snippet.
pub fn make_snippet(text: &str) -> String {
    text.chars().take(240).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16) -> LlmError {
        LlmError::HttpStatus {
            status: StatusCode::from_u16(status).unwrap(),
            url: "http://localhost/test".into(),
            snippet: String::new(),
        }
    }

    #[test]
    fn transient_classification() {
        assert!(http(429).is_transient());
        assert!(http(503).is_transient());
        assert!(http(408).is_transient());
        assert!(!http(401).is_transient());
        assert!(!http(404).is_transient());
        assert!(!LlmError::Config("bad".into()).is_transient());
        assert!(!LlmError::Decode("bad".into()).is_transient());
    }
}
