//! REST client error types.

use thiserror::Error;

/// Errors that can occur during REST API calls.
#[derive(Debug, Error)]
pub enum RestError {
    /// Non-success HTTP status with the response body.
    #[error("HTTP {status}: {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body (may be empty).
        body: String,
    },

    /// Request timed out.
    #[error("request timeout")]
    Timeout,

    /// Connection error (network issue).
    #[error("connection error: {0}")]
    Connection(String),

    /// Failed to parse response body as JSON.
    #[error("JSON parse error: {0}")]
    Parse(String),

    /// Rate limited by the server (HTTP 429).
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited {
        /// Suggested wait time before retrying.
        retry_after_ms: u64,
    },

    /// Failed to build the HTTP client or request.
    #[error("request build error: {0}")]
    RequestBuild(String),
}

impl RestError {
    /// Whether the operation may be retried without changing the request.
    pub fn is_retryable(&self) -> bool {
        match self {
            RestError::Timeout | RestError::Connection(_) | RestError::RateLimited { .. } => true,
            RestError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Whether this is a rate-limit response.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, RestError::RateLimited { .. })
    }
}

impl From<reqwest::Error> for RestError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RestError::Timeout
        } else if err.is_connect() {
            RestError::Connection(err.to_string())
        } else if err.is_decode() {
            RestError::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            RestError::Http {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            RestError::Connection(err.to_string())
        }
    }
}
