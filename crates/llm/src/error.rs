use crate::retry::RetryableError;
use thiserror::Error;

/// Failures of the remote annotator boundary
#[derive(Error, Debug)]
pub enum LlmError {
    /// Quota or rate limit hit (HTTP 429, `RESOURCE_EXHAUSTED`)
    #[error("Resource exhausted: {0}")]
    RateLimited(String),

    /// Internal error reported by the service (HTTP 500)
    #[error("Internal server error: {0}")]
    ServerError(String),

    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl LlmError {
    /// Map a non-success HTTP status and its body onto the error taxonomy.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            429 => Self::RateLimited(body),
            500 => Self::ServerError(body),
            _ => Self::Http {
                status,
                message: body,
            },
        }
    }
}

impl RetryableError for LlmError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::ServerError(_))
    }

    fn error_type(&self) -> &'static str {
        match self {
            Self::RateLimited(_) => "rate_limit",
            Self::ServerError(_) => "server_error",
            Self::Http { status: 400, .. } => "bad_request",
            Self::Http { status: 401, .. } => "unauthorized",
            Self::Http { status: 403, .. } => "forbidden",
            Self::Http { status: 404, .. } => "not_found",
            Self::Http { .. } => "http",
            Self::Network(_) => "network",
            Self::InvalidResponse(_) => "invalid_response",
            Self::Configuration(_) => "configuration",
        }
    }
}
