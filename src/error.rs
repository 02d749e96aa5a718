//! Huginn error types

use std::time::Duration;

/// Huginn error types
#[derive(Debug, thiserror::Error)]
pub enum HuginnError {
    // Provider/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The provider answered, but the payload was not a usable continuation.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("empty response from model")]
    EmptyResponse,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // Configuration errors
    #[error("no completion provider configured")]
    NoProvider,

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl HuginnError {
    /// Whether the failure is likely to clear up on its own.
    ///
    /// Nothing in this crate retries; the classification only feeds log
    /// fields and metric labels so operators can tell flaky providers from
    /// misconfigured ones.
    pub fn is_transient(&self) -> bool {
        match self {
            HuginnError::Http(_)
            | HuginnError::RateLimited { .. }
            | HuginnError::Timeout(_)
            | HuginnError::EmptyResponse => true,
            HuginnError::Api { status, .. } => matches!(status, 500 | 502 | 503 | 504),
            _ => false,
        }
    }

    /// Short label for the `status` metric dimension.
    pub(crate) fn status_label(&self) -> &'static str {
        match self {
            HuginnError::Timeout(_) => "timeout",
            _ => "error",
        }
    }
}

/// Result type alias for Huginn operations
pub type Result<T> = std::result::Result<T, HuginnError>;
