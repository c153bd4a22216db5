//! Error types for ryt-resolve

use thiserror::Error;

/// Main error type for link resolution
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No structural pattern matched; the player script layout changed
    #[error("Extraction failed: {0}")]
    ExtractionFailure(String),

    /// No usable JavaScript execution path is configured
    #[error("JS runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    /// The engine ran but its output was unusable, or the process/HTTP call failed
    #[error("Execution failed: {0}")]
    ExecutionFailure(String),

    /// A solver helper script did not match its published digest
    #[error("Verification failed: {0}")]
    VerificationFailure(String),

    /// Provider response rejected at the caller boundary
    #[error("Validation failed: {0}")]
    ValidationFailure(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    UrlError(#[from] url::ParseError),
}

impl ResolveError {
    /// Check if a repeated request may succeed (timeouts, refused connections, 5xx)
    pub fn is_retryable(&self) -> bool {
        match self {
            ResolveError::HttpError(e) => {
                e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
            }
            _ => false,
        }
    }

    /// Rebuild an owned error from one shared by a memoizing cache.
    ///
    /// Only the message survives for wrapped foreign errors.
    pub(crate) fn from_shared(error: &ResolveError) -> ResolveError {
        match error {
            ResolveError::ExtractionFailure(m) => ResolveError::ExtractionFailure(m.clone()),
            ResolveError::RuntimeUnavailable(m) => ResolveError::RuntimeUnavailable(m.clone()),
            ResolveError::ExecutionFailure(m) => ResolveError::ExecutionFailure(m.clone()),
            ResolveError::VerificationFailure(m) => ResolveError::VerificationFailure(m.clone()),
            ResolveError::ValidationFailure(m) => ResolveError::ValidationFailure(m.clone()),
            ResolveError::ConfigError(m) => ResolveError::ConfigError(m.clone()),
            other => ResolveError::ExecutionFailure(other.to_string()),
        }
    }
}
