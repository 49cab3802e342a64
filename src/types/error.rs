//! Unified Error Type System
//!
//! Centralized error types for the entire application.
//!
//! ## Error Taxonomy
//!
//! - **Input validation** (`RepositoryUnavailable`, `InvalidDateRange`,
//!   `UnsupportedLanguage`, `UnsupportedPerson`): fatal, surfaced before any
//!   LLM cost is incurred, never retried.
//! - **Provider errors**: classified at the adapter boundary into exactly two
//!   outcomes, retryable and fatal. The retry algorithm only ever sees these
//!   two shapes, never a backend-specific error type.
//! - **`CacheUnavailable`**: non-fatal. A cache outage degrades to direct
//!   computation and is logged as a warning; it must never fail a request.

use std::time::Duration;

use thiserror::Error;

// =============================================================================
// Provider Error
// =============================================================================

/// Error produced by a provider adapter, already classified.
///
/// Adapters translate their backend's error vocabulary (HTTP statuses, SDK
/// error strings, connection failures) into one of these two variants before
/// the error leaves the adapter. Rate limiting, timeouts, and transient 5xx
/// responses are `Retryable`; auth failures and malformed requests are
/// `Fatal`.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("[{provider}] transient failure: {message}")]
    Retryable {
        provider: String,
        message: String,
        /// Server-suggested wait before the next attempt, if any
        retry_after: Option<Duration>,
    },

    #[error("[{provider}] fatal failure: {message}")]
    Fatal { provider: String, message: String },
}

impl ProviderError {
    pub fn retryable(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Retryable {
            provider: provider.into(),
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn fatal(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fatal {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Attach a server-suggested retry delay (no-op on fatal errors).
    pub fn with_retry_after(self, duration: Duration) -> Self {
        match self {
            Self::Retryable {
                provider, message, ..
            } => Self::Retryable {
                provider,
                message,
                retry_after: Some(duration),
            },
            fatal => fatal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. })
    }

    pub fn provider(&self) -> &str {
        match self {
            Self::Retryable { provider, .. } | Self::Fatal { provider, .. } => provider,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Retryable { message, .. } | Self::Fatal { message, .. } => message,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Retryable { retry_after, .. } => *retry_after,
            Self::Fatal { .. } => None,
        }
    }

    /// Classify an HTTP status code into a retryable or fatal outcome.
    ///
    /// 429 and the 5xx family may resolve on their own; everything else in
    /// the error range is a request we should not repeat.
    pub fn classify_http_status(status: u16, message: impl Into<String>, provider: &str) -> Self {
        match status {
            429 => Self::retryable(provider, message).with_retry_after(Duration::from_secs(30)),
            500..=599 => Self::retryable(provider, message),
            _ => Self::fatal(provider, message),
        }
    }

    /// Classify a transport-level error from reqwest.
    ///
    /// Timeouts and connection failures are transient; request-building
    /// errors are not.
    pub fn classify_transport(err: &reqwest::Error, provider: &str) -> Self {
        if err.is_timeout() || err.is_connect() {
            Self::retryable(provider, err.to_string())
        } else if let Some(status) = err.status() {
            Self::classify_http_status(status.as_u16(), err.to_string(), provider)
        } else {
            Self::fatal(provider, err.to_string())
        }
    }
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum CvError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    // -------------------------------------------------------------------------
    // Input Validation Errors
    // -------------------------------------------------------------------------
    #[error("repository unavailable at '{location}': {reason}")]
    RepositoryUnavailable { location: String, reason: String },

    #[error("invalid date range: start {start} is after end {end}")]
    InvalidDateRange {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    #[error("unsupported target language: {0:?}")]
    UnsupportedLanguage(String),

    #[error("unsupported grammatical person: {0:?} (expected one of: first, third)")]
    UnsupportedPerson(String),

    // -------------------------------------------------------------------------
    // Provider Errors
    // -------------------------------------------------------------------------
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("{provider}/{model} failed after {attempts} attempts: {message}")]
    ProviderExhausted {
        provider: String,
        model: String,
        attempts: u32,
        message: String,
    },

    #[error("model returned malformed content: {0}")]
    MalformedResponse(String),

    // -------------------------------------------------------------------------
    // Infrastructure Errors
    // -------------------------------------------------------------------------
    /// Non-fatal: the cache manager logs this and falls back to direct
    /// computation rather than failing the request.
    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("run cancelled")]
    Cancelled,
}

impl CvError {
    /// Create a `RepositoryUnavailable` error from a git failure.
    pub fn repository_unavailable(location: impl Into<String>, err: &git2::Error) -> Self {
        Self::RepositoryUnavailable {
            location: location.into(),
            reason: err.message().to_string(),
        }
    }

    /// Check whether this error is worth retrying at the provider layer.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Provider(p) if p.is_retryable())
    }
}

pub type Result<T> = std::result::Result<T, CvError>;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_http_status() {
        let rate_limit = ProviderError::classify_http_status(429, "rate limited", "openai");
        assert!(rate_limit.is_retryable());
        assert_eq!(rate_limit.retry_after(), Some(Duration::from_secs(30)));

        let server = ProviderError::classify_http_status(503, "overloaded", "openai");
        assert!(server.is_retryable());
        assert_eq!(server.retry_after(), None);

        let auth = ProviderError::classify_http_status(401, "bad key", "openai");
        assert!(!auth.is_retryable());

        let bad_request = ProviderError::classify_http_status(400, "malformed", "ollama");
        assert!(!bad_request.is_retryable());
    }

    #[test]
    fn test_retry_after_ignored_on_fatal() {
        let err =
            ProviderError::fatal("openai", "invalid key").with_retry_after(Duration::from_secs(5));
        assert_eq!(err.retry_after(), None);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::retryable("ollama", "connection refused");
        assert_eq!(
            err.to_string(),
            "[ollama] transient failure: connection refused"
        );
        assert_eq!(err.provider(), "ollama");
    }

    #[test]
    fn test_cv_error_retryable() {
        let transient: CvError = ProviderError::retryable("openai", "timeout").into();
        assert!(transient.is_retryable());

        let fatal: CvError = ProviderError::fatal("openai", "auth").into();
        assert!(!fatal.is_retryable());

        assert!(!CvError::Cancelled.is_retryable());
    }

    #[test]
    fn test_invalid_date_range_display() {
        let err = CvError::InvalidDateRange {
            start: chrono::NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
            end: chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        };
        assert!(err.to_string().contains("2024-04-01"));
        assert!(err.to_string().contains("2024-03-01"));
    }
}
