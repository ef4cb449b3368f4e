//! Error types for generative backends.

use thiserror::Error;

/// Failure of a single reasoning call.
///
/// These never escape the escalator; they decide between retrying on another
/// credential and falling back to the semantic candidate.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum BackendError {
    #[error("reasoning request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("reasoning backend rate limited")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("reasoning quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("reasoning request failed: {0}")]
    Network(String),

    #[error("reasoning backend returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("malformed reasoning response: {0}")]
    MalformedResponse(String),

    /// Every credential is inactive or out of daily quota.
    #[error("no reasoning credential available")]
    NoCredential,
}

impl BackendError {
    /// Whether the credential itself hit a limit, so a different one should
    /// be tried.
    #[must_use]
    pub fn is_quota_signal(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::QuotaExhausted(_))
    }

    /// Whether repeating the call (possibly on another credential) may help.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Network(_) => true,
            Self::RateLimited { .. } | Self::QuotaExhausted(_) => true,
            Self::Api { status, .. } => *status >= 500,
            Self::MalformedResponse(_) | Self::NoCredential => false,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, BackendError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_signals_rotate() {
        assert!(BackendError::RateLimited { retry_after_secs: None }.is_quota_signal());
        assert!(BackendError::QuotaExhausted("daily".into()).is_quota_signal());
        assert!(!BackendError::Timeout { timeout_secs: 10 }.is_quota_signal());
    }

    #[test]
    fn malformed_is_not_retryable() {
        assert!(!BackendError::MalformedResponse("no array".into()).is_retryable());
        assert!(BackendError::Timeout { timeout_secs: 10 }.is_retryable());
        assert!(!BackendError::Api { status: 400, message: String::new() }.is_retryable());
    }
}
