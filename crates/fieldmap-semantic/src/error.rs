//! Error types for embedding backends and the embedding cache.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors raised while embedding text or loading cached embeddings.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EmbeddingError {
    /// Transport failure (connect, timeout, TLS).
    #[error("embedding request failed: {0}")]
    Network(String),

    /// Backend answered with a non-success status.
    #[error("embedding backend returned {status}: {message}")]
    Api { status: u16, message: String },

    /// Backend asked us to slow down.
    #[error("embedding backend rate limited, retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    /// Response body did not have the expected shape.
    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    /// Vectors of different lengths were compared or cached together.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("corrupt embedding cache file {path}: {source}")]
    CacheFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Backend cannot be used at all (misconfigured, client build failure).
    #[error("embedding backend unavailable: {0}")]
    Unavailable(String),
}

impl EmbeddingError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Returns whether retrying the same request might succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::RateLimited { .. } => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for EmbeddingError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Result type alias for embedding operations.
pub type Result<T> = std::result::Result<T, EmbeddingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(EmbeddingError::Network("timeout".into()).is_retryable());
        assert!(EmbeddingError::RateLimited { retry_after_secs: 5 }.is_retryable());
        assert!(EmbeddingError::Api { status: 503, message: String::new() }.is_retryable());
        assert!(!EmbeddingError::Api { status: 401, message: String::new() }.is_retryable());
        assert!(!EmbeddingError::DimensionMismatch { expected: 3, actual: 4 }.is_retryable());
    }
}
