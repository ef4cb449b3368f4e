use std::path::PathBuf;

use fieldmap_lexical::AliasError;
use fieldmap_model::ModelError;
use fieldmap_reasoning::BackendError;
use fieldmap_semantic::EmbeddingError;
use thiserror::Error;

/// Errors raised while loading configuration or assembling an engine.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<toml::de::Error>,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Aliases(#[from] AliasError),

    #[error(transparent)]
    Schema(#[from] ModelError),

    #[error("embedding backend: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("reasoning backend: {0}")]
    Reasoning(#[from] BackendError),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
