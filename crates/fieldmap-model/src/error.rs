use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("schema not found for entity: {entity}")]
    SchemaNotFound { entity: String },

    #[error("duplicate field {field} in entity {entity}")]
    DuplicateField { entity: String, field: String },

    #[error("invalid schema: {message}")]
    InvalidSchema { message: String },

    #[error("unknown data type: {0}")]
    UnknownDataType(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse schema {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ModelError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;
