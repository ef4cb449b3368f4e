//! Vector-semantic matching of source columns to schema fields.
//!
//! Field vectors are built once per `(entity, model)` from several textual
//! variants of each field and cached in memory and on disk. Source names are
//! embedded per request and ranked by cosine similarity.

#![deny(unsafe_code)]

pub mod backend;
pub mod cache;
pub mod error;
pub mod matcher;

pub use backend::{
    DEFAULT_HASHING_DIMENSIONS, EmbeddingBackend, HashingEmbedder, HttpEmbedder,
    HttpEmbedderConfig,
};
pub use cache::{EmbeddingCache, EntityEmbeddings, FieldVector, InvalidationPolicy};
pub use error::{EmbeddingError, Result};
pub use matcher::{SemanticMatcher, SemanticRanking, TYPE_HINT_BOOST, cosine_similarity};
