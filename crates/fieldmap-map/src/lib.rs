//! Tiered column-to-schema mapping.
//!
//! [`MappingEngine`] combines the exact/alias, semantic, reasoning and
//! lexical matchers into one pass that assigns each source column at most one
//! target and each target at most one column.

#![deny(unsafe_code)]

pub mod config;
pub mod engine;
pub mod error;
pub mod state;
pub mod stats;
pub mod thresholds;

pub use config::{
    ENV_EMBEDDING_KEY, ENV_EMBEDDING_URL, ENV_REASONING_KEYS, EmbeddingBackendKind, MapperConfig,
    ReasoningSettings, SemanticSettings,
};
pub use engine::{EntityScore, MappingEngine};
pub use error::{ConfigError, Result};
pub use state::{Proposal, TierState};
pub use stats::{MappingOutcome, MappingStats};
pub use thresholds::{ConfidenceLevel, MatchThresholds};
