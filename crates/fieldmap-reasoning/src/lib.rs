//! Generative-reasoning escalation for fields the semantic tier could not
//! settle.
//!
//! The escalator batches ambiguous fields into one prompt per call, spends
//! credentials from a [`KeyPool`] under a daily cap, caches decisions, and
//! falls back to the best semantic candidate whenever a call cannot be
//! resolved.

#![deny(unsafe_code)]

pub mod backend;
pub mod cache;
pub mod error;
pub mod escalator;
pub mod extract;
pub mod pool;
pub mod prompt;

pub use backend::{DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL, GeminiClient, GeminiConfig, ReasoningBackend};
pub use cache::{ReasoningCache, ReasoningCacheKey, ReasoningDecision};
pub use error::{BackendError, Result};
pub use escalator::{
    AmbiguousField, EscalationReport, EscalationStats, EscalatorConfig, FieldResolution,
    ReasoningEscalator, Resolution,
};
pub use extract::{RawDecision, extract_json_array, parse_decisions};
pub use pool::{CredentialStatus, FailureKind, KeyPool, KeyPoolConfig, Lease, PoolState};
pub use prompt::build_prompt;
