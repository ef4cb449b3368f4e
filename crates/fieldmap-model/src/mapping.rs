//! Column mapping types for source-to-schema field mapping.
//!
//! This module provides the request-side [`SourceField`] and the result types
//! produced by the matching tiers ([`CandidateMatch`]) and by the engine
//! ([`Mapping`]).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::FieldDataType;

/// Maximum number of alternatives retained on a [`Mapping`].
pub const MAX_ALTERNATIVES: usize = 3;

/// A raw column from an uploaded dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceField {
    /// Column name as it appears in the source file.
    pub name: String,
    /// Column type detected upstream, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_type: Option<FieldDataType>,
    /// A handful of sample values, used only for reasoning prompts.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub samples: Vec<String>,
}

impl SourceField {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: None,
            samples: Vec::new(),
        }
    }

    pub fn with_column_type(mut self, column_type: FieldDataType) -> Self {
        self.column_type = Some(column_type);
        self
    }

    pub fn with_samples<I, S>(mut self, samples: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.samples = samples.into_iter().map(Into::into).collect();
        self
    }

    /// Builds source fields from bare column names.
    pub fn from_names<I, S>(names: I) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names.into_iter().map(Self::new).collect()
    }
}

/// Strategy that produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    /// Normalized source equals normalized target name.
    Exact,
    /// Normalized source equals a registered alias.
    Alias,
    /// Lexical match against an alias rather than the target name.
    AliasPartial,
    /// Substring, suffix, or word-overlap heuristic.
    Partial,
    /// Edit-distance similarity.
    Fuzzy,
    /// Embedding cosine similarity.
    Vector,
    /// Chosen by the generative reasoning backend.
    Reasoning,
    /// Best semantic candidate used after reasoning failed.
    VectorFallback,
    /// No automatic match; needs a human decision.
    Manual,
}

impl MatchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMethod::Exact => "exact",
            MatchMethod::Alias => "alias",
            MatchMethod::AliasPartial => "alias_partial",
            MatchMethod::Partial => "partial",
            MatchMethod::Fuzzy => "fuzzy",
            MatchMethod::Vector => "vector",
            MatchMethod::Reasoning => "reasoning",
            MatchMethod::VectorFallback => "vector_fallback",
            MatchMethod::Manual => "manual",
        }
    }

    /// Rank used to break confidence ties between lexical methods.
    /// Higher wins.
    pub fn lexical_priority(&self) -> u8 {
        match self {
            MatchMethod::Exact => 5,
            MatchMethod::Alias => 4,
            MatchMethod::AliasPartial => 3,
            MatchMethod::Partial => 2,
            MatchMethod::Fuzzy => 1,
            _ => 0,
        }
    }
}

impl fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A candidate target for one source field, as emitted by a single tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateMatch {
    pub target_field: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
    pub method: MatchMethod,
}

impl CandidateMatch {
    pub fn new(target_field: impl Into<String>, confidence: f32, method: MatchMethod) -> Self {
        Self {
            target_field: target_field.into(),
            confidence: confidence.clamp(0.0, 1.0),
            method,
        }
    }
}

/// Final decision for one source field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    pub source: String,
    /// Assigned target, `None` when the field needs manual mapping.
    pub target: Option<String>,
    pub confidence: f32,
    pub method: MatchMethod,
    /// Next-best candidates, at most [`MAX_ALTERNATIVES`].
    #[serde(default)]
    pub alternatives: Vec<CandidateMatch>,
}

impl Mapping {
    /// Creates an accepted mapping from a candidate.
    pub fn accepted(source: impl Into<String>, candidate: CandidateMatch) -> Self {
        Self {
            source: source.into(),
            target: Some(candidate.target_field),
            confidence: candidate.confidence,
            method: candidate.method,
            alternatives: Vec::new(),
        }
    }

    /// Creates an unmapped entry that requires a manual decision.
    pub fn manual(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: None,
            confidence: 0.0,
            method: MatchMethod::Manual,
            alternatives: Vec::new(),
        }
    }

    pub fn is_mapped(&self) -> bool {
        self.target.is_some()
    }

    /// Replaces the alternatives, dropping the assigned target and keeping
    /// only the best [`MAX_ALTERNATIVES`] distinct targets.
    pub fn with_alternatives(mut self, mut alternatives: Vec<CandidateMatch>) -> Self {
        alternatives.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        let mut kept: Vec<CandidateMatch> = Vec::with_capacity(MAX_ALTERNATIVES);
        for candidate in alternatives {
            if kept.len() == MAX_ALTERNATIVES {
                break;
            }
            let is_target = self
                .target
                .as_deref()
                .is_some_and(|t| t.eq_ignore_ascii_case(&candidate.target_field));
            let is_duplicate = kept
                .iter()
                .any(|k| k.target_field.eq_ignore_ascii_case(&candidate.target_field));
            if !is_target && !is_duplicate {
                kept.push(candidate);
            }
        }
        self.alternatives = kept;
        self
    }
}
