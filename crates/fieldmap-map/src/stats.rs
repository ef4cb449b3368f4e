//! Mapping results and aggregate counters.

use std::collections::BTreeMap;

use fieldmap_model::{Mapping, MatchMethod};
use serde::Serialize;

use crate::thresholds::{ConfidenceLevel, MatchThresholds};

/// Per-tier counts for one `auto_map` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MappingStats {
    pub total: usize,
    pub mapped: usize,
    pub unmapped: usize,
    pub exact: usize,
    pub alias: usize,
    /// `alias_partial`, `partial` and `fuzzy` hits from the final pass.
    pub lexical: usize,
    pub vector: usize,
    pub reasoning: usize,
    pub vector_fallback: usize,
    pub manual: usize,
    pub reasoning_requests: usize,
    pub reasoning_cache_hits: usize,
    pub reasoning_failures: usize,
    /// False when the embedding backend failed and tier 2 was skipped.
    pub semantic_available: bool,
    /// Share of sources mapped without human input, in `[0, 1]`.
    pub auto_approval_rate: f32,
}

impl MappingStats {
    /// Tallies method counts from final mappings. Reasoning counters and
    /// `semantic_available` are left for the caller.
    pub fn from_mappings(mappings: &[Mapping]) -> Self {
        let mut stats = Self {
            total: mappings.len(),
            semantic_available: true,
            ..Self::default()
        };
        for mapping in mappings {
            match mapping.method {
                MatchMethod::Exact => stats.exact += 1,
                MatchMethod::Alias => stats.alias += 1,
                MatchMethod::AliasPartial | MatchMethod::Partial | MatchMethod::Fuzzy => stats.lexical += 1,
                MatchMethod::Vector => stats.vector += 1,
                MatchMethod::Reasoning => stats.reasoning += 1,
                MatchMethod::VectorFallback => stats.vector_fallback += 1,
                MatchMethod::Manual => stats.manual += 1,
            }
            if mapping.is_mapped() {
                stats.mapped += 1;
            } else {
                stats.unmapped += 1;
            }
        }
        stats.auto_approval_rate = if stats.total == 0 {
            0.0
        } else {
            stats.mapped as f32 / stats.total as f32
        };
        stats
    }
}

/// Result of mapping one source dataset onto one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappingOutcome {
    pub entity: String,
    /// One entry per source, best confidence first.
    pub mappings: Vec<Mapping>,
    pub stats: MappingStats,
}

impl MappingOutcome {
    pub fn mapping_for(&self, source: &str) -> Option<&Mapping> {
        self.mappings.iter().find(|m| m.source == source)
    }

    pub fn target_for(&self, source: &str) -> Option<&str> {
        self.mapping_for(source).and_then(|m| m.target.as_deref())
    }

    /// Sources that need a manual decision.
    pub fn unmapped(&self) -> impl Iterator<Item = &str> {
        self.mappings
            .iter()
            .filter(|m| !m.is_mapped())
            .map(|m| m.source.as_str())
    }

    /// Count of mapped entries at each confidence level.
    #[must_use]
    pub fn count_by_level(&self, thresholds: &MatchThresholds) -> BTreeMap<ConfidenceLevel, usize> {
        let mut counts = BTreeMap::new();
        for mapping in self.mappings.iter().filter(|m| m.is_mapped()) {
            if let Some(level) = thresholds.categorize(mapping.confidence) {
                *counts.entry(level).or_insert(0) += 1;
            }
        }
        counts
    }
}
