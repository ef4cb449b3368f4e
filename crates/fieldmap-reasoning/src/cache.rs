//! In-memory cache of reasoning decisions.

use std::collections::HashMap;
use std::sync::RwLock;

/// What the backend decided for one field.
#[derive(Debug, Clone, PartialEq)]
pub struct ReasoningDecision {
    /// `None` when the backend found no suitable target.
    pub target: Option<String>,
    pub confidence: f32,
    pub reasoning: String,
}

/// Identifies a request: same source, entity and candidate set give the same
/// answer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReasoningCacheKey {
    source: String,
    entity: String,
    candidates: Vec<String>,
}

impl ReasoningCacheKey {
    pub fn new<I, S>(source: &str, entity: &str, candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut candidates: Vec<String> = candidates
            .into_iter()
            .map(|c| c.as_ref().to_ascii_uppercase())
            .collect();
        candidates.sort();
        candidates.dedup();
        Self {
            source: source.trim().to_string(),
            entity: entity.trim().to_ascii_lowercase(),
            candidates,
        }
    }
}

/// Process-lifetime decision cache. Not persisted.
#[derive(Debug, Default)]
pub struct ReasoningCache {
    entries: RwLock<HashMap<ReasoningCacheKey, ReasoningDecision>>,
}

impl ReasoningCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &ReasoningCacheKey) -> Option<ReasoningDecision> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    pub fn insert(&self, key: ReasoningCacheKey, decision: ReasoningDecision) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(key, decision);
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.write().unwrap_or_else(|e| e.into_inner()).clear();
    }
}
