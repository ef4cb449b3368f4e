//! Mapping engine implementation.
//!
//! `auto_map` runs a fixed pipeline over a [`TierState`]:
//!
//! 1. exact / alias hits at or above `exact_accept`
//! 2. semantic hits at or above `medium`; hits in the ambiguous band are set aside
//! 3. reasoning over the ambiguous set, when an escalator is configured
//! 4. lexical pass over whatever is left, at the caller's `min_confidence`
//! 5. everything else becomes a `manual` entry
//!
//! Within a tier, assignment is greedy over candidates sorted by confidence,
//! and a claimed target is never reused.

use std::collections::HashMap;
use std::sync::Arc;

use fieldmap_lexical::{AliasDictionary, ExactAliasMatcher, LexicalMatcher};
use fieldmap_model::{
    CandidateMatch, EntitySchema, FieldDataType, Mapping, ModelError, SchemaRegistry, SourceField,
};
use fieldmap_reasoning::{AmbiguousField, EscalationStats, ReasoningEscalator};
use fieldmap_semantic::{EmbeddingError, SemanticMatcher};
use serde::Serialize;
use tracing::{Instrument, Span, debug, info, info_span, warn};

use crate::state::{Proposal, TierState};
use crate::stats::{MappingOutcome, MappingStats};
use crate::thresholds::MatchThresholds;

/// Average best-match confidence of a source dataset against one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityScore {
    pub entity: String,
    pub score: f32,
}

/// Output of tiers 1 and 2.
#[derive(Debug)]
struct LocalPass {
    state: TierState,
    /// Semantic candidates per source index; empty when tier 2 did not rank it.
    semantic: Vec<Vec<CandidateMatch>>,
    ambiguous: Vec<(usize, AmbiguousField)>,
    semantic_available: bool,
}

/// Tiered mapping engine.
///
/// Cheap to clone; matchers and caches are shared.
#[derive(Debug, Clone)]
pub struct MappingEngine {
    exact: Arc<ExactAliasMatcher>,
    lexical: LexicalMatcher,
    semantic: Option<SemanticMatcher>,
    reasoning: Option<ReasoningEscalator>,
    thresholds: MatchThresholds,
}

impl Default for MappingEngine {
    fn default() -> Self {
        Self::new(AliasDictionary::builtin())
    }
}

impl MappingEngine {
    /// A lexical-only engine over `aliases`.
    pub fn new(aliases: AliasDictionary) -> Self {
        let aliases = Arc::new(aliases);
        Self {
            exact: Arc::new(ExactAliasMatcher::new(aliases.as_ref().clone())),
            lexical: LexicalMatcher::new(aliases),
            semantic: None,
            reasoning: None,
            thresholds: MatchThresholds::default(),
        }
    }

    pub fn with_semantic(mut self, semantic: SemanticMatcher) -> Self {
        self.semantic = Some(semantic);
        self
    }

    pub fn with_reasoning(mut self, reasoning: ReasoningEscalator) -> Self {
        self.reasoning = Some(reasoning);
        self
    }

    pub fn with_thresholds(mut self, thresholds: MatchThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn thresholds(&self) -> &MatchThresholds {
        &self.thresholds
    }

    pub fn aliases(&self) -> &AliasDictionary {
        self.lexical.aliases()
    }

    pub fn semantic(&self) -> Option<&SemanticMatcher> {
        self.semantic.as_ref()
    }

    pub fn reasoning(&self) -> Option<&ReasoningEscalator> {
        self.reasoning.as_ref()
    }

    /// Maps every source onto `schema`.
    ///
    /// Always returns one mapping per source. Backend failures degrade the
    /// result (lexical-only, vector fallback) but never fail the call.
    /// Must be awaited inside a Tokio runtime: tiers 1 and 2 run on the
    /// blocking pool.
    pub async fn auto_map(
        &self,
        sources: &[SourceField],
        schema: &EntitySchema,
        min_confidence: f32,
        column_type_hints: &HashMap<String, FieldDataType>,
    ) -> MappingOutcome {
        let span = info_span!("auto_map", entity = schema.entity(), sources = sources.len());
        self.run_pipeline(sources, schema, min_confidence, column_type_hints)
            .instrument(span)
            .await
    }

    /// Resolves `entity` in `registry`, then runs [`Self::auto_map`].
    pub async fn auto_map_entity(
        &self,
        registry: &SchemaRegistry,
        entity: &str,
        sources: &[SourceField],
        min_confidence: f32,
        column_type_hints: &HashMap<String, FieldDataType>,
    ) -> Result<MappingOutcome, ModelError> {
        let schema = registry.get(entity)?;
        Ok(self.auto_map(sources, schema, min_confidence, column_type_hints).await)
    }

    async fn run_pipeline(
        &self,
        sources: &[SourceField],
        schema: &EntitySchema,
        min_confidence: f32,
        column_type_hints: &HashMap<String, FieldDataType>,
    ) -> MappingOutcome {
        let min_confidence = if min_confidence.is_finite() {
            min_confidence.clamp(0.0, 1.0)
        } else {
            self.thresholds.min_confidence
        };

        let local = {
            let engine = self.clone();
            let owned_sources = sources.to_vec();
            let owned_schema = schema.clone();
            let hints = column_type_hints.clone();
            let span = Span::current();
            let task = tokio::task::spawn_blocking(move || {
                span.in_scope(|| engine.local_tiers(&owned_sources, &owned_schema, &hints))
            });
            match task.await {
                Ok(local) => local,
                Err(error) if error.is_panic() => std::panic::resume_unwind(error.into_panic()),
                Err(error) => {
                    warn!(%error, "blocking tier task cancelled, running inline");
                    self.local_tiers(sources, schema, column_type_hints)
                }
            }
        };

        let LocalPass {
            mut state,
            semantic,
            ambiguous,
            semantic_available,
        } = local;

        let mut reasoning_stats = EscalationStats::default();
        if let Some(escalator) = &self.reasoning
            && !ambiguous.is_empty()
        {
            let (indices, fields): (Vec<usize>, Vec<AmbiguousField>) = ambiguous.into_iter().unzip();
            let report = escalator.resolve(schema, fields).await;
            let proposals = indices
                .iter()
                .zip(&report.resolutions)
                .filter_map(|(&index, resolution)| {
                    resolution
                        .candidate()
                        .map(|candidate| Proposal::new(index, candidate.clone()))
                })
                .collect();
            state = state.assign(proposals);
            reasoning_stats = report.stats;
            debug!(tier = "reasoning", mapped = state.mapped_count(), "tier complete");
        }

        state = self.lexical_tier(state, sources, schema, min_confidence);
        debug!(tier = "lexical", mapped = state.mapped_count(), "tier complete");

        let targets: Vec<&str> = schema.field_names().collect();
        let mut mappings: Vec<Mapping> = sources
            .iter()
            .zip(state.into_slots())
            .zip(&semantic)
            .map(|((source, slot), ranked)| {
                let mapping = match slot {
                    Some(candidate) => Mapping::accepted(&source.name, candidate),
                    None => Mapping::manual(&source.name),
                };
                mapping.with_alternatives(self.alternatives(&source.name, ranked, &targets))
            })
            .collect();
        // Stable: equal confidences keep source order.
        mappings.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let mut stats = MappingStats::from_mappings(&mappings);
        stats.semantic_available = semantic_available;
        stats.reasoning_requests = reasoning_stats.requests;
        stats.reasoning_cache_hits = reasoning_stats.cache_hits;
        stats.reasoning_failures = reasoning_stats.failures;

        info!(
            total = stats.total,
            mapped = stats.mapped,
            exact = stats.exact,
            alias = stats.alias,
            vector = stats.vector,
            reasoning = stats.reasoning,
            vector_fallback = stats.vector_fallback,
            lexical = stats.lexical,
            manual = stats.manual,
            semantic_available = stats.semantic_available,
            auto_approval_rate = stats.auto_approval_rate,
            "mapping complete"
        );

        MappingOutcome {
            entity: schema.entity().to_string(),
            mappings,
            stats,
        }
    }

    /// Tiers 1 and 2. Synchronous; may block on the embedding backend.
    fn local_tiers(
        &self,
        sources: &[SourceField],
        schema: &EntitySchema,
        column_type_hints: &HashMap<String, FieldDataType>,
    ) -> LocalPass {
        let targets: Vec<&str> = schema.field_names().collect();

        let proposals = sources
            .iter()
            .enumerate()
            .filter_map(|(index, source)| {
                self.exact
                    .match_field(&source.name, &targets)
                    .filter(|c| c.confidence >= self.thresholds.exact_accept)
                    .map(|candidate| Proposal::new(index, candidate))
            })
            .collect();
        let mut state = TierState::new(sources.len()).assign(proposals);
        debug!(tier = "exact", mapped = state.mapped_count(), "tier complete");

        let mut semantic = vec![Vec::new(); sources.len()];
        let Some(matcher) = &self.semantic else {
            return LocalPass {
                state,
                semantic,
                ambiguous: Vec::new(),
                semantic_available: false,
            };
        };

        let pending = state.unmapped();
        if !pending.is_empty() {
            let batch: Vec<SourceField> = pending.iter().map(|&i| sources[i].clone()).collect();
            match matcher.map_batch(&batch, schema, self.thresholds.ambiguous_low, column_type_hints) {
                Ok(rankings) => {
                    for (&index, ranking) in pending.iter().zip(rankings) {
                        semantic[index] = ranking.candidates;
                    }
                }
                Err(error) => {
                    warn!(%error, entity = schema.entity(), "embedding backend unavailable, continuing lexical-only");
                    return LocalPass {
                        state,
                        semantic,
                        ambiguous: Vec::new(),
                        semantic_available: false,
                    };
                }
            }
        }

        let proposals = semantic
            .iter()
            .enumerate()
            .flat_map(|(index, ranked)| {
                ranked
                    .iter()
                    .filter(|c| c.confidence >= self.thresholds.medium)
                    .map(move |c| Proposal::new(index, c.clone()))
            })
            .collect();
        state = state.assign(proposals);
        debug!(tier = "semantic", mapped = state.mapped_count(), "tier complete");

        let ambiguous: Vec<(usize, AmbiguousField)> = state
            .unmapped()
            .into_iter()
            .filter_map(|index| {
                let candidates: Vec<CandidateMatch> = semantic[index]
                    .iter()
                    .filter(|c| !state.is_used(&c.target_field) && self.thresholds.is_ambiguous(c.confidence))
                    .cloned()
                    .collect();
                (!candidates.is_empty()).then(|| {
                    (
                        index,
                        AmbiguousField {
                            source: sources[index].clone(),
                            candidates,
                        },
                    )
                })
            })
            .collect();
        debug!(ambiguous = ambiguous.len(), "collected ambiguous fields");

        LocalPass {
            state,
            semantic,
            ambiguous,
            semantic_available: true,
        }
    }

    fn lexical_tier(
        &self,
        state: TierState,
        sources: &[SourceField],
        schema: &EntitySchema,
        min_confidence: f32,
    ) -> TierState {
        let open_targets: Vec<&str> = schema.field_names().filter(|t| !state.is_used(t)).collect();
        if open_targets.is_empty() {
            return state;
        }
        let proposals = state
            .unmapped()
            .into_iter()
            .flat_map(|index| {
                self.lexical
                    .rank(&sources[index].name, &open_targets)
                    .into_iter()
                    .filter(|c| c.confidence >= min_confidence)
                    .map(move |c| Proposal::new(index, c))
            })
            .collect();
        state.assign(proposals)
    }

    fn alternatives(&self, source: &str, semantic: &[CandidateMatch], targets: &[&str]) -> Vec<CandidateMatch> {
        let mut alternatives = semantic.to_vec();
        alternatives.extend(
            self.lexical
                .rank(source, targets)
                .into_iter()
                .filter(|c| c.confidence >= self.thresholds.ambiguous_low),
        );
        alternatives
    }

    /// Best targets for one source, best first.
    ///
    /// Uses semantic ranking when available and lexical ranking otherwise;
    /// an exact or alias hit always leads. Calls the embedding backend
    /// synchronously.
    pub fn find_best_match(
        &self,
        source: &str,
        schema: &EntitySchema,
        top_k: usize,
        min_similarity: f32,
    ) -> Vec<CandidateMatch> {
        if top_k == 0 {
            return Vec::new();
        }
        let targets: Vec<&str> = schema.field_names().collect();
        let mut ranked = self
            .semantic_ranking(source, schema)
            .unwrap_or_else(|| self.lexical.rank(source, &targets));

        if let Some(hit) = self.exact.match_field(source, &targets) {
            ranked.retain(|c| c.target_field != hit.target_field);
            ranked.insert(0, hit);
        }
        ranked.retain(|c| c.confidence >= min_similarity);
        ranked.truncate(top_k);
        ranked
    }

    fn semantic_ranking(&self, source: &str, schema: &EntitySchema) -> Option<Vec<CandidateMatch>> {
        let matcher = self.semantic.as_ref()?;
        match matcher.match_field(source, schema, schema.len(), 0.0) {
            Ok(ranked) if !ranked.is_empty() => Some(ranked),
            Ok(_) => None,
            Err(error) => {
                warn!(%error, source, "semantic ranking unavailable, using lexical");
                None
            }
        }
    }

    /// Alternative targets for a source, skipping targets in `exclude`
    /// (case-insensitive).
    pub fn suggest_corrections(
        &self,
        source: &str,
        schema: &EntitySchema,
        exclude: &[String],
        top_k: usize,
    ) -> Vec<CandidateMatch> {
        let mut suggestions = self.find_best_match(
            source,
            schema,
            top_k.saturating_add(exclude.len()),
            self.thresholds.ambiguous_low,
        );
        suggestions.retain(|c| !exclude.iter().any(|e| e.eq_ignore_ascii_case(&c.target_field)));
        suggestions.truncate(top_k);
        suggestions
    }

    /// Ranks every registered entity by the mean best-match confidence of
    /// the sources against it. Ties keep registry order.
    pub fn detect_entity(&self, sources: &[SourceField], registry: &SchemaRegistry) -> Vec<EntityScore> {
        let mut scores: Vec<EntityScore> = registry
            .iter()
            .map(|schema| {
                let total: f32 = sources
                    .iter()
                    .map(|source| {
                        self.find_best_match(&source.name, schema, 1, 0.0)
                            .first()
                            .map_or(0.0, |c| c.confidence)
                    })
                    .sum();
                let score = if sources.is_empty() {
                    0.0
                } else {
                    total / sources.len() as f32
                };
                debug!(entity = schema.entity(), score, "entity score");
                EntityScore {
                    entity: schema.entity().to_string(),
                    score,
                }
            })
            .collect();
        scores.sort_by(|a, b| b.score.total_cmp(&a.score));
        scores
    }

    /// Rebuilds the field vectors for `schema`. Returns the number of fields
    /// embedded.
    pub fn rebuild_embeddings(&self, schema: &EntitySchema) -> Result<usize, EmbeddingError> {
        let matcher = self
            .semantic
            .as_ref()
            .ok_or_else(|| EmbeddingError::Unavailable("semantic matching is disabled".into()))?;
        Ok(matcher.rebuild(schema)?.fields.len())
    }
}
