//! Batched escalation of ambiguous fields to a generative backend.
//!
//! Every failure mode ends in a per-field decision: a reasoned match, a
//! fallback to the best semantic candidate, or a decline. Nothing here
//! returns an error to the caller.

use std::sync::Arc;
use std::time::Duration;

use fieldmap_model::{CandidateMatch, EntitySchema, MatchMethod, SourceField};
use tracing::{debug, info, warn};

use crate::backend::ReasoningBackend;
use crate::cache::{ReasoningCache, ReasoningCacheKey, ReasoningDecision};
use crate::error::{BackendError, Result};
use crate::extract::{RawDecision, parse_decisions};
use crate::pool::{FailureKind, KeyPool};
use crate::prompt::build_prompt;

/// A source field whose best semantic score fell in the ambiguous band.
#[derive(Debug, Clone, PartialEq)]
pub struct AmbiguousField {
    pub source: SourceField,
    /// Semantic candidates, best first.
    pub candidates: Vec<CandidateMatch>,
}

#[derive(Debug, Clone)]
pub struct EscalatorConfig {
    /// Fields per backend call.
    pub batch_size: usize,
    pub max_candidates: usize,
    pub max_samples: usize,
    /// Upper bound on a single backend call.
    pub timeout: Duration,
    /// Backend confidences are clamped into `[min_confidence, max_confidence]`.
    pub min_confidence: f32,
    pub max_confidence: f32,
}

impl Default for EscalatorConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            max_candidates: 5,
            max_samples: 5,
            timeout: Duration::from_secs(10),
            min_confidence: 0.50,
            max_confidence: 0.90,
        }
    }
}

/// Outcome for one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The backend picked a candidate.
    Reasoned(CandidateMatch),
    /// The backend failed; best semantic candidate as `vector_fallback`.
    Fallback(CandidateMatch),
    /// The backend answered that no candidate fits.
    Declined,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldResolution {
    pub source: String,
    pub resolution: Resolution,
    pub reasoning: Option<String>,
}

impl FieldResolution {
    pub fn candidate(&self) -> Option<&CandidateMatch> {
        match &self.resolution {
            Resolution::Reasoned(c) | Resolution::Fallback(c) => Some(c),
            Resolution::Declined => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EscalationStats {
    /// Backend calls made, retries included.
    pub requests: usize,
    pub cache_hits: usize,
    /// Failed calls and unusable responses.
    pub failures: usize,
    pub fallbacks: usize,
}

/// Resolutions in input order plus counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EscalationReport {
    pub resolutions: Vec<FieldResolution>,
    pub stats: EscalationStats,
}

/// Tier-3 escalator.
#[derive(Debug, Clone)]
pub struct ReasoningEscalator {
    backend: Arc<dyn ReasoningBackend>,
    pool: Arc<KeyPool>,
    cache: Arc<ReasoningCache>,
    config: EscalatorConfig,
}

impl ReasoningEscalator {
    pub fn new(
        backend: Arc<dyn ReasoningBackend>,
        pool: Arc<KeyPool>,
        cache: Arc<ReasoningCache>,
        config: EscalatorConfig,
    ) -> Self {
        Self {
            backend,
            pool,
            cache,
            config,
        }
    }

    pub fn config(&self) -> &EscalatorConfig {
        &self.config
    }

    pub fn cache(&self) -> &ReasoningCache {
        &self.cache
    }

    pub fn pool(&self) -> &KeyPool {
        &self.pool
    }

    /// Resolves every field, answering from cache where possible.
    pub async fn resolve(&self, schema: &EntitySchema, fields: Vec<AmbiguousField>) -> EscalationReport {
        let mut stats = EscalationStats::default();
        let mut slots: Vec<Option<FieldResolution>> = vec![None; fields.len()];
        let mut pending: Vec<(usize, AmbiguousField, ReasoningCacheKey)> = Vec::new();

        for (index, mut field) in fields.into_iter().enumerate() {
            field.candidates.truncate(self.config.max_candidates);
            let key = ReasoningCacheKey::new(
                &field.source.name,
                schema.entity(),
                field.candidates.iter().map(|c| c.target_field.as_str()),
            );
            if let Some(decision) = self.cache.get(&key) {
                stats.cache_hits += 1;
                slots[index] = Some(apply(&field, decision));
            } else {
                pending.push((index, field, key));
            }
        }

        for chunk in pending.chunks(self.config.batch_size.max(1)) {
            let batch: Vec<AmbiguousField> = chunk.iter().map(|(_, field, _)| field.clone()).collect();
            let decisions = self.run_batch(schema, &batch, &mut stats).await;

            for ((index, field, key), decision) in chunk.iter().zip(decisions) {
                let resolution = match decision {
                    Some(decision) => {
                        self.cache.insert(key.clone(), decision.clone());
                        apply(field, decision)
                    }
                    None => {
                        stats.fallbacks += 1;
                        fallback(field)
                    }
                };
                slots[*index] = Some(resolution);
            }
        }

        let resolutions: Vec<FieldResolution> = slots.into_iter().flatten().collect();
        info!(
            entity = schema.entity(),
            fields = resolutions.len(),
            requests = stats.requests,
            cache_hits = stats.cache_hits,
            failures = stats.failures,
            fallbacks = stats.fallbacks,
            "reasoning escalation complete"
        );
        EscalationReport { resolutions, stats }
    }

    /// One batched call. Returns a validated decision per field, or `None`
    /// for fields that must fall back.
    async fn run_batch(
        &self,
        schema: &EntitySchema,
        batch: &[AmbiguousField],
        stats: &mut EscalationStats,
    ) -> Vec<Option<ReasoningDecision>> {
        let prompt = build_prompt(schema, batch, self.config.max_candidates, self.config.max_samples);
        let text = match self.call_with_rotation(&prompt, stats).await {
            Ok(text) => text,
            Err(error) => {
                warn!(%error, fields = batch.len(), "reasoning batch failed, falling back");
                return vec![None; batch.len()];
            }
        };
        let decisions = match parse_decisions(&text) {
            Ok(decisions) => decisions,
            Err(error) => {
                stats.failures += 1;
                warn!(%error, fields = batch.len(), "unusable reasoning response, falling back");
                return vec![None; batch.len()];
            }
        };

        batch
            .iter()
            .map(|field| {
                let raw = find_decision(&decisions, &field.source.name)?;
                match self.validate(field, raw) {
                    Ok(decision) => Some(decision),
                    Err(reason) => {
                        warn!(source = %field.source.name, reason, "rejecting reasoning decision");
                        None
                    }
                }
            })
            .collect()
    }

    /// Calls the backend, rotating to another credential and retrying once
    /// on a retryable failure.
    async fn call_with_rotation(&self, prompt: &str, stats: &mut EscalationStats) -> Result<String> {
        let mut last_error = BackendError::NoCredential;
        for attempt in 0..2 {
            let Some(lease) = self.pool.acquire_credential().await else {
                stats.failures += 1;
                return Err(BackendError::NoCredential);
            };
            stats.requests += 1;
            debug!(attempt, credential = lease.index, backend = self.backend.name(), "calling reasoning backend");

            let call = self.backend.generate(&lease.key, prompt);
            let result = match tokio::time::timeout(self.config.timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(BackendError::Timeout {
                    timeout_secs: self.config.timeout.as_secs(),
                }),
            };

            match result {
                Ok(text) => {
                    self.pool.report_success(lease.index).await;
                    return Ok(text);
                }
                Err(error) => {
                    stats.failures += 1;
                    let kind = if error.is_quota_signal() {
                        FailureKind::Quota
                    } else {
                        FailureKind::Other
                    };
                    self.pool.report_failure(lease.index, kind).await;
                    warn!(attempt, credential = lease.index, %error, "reasoning call failed");
                    if !error.is_retryable() {
                        return Err(error);
                    }
                    last_error = error;
                }
            }
        }
        Err(last_error)
    }

    fn validate(&self, field: &AmbiguousField, raw: &RawDecision) -> std::result::Result<ReasoningDecision, &'static str> {
        let reasoning = raw.reasoning.clone().unwrap_or_default();
        let target = raw
            .target
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty() && !t.eq_ignore_ascii_case("null") && !t.eq_ignore_ascii_case("none"));

        let Some(target) = target else {
            return Ok(ReasoningDecision {
                target: None,
                confidence: 0.0,
                reasoning,
            });
        };
        let Some(candidate) = field
            .candidates
            .iter()
            .find(|c| c.target_field.eq_ignore_ascii_case(target))
        else {
            return Err("target is not among the candidates");
        };

        let confidence = raw
            .confidence
            .filter(|c| c.is_finite())
            .unwrap_or(self.config.min_confidence)
            .clamp(self.config.min_confidence, self.config.max_confidence);
        Ok(ReasoningDecision {
            target: Some(candidate.target_field.clone()),
            confidence,
            reasoning,
        })
    }
}

fn find_decision<'a>(decisions: &'a [RawDecision], source: &str) -> Option<&'a RawDecision> {
    decisions
        .iter()
        .find(|d| d.source == source)
        .or_else(|| decisions.iter().find(|d| d.source.trim().eq_ignore_ascii_case(source.trim())))
}

fn apply(field: &AmbiguousField, decision: ReasoningDecision) -> FieldResolution {
    let resolution = match decision.target {
        Some(target) => Resolution::Reasoned(CandidateMatch::new(target, decision.confidence, MatchMethod::Reasoning)),
        None => Resolution::Declined,
    };
    FieldResolution {
        source: field.source.name.clone(),
        resolution,
        reasoning: Some(decision.reasoning).filter(|r| !r.is_empty()),
    }
}

fn fallback(field: &AmbiguousField) -> FieldResolution {
    let resolution = field
        .candidates
        .iter()
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
        .map_or(Resolution::Declined, |best| {
            Resolution::Fallback(CandidateMatch::new(
                &best.target_field,
                best.confidence,
                MatchMethod::VectorFallback,
            ))
        });
    FieldResolution {
        source: field.source.name.clone(),
        resolution,
        reasoning: None,
    }
}
