//! Cosine-similarity matching of source names against cached field vectors.

use std::collections::HashMap;
use std::sync::Arc;

use fieldmap_lexical::{normalize, spaced};
use fieldmap_model::{CandidateMatch, EntitySchema, FieldDataType, FieldDefinition, MatchMethod, SourceField};
use tracing::{debug, info};

use crate::backend::EmbeddingBackend;
use crate::cache::{EmbeddingCache, EntityEmbeddings, FieldVector};
use crate::error::{EmbeddingError, Result};

/// Largest ranking boost granted for a matching column-type hint.
pub const TYPE_HINT_BOOST: f32 = 0.05;

/// Ranked semantic candidates for one source field.
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticRanking {
    pub source: String,
    /// Best first. Confidence is the raw cosine similarity.
    pub candidates: Vec<CandidateMatch>,
}

impl SemanticRanking {
    pub fn best(&self) -> Option<&CandidateMatch> {
        self.candidates.first()
    }
}

/// Embedding-based matcher for one backend and one cache.
#[derive(Debug, Clone)]
pub struct SemanticMatcher {
    backend: Arc<dyn EmbeddingBackend>,
    cache: Arc<EmbeddingCache>,
}

impl SemanticMatcher {
    pub fn new(backend: Arc<dyn EmbeddingBackend>, cache: Arc<EmbeddingCache>) -> Self {
        Self { backend, cache }
    }

    pub fn model_id(&self) -> &str {
        self.backend.model_id()
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    /// Returns the field vectors for `schema`, building them on a cache miss.
    pub fn build(&self, schema: &EntitySchema) -> Result<Arc<EntityEmbeddings>> {
        if let Some(cached) = self.cache.get(schema, self.model_id()) {
            return Ok(cached);
        }
        self.rebuild(schema)
    }

    /// Re-embeds every field of `schema` and replaces the cached entry.
    pub fn rebuild(&self, schema: &EntitySchema) -> Result<Arc<EntityEmbeddings>> {
        let variants: Vec<Vec<String>> = schema.fields().iter().map(field_variants).collect();
        let vectors = self.embed_grouped(&variants)?;

        let fields = schema
            .fields()
            .iter()
            .zip(vectors)
            .filter_map(|(field, vector)| {
                vector.map(|vector| FieldVector {
                    name: field.name.clone(),
                    data_type: field.data_type,
                    vector,
                })
            })
            .collect::<Vec<_>>();

        info!(
            entity = schema.entity(),
            model = self.model_id(),
            fields = fields.len(),
            "built field embeddings"
        );
        self.cache.store(EntityEmbeddings {
            entity: schema.entity().to_string(),
            model: self.model_id().to_string(),
            fingerprint: schema.fingerprint(),
            fields,
        })
    }

    /// Top `top_k` targets for one source with similarity ≥ `min_similarity`.
    pub fn match_field(
        &self,
        source: &str,
        schema: &EntitySchema,
        top_k: usize,
        min_similarity: f32,
    ) -> Result<Vec<CandidateMatch>> {
        let rankings = self.map_batch(
            &[SourceField::new(source)],
            schema,
            min_similarity,
            &HashMap::new(),
        )?;
        let mut candidates = rankings
            .into_iter()
            .next()
            .map(|ranking| ranking.candidates)
            .unwrap_or_default();
        candidates.truncate(top_k);
        Ok(candidates)
    }

    /// Ranks every source against the schema in one embedding call.
    ///
    /// Candidates below `min_confidence` are dropped. When a source has a
    /// column-type hint (from `column_type_hints` or its own `column_type`),
    /// fields declaring that type are ranked as if `TYPE_HINT_BOOST` higher.
    /// The reported confidence is never boosted. Cached vectors for fields
    /// no longer in `schema` are ignored.
    pub fn map_batch(
        &self,
        sources: &[SourceField],
        schema: &EntitySchema,
        min_confidence: f32,
        column_type_hints: &HashMap<String, FieldDataType>,
    ) -> Result<Vec<SemanticRanking>> {
        let embeddings = self.build(schema)?;
        let variants: Vec<Vec<String>> = sources.iter().map(|s| source_variants(&s.name)).collect();
        let vectors = self.embed_grouped(&variants)?;

        let mut rankings = Vec::with_capacity(sources.len());
        for (source, vector) in sources.iter().zip(vectors) {
            let hint = column_type_hints
                .get(&source.name)
                .copied()
                .or(source.column_type);
            let candidates = match vector {
                Some(vector) => rank_fields(&vector, &embeddings, schema, min_confidence, hint)?,
                None => Vec::new(),
            };
            rankings.push(SemanticRanking {
                source: source.name.clone(),
                candidates,
            });
        }
        debug!(
            entity = schema.entity(),
            sources = sources.len(),
            "semantic ranking complete"
        );
        Ok(rankings)
    }

    /// Embeds groups of variants in one backend call and averages each group.
    /// Empty groups yield `None`.
    fn embed_grouped(&self, groups: &[Vec<String>]) -> Result<Vec<Option<Vec<f32>>>> {
        let texts: Vec<String> = groups.iter().flatten().cloned().collect();
        let mut vectors = self.backend.embed(&texts)?.into_iter();
        if vectors.len() != texts.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "backend returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }

        let mut averaged = Vec::with_capacity(groups.len());
        for group in groups {
            let members: Vec<Vec<f32>> = vectors.by_ref().take(group.len()).collect();
            averaged.push(mean_vector(&members)?);
        }
        Ok(averaged)
    }
}

fn rank_fields(
    vector: &[f32],
    embeddings: &EntityEmbeddings,
    schema: &EntitySchema,
    min_confidence: f32,
    hint: Option<FieldDataType>,
) -> Result<Vec<CandidateMatch>> {
    let mut scored = Vec::with_capacity(embeddings.fields.len());
    for field in &embeddings.fields {
        // Manual invalidation can keep vectors for removed fields.
        let Some(current) = schema.field(&field.name) else {
            continue;
        };
        if field.vector.len() != vector.len() {
            return Err(EmbeddingError::DimensionMismatch {
                expected: field.vector.len(),
                actual: vector.len(),
            });
        }
        let similarity = cosine_similarity(vector, &field.vector);
        if similarity < min_confidence {
            continue;
        }
        let boost = if hint == Some(current.data_type) {
            TYPE_HINT_BOOST
        } else {
            0.0
        };
        scored.push((similarity + boost, CandidateMatch::new(&current.name, similarity, MatchMethod::Vector)));
    }
    // Stable sort keeps schema order among equal scores.
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    Ok(scored.into_iter().map(|(_, candidate)| candidate).collect())
}

/// Cosine similarity clamped to `[0, 1]`; zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}

fn mean_vector(vectors: &[Vec<f32>]) -> Result<Option<Vec<f32>>> {
    let Some(first) = vectors.first() else {
        return Ok(None);
    };
    let mut mean = vec![0.0f32; first.len()];
    for vector in vectors {
        if vector.len() != mean.len() {
            return Err(EmbeddingError::DimensionMismatch {
                expected: mean.len(),
                actual: vector.len(),
            });
        }
        for (acc, value) in mean.iter_mut().zip(vector) {
            *acc += value;
        }
    }
    let count = vectors.len() as f32;
    for value in &mut mean {
        *value /= count;
    }
    Ok(Some(mean))
}

/// Textual variants describing a target field.
fn field_variants(field: &FieldDefinition) -> Vec<String> {
    dedup_variants([
        field.name.clone(),
        field.label().to_string(),
        field.description.clone(),
        spaced(&field.name),
        spaced(field.label()),
    ])
}

/// Textual variants of a raw source name.
fn source_variants(name: &str) -> Vec<String> {
    dedup_variants([spaced(name), normalize(name), name.trim().to_string()])
}

fn dedup_variants<const N: usize>(candidates: [String; N]) -> Vec<String> {
    let mut variants: Vec<String> = Vec::with_capacity(N);
    for candidate in candidates {
        let candidate = candidate.trim().to_lowercase();
        if !candidate.is_empty() && !variants.contains(&candidate) {
            variants.push(candidate);
        }
    }
    variants
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_is_clamped() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 1.0], &[2.0, 2.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn mean_of_nothing_is_none() {
        assert_eq!(mean_vector(&[]).unwrap(), None);
        let mean = mean_vector(&[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap().unwrap();
        assert_eq!(mean, vec![0.5, 0.5]);
    }

    #[test]
    fn variants_are_deduplicated() {
        let field = FieldDefinition::new("FIRST_NAME", FieldDataType::String)
            .with_display_name("First Name");
        assert_eq!(field_variants(&field), vec!["first_name", "first name"]);
        assert_eq!(source_variants("fname"), vec!["fname"]);
        assert_eq!(source_variants("WorkEmail"), vec!["work email", "workemail"]);
    }
}
