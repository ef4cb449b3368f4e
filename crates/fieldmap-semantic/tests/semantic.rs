use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use fieldmap_model::{EntitySchema, FieldDataType, FieldDefinition, MatchMethod, SourceField};
use fieldmap_semantic::{
    EmbeddingBackend, EmbeddingCache, EmbeddingError, HashingEmbedder, InvalidationPolicy,
    SemanticMatcher,
};

/// Maps known phrases onto fixed axes; anything else is the zero vector.
#[derive(Debug, Default)]
struct AxisEmbedder {
    calls: AtomicUsize,
}

impl AxisEmbedder {
    fn axis(text: &str) -> [f32; 4] {
        if text.contains("mail") {
            [1.0, 0.0, 0.0, 0.0]
        } else if text.contains("phone") || text.contains("tel") {
            [0.0, 1.0, 0.0, 0.0]
        } else if text.contains("date") || text.contains("hired") {
            [0.0, 0.0, 1.0, 0.0]
        } else if text.contains("start") {
            [0.0, 0.0, 0.96, 0.28]
        } else {
            [0.0, 0.0, 0.0, 0.0]
        }
    }
}

impl EmbeddingBackend for AxisEmbedder {
    fn model_id(&self) -> &str {
        "axis-v1"
    }

    fn embed(&self, texts: &[String]) -> fieldmap_semantic::Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::axis(t).to_vec()).collect())
    }
}

#[derive(Debug)]
struct DownEmbedder;

impl EmbeddingBackend for DownEmbedder {
    fn model_id(&self) -> &str {
        "down"
    }

    fn embed(&self, _texts: &[String]) -> fieldmap_semantic::Result<Vec<Vec<f32>>> {
        Err(EmbeddingError::Network("connection refused".into()))
    }
}

fn schema() -> EntitySchema {
    EntitySchema::new(
        "employee",
        vec![
            FieldDefinition::new("EMAIL", FieldDataType::Email).with_display_name("Email"),
            FieldDefinition::new("WORK_PHONE", FieldDataType::String).with_display_name("Work Phone"),
            FieldDefinition::new("HIRE_DATE", FieldDataType::Date).with_display_name("Hire Date"),
        ],
    )
    .unwrap()
}

#[test]
fn match_field_ranks_by_cosine() {
    let matcher = SemanticMatcher::new(Arc::new(AxisEmbedder::default()), Arc::new(EmbeddingCache::in_memory()));
    let hits = matcher.match_field("e-mail addr", &schema(), 3, 0.5).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].target_field, "EMAIL");
    assert_eq!(hits[0].method, MatchMethod::Vector);
    assert!((hits[0].confidence - 1.0).abs() < 1e-5);
}

#[test]
fn unrelated_source_has_no_candidates() {
    let matcher = SemanticMatcher::new(Arc::new(AxisEmbedder::default()), Arc::new(EmbeddingCache::in_memory()));
    assert!(matcher.match_field("salutation", &schema(), 3, 0.1).unwrap().is_empty());
}

#[test]
fn field_vectors_are_built_once() {
    let backend = Arc::new(AxisEmbedder::default());
    let matcher = SemanticMatcher::new(backend.clone(), Arc::new(EmbeddingCache::in_memory()));
    let schema = schema();
    matcher.build(&schema).unwrap();
    matcher.build(&schema).unwrap();
    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

    matcher.rebuild(&schema).unwrap();
    assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn disk_cache_survives_a_new_matcher() {
    let dir = tempfile::tempdir().expect("tempdir");
    let schema = schema();

    let first = SemanticMatcher::new(
        Arc::new(AxisEmbedder::default()),
        Arc::new(EmbeddingCache::with_dir(dir.path())),
    );
    first.build(&schema).unwrap();
    assert!(dir.path().join("employee__axis-v1.json").exists());

    let backend = Arc::new(AxisEmbedder::default());
    let second = SemanticMatcher::new(backend.clone(), Arc::new(EmbeddingCache::with_dir(dir.path())));
    let cached = second.build(&schema).unwrap();
    assert_eq!(cached.fields.len(), 3);
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn changed_schema_triggers_rebuild_unless_manual() {
    let dir = tempfile::tempdir().expect("tempdir");
    let schema = schema();
    let mut grown = schema.fields().to_vec();
    grown.push(FieldDefinition::new("MOBILE_PHONE", FieldDataType::String));
    let grown = EntitySchema::new("employee", grown).unwrap();

    let seed = SemanticMatcher::new(
        Arc::new(AxisEmbedder::default()),
        Arc::new(EmbeddingCache::with_dir(dir.path())),
    );
    seed.build(&schema).unwrap();

    let backend = Arc::new(AxisEmbedder::default());
    let manual = SemanticMatcher::new(
        backend.clone(),
        Arc::new(EmbeddingCache::with_dir(dir.path()).with_policy(InvalidationPolicy::Manual)),
    );
    assert_eq!(manual.build(&grown).unwrap().fields.len(), 3);
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);

    let fingerprint = SemanticMatcher::new(
        backend.clone(),
        Arc::new(EmbeddingCache::with_dir(dir.path())),
    );
    assert_eq!(fingerprint.build(&grown).unwrap().fields.len(), 4);
    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn stale_vectors_never_name_removed_fields() {
    let dir = tempfile::tempdir().expect("tempdir");
    let seed = SemanticMatcher::new(
        Arc::new(AxisEmbedder::default()),
        Arc::new(EmbeddingCache::with_dir(dir.path())),
    );
    seed.build(&schema()).unwrap();

    // WORK_PHONE and HIRE_DATE are gone; NOTES has no cached vector.
    let shrunk = EntitySchema::new(
        "employee",
        vec![
            FieldDefinition::new("EMAIL", FieldDataType::Email),
            FieldDefinition::new("NOTES", FieldDataType::String),
        ],
    )
    .unwrap();
    let backend = Arc::new(AxisEmbedder::default());
    let manual = SemanticMatcher::new(
        backend.clone(),
        Arc::new(EmbeddingCache::with_dir(dir.path()).with_policy(InvalidationPolicy::Manual)),
    );

    let sources = vec![SourceField::new("tel_no"), SourceField::new("mail")];
    let rankings = manual.map_batch(&sources, &shrunk, 0.1, &HashMap::new()).unwrap();
    assert!(rankings[0].candidates.is_empty(), "{:?}", rankings[0].candidates);
    assert_eq!(rankings[1].best().unwrap().target_field, "EMAIL");
    for candidate in rankings.iter().flat_map(|r| &r.candidates) {
        assert!(shrunk.field(&candidate.target_field).is_some());
    }
    // Only the sources were embedded; the stale entry was reused.
    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn type_hint_reorders_without_changing_confidence() {
    let matcher = SemanticMatcher::new(Arc::new(AxisEmbedder::default()), Arc::new(EmbeddingCache::in_memory()));
    let schema = EntitySchema::new(
        "employee",
        vec![
            FieldDefinition::new("START_NOTE", FieldDataType::String).with_display_name("start"),
            FieldDefinition::new("HIRE_DATE", FieldDataType::Date),
        ],
    )
    .unwrap();
    // "started" has cosine 1.0 to START_NOTE and 0.96 to HIRE_DATE.
    let sources = vec![SourceField::new("started")];

    let plain = matcher.map_batch(&sources, &schema, 0.0, &HashMap::new()).unwrap();
    assert_eq!(plain[0].best().unwrap().target_field, "START_NOTE");

    let mut hints = HashMap::new();
    hints.insert("started".to_string(), FieldDataType::Date);
    let hinted = matcher.map_batch(&sources, &schema, 0.0, &hints).unwrap();
    let best = hinted[0].best().unwrap();
    assert_eq!(best.target_field, "HIRE_DATE");
    assert!((best.confidence - 0.96).abs() < 1e-4);

    // The hint can also come from the source itself.
    let typed = vec![SourceField::new("started").with_column_type(FieldDataType::Date)];
    let typed = matcher.map_batch(&typed, &schema, 0.0, &HashMap::new()).unwrap();
    assert_eq!(typed[0].best().unwrap().target_field, "HIRE_DATE");
}

#[test]
fn backend_failure_surfaces_as_error() {
    let matcher = SemanticMatcher::new(Arc::new(DownEmbedder), Arc::new(EmbeddingCache::in_memory()));
    let err = matcher.match_field("email", &schema(), 3, 0.5).unwrap_err();
    assert!(err.is_retryable());
}

#[test]
fn hashing_embedder_prefers_related_names() {
    let matcher = SemanticMatcher::new(Arc::new(HashingEmbedder::default()), Arc::new(EmbeddingCache::in_memory()));
    let hits = matcher.match_field("work phone", &schema(), 3, 0.0).unwrap();
    assert_eq!(hits[0].target_field, "WORK_PHONE");
}
