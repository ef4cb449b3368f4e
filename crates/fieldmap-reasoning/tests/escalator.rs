use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use fieldmap_model::{CandidateMatch, EntitySchema, FieldDataType, FieldDefinition, MatchMethod, SourceField};
use fieldmap_reasoning::{
    AmbiguousField, BackendError, EscalatorConfig, KeyPool, KeyPoolConfig, ReasoningBackend,
    ReasoningCache, ReasoningEscalator, Resolution,
};

/// Replays canned responses and records which credential each call used.
#[derive(Debug, Default)]
struct ScriptedBackend {
    responses: Mutex<VecDeque<Result<String, BackendError>>>,
    credentials: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    fn new(responses: Vec<Result<String, BackendError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            credentials: Mutex::default(),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.credentials.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReasoningBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, credential: &str, _prompt: &str) -> Result<String, BackendError> {
        self.credentials.lock().unwrap().push(credential.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(BackendError::Network("script exhausted".into())))
    }
}

/// Never answers in time.
#[derive(Debug)]
struct HangingBackend;

#[async_trait]
impl ReasoningBackend for HangingBackend {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn generate(&self, _credential: &str, _prompt: &str) -> Result<String, BackendError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok("[]".into())
    }
}

fn schema() -> EntitySchema {
    EntitySchema::new(
        "employee",
        vec![
            FieldDefinition::new("EMAIL", FieldDataType::Email),
            FieldDefinition::new("PERSONAL_EMAIL", FieldDataType::Email),
            FieldDefinition::new("DEPARTMENT", FieldDataType::String),
            FieldDefinition::new("LOCATION", FieldDataType::String),
        ],
    )
    .unwrap()
}

fn field(name: &str, candidates: &[(&str, f32)]) -> AmbiguousField {
    AmbiguousField {
        source: SourceField::new(name),
        candidates: candidates
            .iter()
            .map(|(target, score)| CandidateMatch::new(*target, *score, MatchMethod::Vector))
            .collect(),
    }
}

fn pool(keys: &[&str]) -> Arc<KeyPool> {
    Arc::new(KeyPool::new(
        keys.iter().map(|k| k.to_string()).collect(),
        KeyPoolConfig {
            daily_limit: 100,
            min_interval: Duration::ZERO,
            max_failures: 3,
        },
    ))
}

fn escalator(backend: Arc<dyn ReasoningBackend>, keys: &[&str]) -> ReasoningEscalator {
    ReasoningEscalator::new(
        backend,
        pool(keys),
        Arc::new(ReasoningCache::new()),
        EscalatorConfig {
            timeout: Duration::from_millis(200),
            ..EscalatorConfig::default()
        },
    )
}

#[tokio::test]
async fn reasoned_decisions_are_clamped_and_cached() {
    let backend = ScriptedBackend::new(vec![Ok(r#"```json
[{"source":"contact","target":"personal_email","confidence":0.97,"reasoning":"gmail addresses"},
 {"source":"unit","target":"DEPARTMENT","confidence":0.3}]
```"#
        .to_string())]);
    let escalator = escalator(backend.clone(), &["k1"]);
    let fields = vec![
        field("contact", &[("EMAIL", 0.6), ("PERSONAL_EMAIL", 0.55)]),
        field("unit", &[("DEPARTMENT", 0.5), ("LOCATION", 0.45)]),
    ];

    let report = escalator.resolve(&schema(), fields.clone()).await;
    assert_eq!(report.stats.requests, 1);
    assert_eq!(
        report.resolutions[0].resolution,
        Resolution::Reasoned(CandidateMatch::new("PERSONAL_EMAIL", 0.90, MatchMethod::Reasoning))
    );
    assert_eq!(report.resolutions[0].reasoning.as_deref(), Some("gmail addresses"));
    assert_eq!(
        report.resolutions[1].resolution,
        Resolution::Reasoned(CandidateMatch::new("DEPARTMENT", 0.50, MatchMethod::Reasoning))
    );

    // Same fields again: answered from cache, no new call.
    let again = escalator.resolve(&schema(), fields).await;
    assert_eq!(again.stats.cache_hits, 2);
    assert_eq!(again.stats.requests, 0);
    assert_eq!(backend.calls().len(), 1);
    assert_eq!(again.resolutions, report.resolutions);
}

#[tokio::test]
async fn always_failing_backend_falls_back_to_vectors() {
    let backend = ScriptedBackend::new(vec![]);
    let escalator = escalator(backend, &["k1", "k2"]);
    let report = escalator
        .resolve(&schema(), vec![field("contact", &[("EMAIL", 0.6), ("PERSONAL_EMAIL", 0.55)])])
        .await;

    assert_eq!(report.stats.requests, 2);
    assert_eq!(report.stats.fallbacks, 1);
    assert_eq!(
        report.resolutions[0].resolution,
        Resolution::Fallback(CandidateMatch::new("EMAIL", 0.6, MatchMethod::VectorFallback))
    );
}

#[tokio::test]
async fn rate_limit_rotates_and_retries_once() {
    let backend = ScriptedBackend::new(vec![
        Err(BackendError::RateLimited { retry_after_secs: Some(30) }),
        Ok(r#"[{"source":"contact","target":"EMAIL","confidence":0.8}]"#.to_string()),
    ]);
    let escalator = escalator(backend.clone(), &["k1", "k2"]);
    let report = escalator
        .resolve(&schema(), vec![field("contact", &[("EMAIL", 0.6)])])
        .await;

    assert_eq!(backend.calls(), vec!["k1", "k2"]);
    assert!(matches!(report.resolutions[0].resolution, Resolution::Reasoned(_)));
    let statuses = escalator.pool().statuses().await;
    assert_eq!(statuses[0].requests_today, 100);
}

#[tokio::test]
async fn target_outside_candidates_falls_back() {
    let backend = ScriptedBackend::new(vec![Ok(
        r#"[{"source":"contact","target":"LOCATION","confidence":0.8}]"#.to_string(),
    )]);
    let escalator = escalator(backend, &["k1"]);
    let report = escalator
        .resolve(&schema(), vec![field("contact", &[("EMAIL", 0.6)])])
        .await;
    assert!(matches!(
        report.resolutions[0].resolution,
        Resolution::Fallback(ref c) if c.target_field == "EMAIL"
    ));
}

#[tokio::test]
async fn malformed_element_only_affects_its_field() {
    let backend = ScriptedBackend::new(vec![Ok(
        r#"Sure! [{"source":"contact","target":"EMAIL","confidence":0.7},{"source":42}]"#.to_string(),
    )]);
    let escalator = escalator(backend, &["k1"]);
    let report = escalator
        .resolve(
            &schema(),
            vec![
                field("contact", &[("EMAIL", 0.6)]),
                field("unit", &[("DEPARTMENT", 0.5)]),
            ],
        )
        .await;
    assert!(matches!(report.resolutions[0].resolution, Resolution::Reasoned(_)));
    assert!(matches!(report.resolutions[1].resolution, Resolution::Fallback(_)));
    assert_eq!(report.stats.fallbacks, 1);
}

#[tokio::test]
async fn null_target_is_a_decline() {
    let backend = ScriptedBackend::new(vec![Ok(
        r#"[{"source":"notes","target":null,"reasoning":"free text"}]"#.to_string(),
    )]);
    let escalator = escalator(backend, &["k1"]);
    let report = escalator
        .resolve(&schema(), vec![field("notes", &[("DEPARTMENT", 0.42)])])
        .await;
    assert_eq!(report.resolutions[0].resolution, Resolution::Declined);
    assert_eq!(report.stats.fallbacks, 0);
}

#[tokio::test]
async fn timeout_counts_as_failure_and_falls_back() {
    let escalator = escalator(Arc::new(HangingBackend), &["k1"]);
    let report = escalator
        .resolve(&schema(), vec![field("contact", &[("EMAIL", 0.6)])])
        .await;
    assert_eq!(report.stats.requests, 2);
    assert_eq!(report.stats.failures, 2);
    assert!(matches!(report.resolutions[0].resolution, Resolution::Fallback(_)));
}

#[tokio::test]
async fn no_credentials_means_fallback_without_calls() {
    let backend = ScriptedBackend::new(vec![]);
    let escalator = escalator(backend.clone(), &[]);
    let report = escalator
        .resolve(&schema(), vec![field("contact", &[("EMAIL", 0.6)])])
        .await;
    assert!(backend.calls().is_empty());
    assert!(matches!(report.resolutions[0].resolution, Resolution::Fallback(_)));
}

#[tokio::test]
async fn batches_respect_batch_size() {
    let answer = |name: &str| Ok(format!(r#"[{{"source":"{name}","target":"EMAIL","confidence":0.6}}]"#));
    let backend = ScriptedBackend::new(vec![answer("a"), answer("b"), answer("c")]);
    let escalator = ReasoningEscalator::new(
        backend.clone(),
        pool(&["k1"]),
        Arc::new(ReasoningCache::new()),
        EscalatorConfig {
            batch_size: 1,
            ..EscalatorConfig::default()
        },
    );
    let fields = ["a", "b", "c"].iter().map(|n| field(n, &[("EMAIL", 0.5)])).collect();
    let report = escalator.resolve(&schema(), fields).await;
    assert_eq!(backend.calls().len(), 3);
    assert_eq!(report.resolutions.len(), 3);
    assert!(report
        .resolutions
        .iter()
        .all(|r| matches!(r.resolution, Resolution::Reasoned(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_share_quota_and_pacing() {
    let interval = Duration::from_millis(200);
    let pool = Arc::new(KeyPool::new(
        vec!["k1".into(), "k2".into()],
        KeyPoolConfig {
            daily_limit: 3,
            min_interval: interval,
            max_failures: 3,
        },
    ));
    let started = Instant::now();
    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move {
                pool.acquire_credential()
                    .await
                    .map(|lease| (lease.index, started.elapsed()))
            })
        })
        .collect();

    let mut granted = Vec::new();
    let mut refused = 0;
    for task in tasks {
        match task.await.unwrap() {
            Some(grant) => granted.push(grant),
            None => refused += 1,
        }
    }
    assert_eq!(granted.len(), 6);
    assert_eq!(refused, 2);

    for index in 0..2 {
        let mut ready: Vec<Duration> = granted
            .iter()
            .filter(|(i, _)| *i == index)
            .map(|(_, at)| *at)
            .collect();
        assert_eq!(ready.len(), 3, "credential {index} slots: {ready:?}");
        ready.sort();
        // The n-th call on a credential can start no earlier than n intervals in.
        for (n, at) in ready.iter().enumerate() {
            let earliest = interval * n as u32;
            assert!(*at + Duration::from_millis(5) >= earliest, "credential {index}: {ready:?}");
        }
    }
    let statuses = pool.statuses().await;
    assert!(statuses.iter().all(|s| s.requests_today == 3));
    assert!(!pool.has_capacity().await);
}
