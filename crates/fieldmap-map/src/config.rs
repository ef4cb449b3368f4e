//! Mapper configuration.
//!
//! Loaded from an optional TOML file; every field has a default. Credentials
//! are never read from the file, only from the environment:
//!
//! - `FIELDMAP_REASONING_KEYS`: comma-separated reasoning credentials
//! - `FIELDMAP_EMBEDDING_URL`: base URL of an OpenAI-compatible embedding API
//! - `FIELDMAP_EMBEDDING_KEY`: bearer token for that API

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use fieldmap_lexical::AliasDictionary;
use fieldmap_model::SchemaRegistry;
use fieldmap_reasoning::{
    DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL, EscalatorConfig, GeminiClient, GeminiConfig,
    KeyPool, KeyPoolConfig, ReasoningCache, ReasoningEscalator,
};
use fieldmap_semantic::{
    DEFAULT_HASHING_DIMENSIONS, EmbeddingBackend, EmbeddingCache, HashingEmbedder, HttpEmbedder,
    HttpEmbedderConfig, InvalidationPolicy, SemanticMatcher,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::engine::MappingEngine;
use crate::error::{ConfigError, Result};
use crate::thresholds::MatchThresholds;

pub const ENV_REASONING_KEYS: &str = "FIELDMAP_REASONING_KEYS";
pub const ENV_EMBEDDING_URL: &str = "FIELDMAP_EMBEDDING_URL";
pub const ENV_EMBEDDING_KEY: &str = "FIELDMAP_EMBEDDING_KEY";

pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MapperConfig {
    /// Extra aliases, merged over the built-in dictionary.
    pub aliases_file: Option<PathBuf>,
    /// Directory of `{entity}.json` schemas, merged over the built-ins.
    pub schema_dir: Option<PathBuf>,
    pub thresholds: MatchThresholds,
    pub semantic: SemanticSettings,
    pub reasoning: ReasoningSettings,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackendKind {
    /// Local hashed n-gram vectors; no network.
    #[default]
    Hashing,
    /// OpenAI-compatible `/embeddings` endpoint.
    Http,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SemanticSettings {
    pub enabled: bool,
    pub backend: EmbeddingBackendKind,
    pub model: String,
    pub url: Option<String>,
    #[serde(skip)]
    pub api_key: Option<String>,
    pub dimensions: usize,
    /// Persist field vectors here; memory only when unset.
    pub cache_dir: Option<PathBuf>,
    pub invalidation: InvalidationPolicy,
    pub timeout_secs: u64,
}

impl Default for SemanticSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: EmbeddingBackendKind::Hashing,
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            url: None,
            api_key: None,
            dimensions: DEFAULT_HASHING_DIMENSIONS,
            cache_dir: None,
            invalidation: InvalidationPolicy::default(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReasoningSettings {
    pub enabled: bool,
    pub model: String,
    pub base_url: String,
    #[serde(skip)]
    pub keys: Vec<String>,
    pub daily_limit: u32,
    pub min_interval_ms: u64,
    pub timeout_secs: u64,
    pub batch_size: usize,
    pub max_candidates: usize,
    pub max_samples: usize,
    pub max_failures: u32,
}

impl Default for ReasoningSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            keys: Vec::new(),
            daily_limit: 1500,
            min_interval_ms: 4000,
            timeout_secs: 10,
            batch_size: 10,
            max_candidates: 5,
            max_samples: 5,
            max_failures: 3,
        }
    }
}

impl ReasoningSettings {
    pub fn key_pool_config(&self) -> KeyPoolConfig {
        KeyPoolConfig {
            daily_limit: self.daily_limit,
            min_interval: Duration::from_millis(self.min_interval_ms),
            max_failures: self.max_failures,
        }
    }

    pub fn escalator_config(&self) -> EscalatorConfig {
        EscalatorConfig {
            batch_size: self.batch_size,
            max_candidates: self.max_candidates,
            max_samples: self.max_samples,
            timeout: Duration::from_secs(self.timeout_secs),
            ..EscalatorConfig::default()
        }
    }
}

impl MapperConfig {
    /// Parses TOML text. `origin` only labels errors.
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source: Box::new(source),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text, path)?;
        debug!(path = %path.display(), "loaded mapper config");
        Ok(config)
    }

    /// Applies overrides from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Applies overrides from `lookup`, which maps a variable name to its value.
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let lookup = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(keys) = lookup(ENV_REASONING_KEYS) {
            self.reasoning.keys = keys
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(url) = lookup(ENV_EMBEDDING_URL) {
            self.semantic.url = Some(url);
            self.semantic.backend = EmbeddingBackendKind::Http;
        }
        if let Some(key) = lookup(ENV_EMBEDDING_KEY) {
            self.semantic.api_key = Some(key);
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.thresholds.validate().map_err(ConfigError::Invalid)?;
        if self.semantic.enabled {
            if self.semantic.backend == EmbeddingBackendKind::Hashing && self.semantic.dimensions == 0 {
                return Err(ConfigError::Invalid("semantic.dimensions must be positive".into()));
            }
            if self.semantic.backend == EmbeddingBackendKind::Http && self.semantic.url.is_none() {
                return Err(ConfigError::Invalid(format!(
                    "semantic.backend = \"http\" requires semantic.url or {ENV_EMBEDDING_URL}"
                )));
            }
        }
        if self.reasoning.batch_size == 0 {
            return Err(ConfigError::Invalid("reasoning.batch_size must be positive".into()));
        }
        if self.reasoning.max_candidates == 0 {
            return Err(ConfigError::Invalid("reasoning.max_candidates must be positive".into()));
        }
        Ok(())
    }

    /// Built-in schemas plus `schema_dir`, if set.
    pub fn build_registry(&self) -> Result<SchemaRegistry> {
        let mut registry = SchemaRegistry::with_builtin()?;
        if let Some(dir) = &self.schema_dir {
            let loaded = registry.load_dir(dir)?;
            info!(dir = %dir.display(), loaded, "loaded schema directory");
        }
        Ok(registry)
    }

    /// Built-in aliases plus `aliases_file`, if set.
    pub fn build_aliases(&self) -> Result<AliasDictionary> {
        let mut aliases = AliasDictionary::builtin();
        if let Some(path) = &self.aliases_file {
            aliases.merge(AliasDictionary::from_file(path)?);
        }
        Ok(aliases)
    }

    /// Assembles an engine from this configuration.
    ///
    /// The HTTP embedding client is blocking: call this outside an async
    /// runtime.
    pub fn build_engine(&self) -> Result<MappingEngine> {
        self.validate()?;
        let mut engine = MappingEngine::new(self.build_aliases()?).with_thresholds(self.thresholds);

        if self.semantic.enabled {
            engine = engine.with_semantic(self.build_semantic()?);
        }

        if self.reasoning.enabled {
            if self.reasoning.keys.is_empty() {
                warn!("reasoning is enabled but {ENV_REASONING_KEYS} is empty; tier 3 disabled");
            } else {
                let client = GeminiClient::new(GeminiConfig {
                    base_url: self.reasoning.base_url.clone(),
                    model: self.reasoning.model.clone(),
                    timeout: Duration::from_secs(self.reasoning.timeout_secs),
                })?;
                let pool = KeyPool::new(self.reasoning.keys.clone(), self.reasoning.key_pool_config());
                engine = engine.with_reasoning(ReasoningEscalator::new(
                    Arc::new(client),
                    Arc::new(pool),
                    Arc::new(ReasoningCache::new()),
                    self.reasoning.escalator_config(),
                ));
            }
        }
        Ok(engine)
    }

    fn build_semantic(&self) -> Result<SemanticMatcher> {
        let settings = &self.semantic;
        let backend: Arc<dyn EmbeddingBackend> = match settings.backend {
            EmbeddingBackendKind::Hashing => Arc::new(HashingEmbedder::new(settings.dimensions)),
            EmbeddingBackendKind::Http => {
                let base_url = settings.url.clone().ok_or_else(|| {
                    ConfigError::Invalid(format!("semantic.url or {ENV_EMBEDDING_URL} is required"))
                })?;
                Arc::new(HttpEmbedder::new(HttpEmbedderConfig {
                    base_url,
                    model: settings.model.clone(),
                    api_key: settings.api_key.clone(),
                    timeout: Duration::from_secs(settings.timeout_secs),
                })?)
            }
        };
        let cache = match &settings.cache_dir {
            Some(dir) => EmbeddingCache::with_dir(dir),
            None => EmbeddingCache::in_memory(),
        }
        .with_policy(settings.invalidation);
        Ok(SemanticMatcher::new(backend, Arc::new(cache)))
    }
}
