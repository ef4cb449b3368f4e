//! Per-entity embedding cache, in memory and optionally on disk.
//!
//! One file per `(entity, model)` pair, named `{entity}__{model}.json`. Each
//! entry records the schema fingerprint it was built from so staleness can be
//! detected.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use fieldmap_model::{EntitySchema, FieldDataType};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{EmbeddingError, Result};

/// When a cached entry is considered stale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidationPolicy {
    /// Rebuild when the schema fingerprint differs from the cached one.
    #[default]
    SchemaFingerprint,
    /// Only rebuild on an explicit request.
    Manual,
}

/// Mean embedding for one target field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldVector {
    pub name: String,
    pub data_type: FieldDataType,
    pub vector: Vec<f32>,
}

/// All field vectors for one entity under one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityEmbeddings {
    pub entity: String,
    pub model: String,
    pub fingerprint: String,
    pub fields: Vec<FieldVector>,
}

impl EntityEmbeddings {
    pub fn dimensions(&self) -> Option<usize> {
        self.fields.first().map(|f| f.vector.len())
    }
}

type CacheKey = (String, String);

/// Read-mostly cache shared by every mapping request.
#[derive(Debug, Default)]
pub struct EmbeddingCache {
    dir: Option<PathBuf>,
    policy: InvalidationPolicy,
    memory: RwLock<HashMap<CacheKey, Arc<EntityEmbeddings>>>,
}

impl EmbeddingCache {
    /// Memory-only cache.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Cache persisted under `dir` (created on first write).
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            ..Self::default()
        }
    }

    pub fn with_policy(mut self, policy: InvalidationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> InvalidationPolicy {
        self.policy
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Returns cached embeddings usable for `schema`, loading from disk on a
    /// memory miss. Stale entries (per the policy) are treated as missing.
    pub fn get(&self, schema: &EntitySchema, model: &str) -> Option<Arc<EntityEmbeddings>> {
        let key = cache_key(schema.entity(), model);
        let cached = self.read_memory(&key).or_else(|| self.load_from_disk(&key));
        let cached = cached?;
        if self.is_fresh(&cached, schema) {
            Some(cached)
        } else {
            debug!(
                entity = schema.entity(),
                model,
                "cached embeddings are stale for the current schema"
            );
            None
        }
    }

    /// Whether an entry may be used for `schema` under the current policy.
    pub fn is_fresh(&self, cached: &EntityEmbeddings, schema: &EntitySchema) -> bool {
        match self.policy {
            InvalidationPolicy::Manual => true,
            InvalidationPolicy::SchemaFingerprint => cached.fingerprint == schema.fingerprint(),
        }
    }

    /// Stores an entry in memory and, when a directory is configured, on disk.
    pub fn store(&self, embeddings: EntityEmbeddings) -> Result<Arc<EntityEmbeddings>> {
        let key = cache_key(&embeddings.entity, &embeddings.model);
        if let Some(path) = self.file_path(&key) {
            write_entry(&path, &embeddings)?;
        }
        let entry = Arc::new(embeddings);
        let mut memory = self.memory.write().unwrap_or_else(|e| e.into_inner());
        memory.insert(key, Arc::clone(&entry));
        Ok(entry)
    }

    fn read_memory(&self, key: &CacheKey) -> Option<Arc<EntityEmbeddings>> {
        let memory = self.memory.read().unwrap_or_else(|e| e.into_inner());
        memory.get(key).cloned()
    }

    fn load_from_disk(&self, key: &CacheKey) -> Option<Arc<EntityEmbeddings>> {
        let path = self.file_path(key)?;
        if !path.exists() {
            return None;
        }
        match read_entry(&path) {
            Ok(entry) => {
                debug!(path = %path.display(), "loaded embeddings from disk");
                let entry = Arc::new(entry);
                let mut memory = self.memory.write().unwrap_or_else(|e| e.into_inner());
                memory.insert(key.clone(), Arc::clone(&entry));
                Some(entry)
            }
            Err(error) => {
                // An unreadable cache file is rebuilt and overwritten.
                warn!(%error, "ignoring unreadable embedding cache file");
                None
            }
        }
    }

    fn file_path(&self, key: &CacheKey) -> Option<PathBuf> {
        let dir = self.dir.as_ref()?;
        Some(dir.join(format!("{}__{}.json", sanitize(&key.0), sanitize(&key.1))))
    }
}

fn cache_key(entity: &str, model: &str) -> CacheKey {
    (entity.trim().to_ascii_lowercase(), model.to_string())
}

/// File-name-safe form of an entity or model id.
fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '.') {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

fn read_entry(path: &Path) -> Result<EntityEmbeddings> {
    let contents = fs::read_to_string(path).map_err(|e| EmbeddingError::io(path, e))?;
    serde_json::from_str(&contents).map_err(|source| EmbeddingError::CacheFormat {
        path: path.to_path_buf(),
        source,
    })
}

fn write_entry(path: &Path, entry: &EntityEmbeddings) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| EmbeddingError::io(parent, e))?;
    }
    let json = serde_json::to_string(entry).map_err(|source| EmbeddingError::CacheFormat {
        path: path.to_path_buf(),
        source,
    })?;
    // Write-then-rename so a concurrent reader never sees a partial file.
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(|e| EmbeddingError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| EmbeddingError::io(path, e))
}
