//! Schema registry for looking up target schemas by entity name.
//!
//! Schemas come from two places:
//! - built-in JSON definitions compiled into the crate (`candidate`, `employee`)
//! - a directory of `{entity}.json` files, which may add or override entities
//!
//! Entity names are matched case-insensitively.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{ModelError, Result};
use crate::schema::EntitySchema;

const BUILTIN_SCHEMAS: [(&str, &str); 2] = [
    ("candidate", include_str!("../schemas/candidate.json")),
    ("employee", include_str!("../schemas/employee.json")),
];

/// In-memory registry of entity schemas.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, EntitySchema>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry preloaded with the built-in schemas.
    pub fn with_builtin() -> Result<Self> {
        let mut registry = Self::new();
        for (name, json) in BUILTIN_SCHEMAS {
            let schema: EntitySchema =
                serde_json::from_str(json).map_err(|source| ModelError::Json {
                    path: format!("<builtin:{name}>").into(),
                    source,
                })?;
            registry.insert(schema);
        }
        Ok(registry)
    }

    /// Inserts a schema, replacing any existing schema for the same entity.
    pub fn insert(&mut self, schema: EntitySchema) -> Option<EntitySchema> {
        self.schemas.insert(entity_key(schema.entity()), schema)
    }

    /// Loads every `*.json` file in `dir` as an entity schema.
    ///
    /// Returns the number of schemas loaded. Files that fail to parse are an
    /// error; a schema file is configuration, not data.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize> {
        let entries = fs::read_dir(dir).map_err(|e| ModelError::io(dir, e))?;
        let mut loaded = 0usize;
        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ModelError::io(dir, e))?;
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();
        for path in paths {
            let schema = load_schema_file(&path)?;
            debug!(entity = schema.entity(), path = %path.display(), "loaded schema");
            if self.insert(schema).is_some() {
                warn!(path = %path.display(), "schema overrides an existing entity");
            }
            loaded += 1;
        }
        Ok(loaded)
    }

    /// Looks up a schema by entity name.
    pub fn get(&self, entity: &str) -> Result<&EntitySchema> {
        self.schemas
            .get(&entity_key(entity))
            .ok_or_else(|| ModelError::SchemaNotFound {
                entity: entity.to_string(),
            })
    }

    pub fn contains(&self, entity: &str) -> bool {
        self.schemas.contains_key(&entity_key(entity))
    }

    /// Entity names in sorted order.
    pub fn entities(&self) -> Vec<&str> {
        self.schemas.values().map(EntitySchema::entity).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntitySchema> {
        self.schemas.values()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

/// Reads a single schema file.
pub fn load_schema_file(path: &Path) -> Result<EntitySchema> {
    let contents = fs::read_to_string(path).map_err(|e| ModelError::io(path, e))?;
    serde_json::from_str(&contents).map_err(|source| ModelError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn entity_key(entity: &str) -> String {
    entity.trim().to_ascii_lowercase()
}
