//! Target schema definitions.
//!
//! An [`EntitySchema`] is the fixed, named set of fields a dataset is mapped
//! into. Schemas are small (tens of fields) and change rarely, so they are
//! plain owned values that can be cloned freely.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{ModelError, Result};

/// Declared data type of a target field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldDataType {
    String,
    Number,
    Date,
    Email,
    Datetime,
    Boolean,
}

impl FieldDataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldDataType::String => "string",
            FieldDataType::Number => "number",
            FieldDataType::Date => "date",
            FieldDataType::Email => "email",
            FieldDataType::Datetime => "datetime",
            FieldDataType::Boolean => "boolean",
        }
    }
}

impl fmt::Display for FieldDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FieldDataType {
    type Err = ModelError;

    /// Parse a type name as produced by column-type detection.
    /// Accepts a few common synonyms (`int`, `text`, `bool`, ...).
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "string" | "str" | "text" | "varchar" => Ok(FieldDataType::String),
            "number" | "numeric" | "int" | "integer" | "float" | "decimal" => {
                Ok(FieldDataType::Number)
            }
            "date" => Ok(FieldDataType::Date),
            "email" => Ok(FieldDataType::Email),
            "datetime" | "timestamp" => Ok(FieldDataType::Datetime),
            "boolean" | "bool" => Ok(FieldDataType::Boolean),
            _ => Err(ModelError::UnknownDataType(s.to_string())),
        }
    }
}

/// A single field of a target schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Canonical field name (e.g. `FIRST_NAME`).
    pub name: String,
    /// Human-readable label shown to users.
    #[serde(default)]
    pub display_name: String,
    pub data_type: FieldDataType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    /// Optional validation regex for values of this field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl FieldDefinition {
    /// Creates a field with only a name and type; other attributes default.
    pub fn new(name: impl Into<String>, data_type: FieldDataType) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            data_type,
            required: false,
            description: String::new(),
            min_length: None,
            max_length: None,
            pattern: None,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Label used for display, falling back to the canonical name.
    pub fn label(&self) -> &str {
        if self.display_name.trim().is_empty() {
            &self.name
        } else {
            &self.display_name
        }
    }
}

/// Ordered set of target fields for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEntitySchema")]
pub struct EntitySchema {
    entity: String,
    fields: Vec<FieldDefinition>,
}

#[derive(Deserialize)]
struct RawEntitySchema {
    entity: String,
    fields: Vec<FieldDefinition>,
}

impl TryFrom<RawEntitySchema> for EntitySchema {
    type Error = ModelError;

    fn try_from(raw: RawEntitySchema) -> Result<Self> {
        EntitySchema::new(raw.entity, raw.fields)
    }
}

impl EntitySchema {
    /// Builds a schema, rejecting empty entity names and duplicate field names.
    ///
    /// Field names are compared case-insensitively.
    pub fn new(entity: impl Into<String>, fields: Vec<FieldDefinition>) -> Result<Self> {
        let entity = entity.into().trim().to_string();
        if entity.is_empty() {
            return Err(ModelError::InvalidSchema {
                message: "entity name is empty".to_string(),
            });
        }
        let mut seen = BTreeSet::new();
        for field in &fields {
            if field.name.trim().is_empty() {
                return Err(ModelError::InvalidSchema {
                    message: format!("entity {entity} has a field with an empty name"),
                });
            }
            if !seen.insert(field.name.to_ascii_uppercase()) {
                return Err(ModelError::DuplicateField {
                    entity,
                    field: field.name.clone(),
                });
            }
        }
        Ok(Self { entity, fields })
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Looks up a field by name (case-insensitive).
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields
            .iter()
            .find(|field| field.name.eq_ignore_ascii_case(name))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|field| field.name.as_str())
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter(|field| field.required)
    }

    /// Stable SHA-256 fingerprint of the schema contents.
    ///
    /// Any change to the entity name or a field definition changes the
    /// fingerprint, which lets derived caches detect staleness.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.entity.as_bytes());
        for field in &self.fields {
            hasher.update([0u8]);
            hasher.update(field.name.as_bytes());
            hasher.update([0u8]);
            hasher.update(field.display_name.as_bytes());
            hasher.update([0u8]);
            hasher.update(field.data_type.as_str().as_bytes());
            hasher.update([0u8]);
            hasher.update(field.description.as_bytes());
            hasher.update([u8::from(field.required)]);
        }
        hex::encode(hasher.finalize())
    }
}
