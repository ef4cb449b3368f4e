#![deny(unsafe_code)]

pub mod error;
pub mod mapping;
pub mod registry;
pub mod schema;

pub use error::{ModelError, Result};
pub use mapping::{CandidateMatch, MAX_ALTERNATIVES, Mapping, MatchMethod, SourceField};
pub use registry::{SchemaRegistry, load_schema_file};
pub use schema::{EntitySchema, FieldDataType, FieldDefinition};
