//! Mapping schema: field descriptors, mapping JSON, field-set resolution

pub mod cache;
pub mod mapping;
pub mod resolver;
pub mod types;

pub use cache::SchemaCache;
pub use mapping::{build_mapping, emit_field, parse_field, parse_properties, EsMappingResponse};
pub use resolver::SchemaResolver;
pub use types::{CopyTo, FieldDescriptor, FieldSet, FieldType};
