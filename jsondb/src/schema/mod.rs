mod parser;
mod types;

pub use parser::{parse_definition, parse_definition_str, parse_schema_str};
pub use types::{FieldSpec, FieldType, Schema, StoreDefinition, Validator};
