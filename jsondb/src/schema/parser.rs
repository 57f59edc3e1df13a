use crate::error::Result;
use super::types::{Schema, StoreDefinition};
use std::path::Path;

/// Parse a store definition file (config keys plus a `fields` map)
pub fn parse_definition(path: &Path) -> Result<StoreDefinition> {
    let content = std::fs::read_to_string(path)?;
    parse_definition_str(&content)
}

/// Parse a store definition YAML string
pub fn parse_definition_str(content: &str) -> Result<StoreDefinition> {
    let mut definition: StoreDefinition = serde_yaml::from_str(content)?;
    definition.fields.prepare()?;
    Ok(definition)
}

/// Parse a bare field map (`name: { type: string, required: true }`) into a Schema
pub fn parse_schema_str(content: &str) -> Result<Schema> {
    let mut schema: Schema = serde_yaml::from_str(content)?;
    schema.prepare()?;
    Ok(schema)
}
