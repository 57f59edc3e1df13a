// Documents and the store tree - the in-memory shape of the persisted file

use crate::error::{JsonDbError, Result};
use indexmap::IndexMap;
use serde_json::{Map, Value};

/// Name of the field every stored document carries its key in.
pub const KEY_FIELD: &str = "_id";

/// A single record: field name to value, in field insertion order.
pub type Document = Map<String, Value>;

/// The complete store contents, keyed by document key in insertion order.
pub type Tree = IndexMap<String, Document>;

/// Convert an arbitrary JSON value into a document. Only objects qualify.
pub fn from_value(value: Value) -> Result<Document> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(JsonDbError::InvalidDocument(format!(
            "expected an object, got {}",
            type_name(&other)
        ))),
    }
}

/// The key stored inside a document, if it is a string.
pub fn key_of(doc: &Document) -> Option<&str> {
    doc.get(KEY_FIELD).and_then(Value::as_str)
}

/// Shallow merge: every field in `partial` overwrites the same field in `target`.
/// Fields not mentioned in `partial` are left untouched.
pub fn merge_partial(target: &mut Document, partial: &Document) {
    for (field, value) in partial {
        target.insert(field.clone(), value.clone());
    }
}

/// Human-readable name of a value's runtime type.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
