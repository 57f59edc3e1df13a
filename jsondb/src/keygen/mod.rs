// Key resolution: caller-supplied `_id` or a generated key

use crate::document::{type_name, Tree, KEY_FIELD};
use crate::error::{JsonDbError, Result, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Generated keys are retried this many times on collision before giving up.
const MAX_ATTEMPTS: usize = 8;

/// How a key is produced when the document does not carry one
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStrategy {
    #[default]
    Uuid,
    Ulid,
    Nanoid,
    AutoIncrement,
}

impl KeyStrategy {
    fn generate(&self, tree: &Tree) -> Result<String> {
        Ok(match self {
            KeyStrategy::Uuid => uuid::Uuid::new_v4().to_string(),
            KeyStrategy::Ulid => ulid::Ulid::new().to_string().to_lowercase(),
            KeyStrategy::Nanoid => nanoid::nanoid!(),
            KeyStrategy::AutoIncrement => next_auto_increment(tree)?.to_string(),
        })
    }
}

/// Generate a key that is not yet used in `tree`.
pub fn generate_key(strategy: KeyStrategy, tree: &Tree) -> Result<String> {
    for _ in 0..MAX_ATTEMPTS {
        let key = strategy.generate(tree)?;
        if !tree.contains_key(&key) {
            return Ok(key);
        }
        log::debug!("generated key '{key}' already in use, retrying");
    }
    Err(JsonDbError::KeyGeneration(format!(
        "no unused key after {MAX_ATTEMPTS} attempts with {strategy:?}"
    )))
}

/// Interpret a caller-supplied `_id` value as a key.
///
/// Strings are used as-is, non-negative integers are converted to their decimal
/// form. Anything else (and the empty string) is rejected.
pub fn resolve_supplied_key(value: &Value) -> std::result::Result<String, ValidationError> {
    match value {
        Value::String(s) if !s.is_empty() => Ok(s.clone()),
        Value::String(_) => Err(ValidationError::CustomValidationFailed {
            field: KEY_FIELD.to_string(),
            reason: "key must not be empty".to_string(),
        }),
        Value::Number(n) if n.is_u64() => Ok(n.to_string()),
        other => Err(ValidationError::TypeMismatch {
            field: KEY_FIELD.to_string(),
            expected: "string".to_string(),
            found: type_name(other).to_string(),
        }),
    }
}

/// One greater than the largest key that parses as an integer, or 1 if there is none.
/// Fails when the largest key is already `i64::MAX`.
pub fn next_auto_increment(tree: &Tree) -> Result<i64> {
    match tree.keys().filter_map(|key| key.trim().parse::<i64>().ok()).max() {
        None => Ok(1),
        Some(max) => max.checked_add(1).ok_or_else(|| {
            JsonDbError::KeyGeneration(format!("auto-increment key {max} cannot be incremented"))
        }),
    }
}
