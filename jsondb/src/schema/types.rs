use crate::document::KEY_FIELD;
use crate::error::{JsonDbError, Result};
use crate::store::StoreConfig;
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Custom predicate attached to a field. Returns `true` when the value is acceptable.
pub type Validator = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Top-level store definition parsed from a YAML file: configuration plus field schema.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreDefinition {
    #[serde(flatten)]
    pub config: StoreConfig,
    #[serde(default)]
    pub fields: Schema,
}

/// Field type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    Any,
}

impl FieldType {
    /// Whether a (non-null) value has this runtime type.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Integer => {
                value.is_i64()
                    || value.is_u64()
                    || value.as_f64().map(|f| f.fract() == 0.0).unwrap_or(false)
            }
            FieldType::Boolean => value.is_boolean(),
            FieldType::Array => value.is_array(),
            FieldType::Object => value.is_object(),
            FieldType::Any => !value.is_null(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
            FieldType::Array => "array",
            FieldType::Object => "object",
            FieldType::Any => "any",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Definition of a single field in the schema
#[derive(Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Lower bound: numeric value for numbers, length for strings and arrays.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Upper bound, same interpretation as `min`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip)]
    compiled_pattern: Option<Regex>,
    #[serde(skip)]
    validator: Option<Validator>,
}

impl FieldSpec {
    pub fn new(field_type: FieldType) -> Self {
        FieldSpec {
            field_type,
            required: false,
            enum_values: None,
            pattern: None,
            min: None,
            max: None,
            compiled_pattern: None,
            validator: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn one_of<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.enum_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Restrict string values to those matching `pattern`.
    pub fn pattern(mut self, pattern: &str) -> Result<Self> {
        self.pattern = Some(pattern.to_string());
        self.compile()?;
        Ok(self)
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    /// Attach a custom predicate, run after the type and declarative rule checks.
    pub fn validate_with<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(predicate));
        self
    }

    pub fn compiled_pattern(&self) -> Option<&Regex> {
        self.compiled_pattern.as_ref()
    }

    pub fn validator(&self) -> Option<&Validator> {
        self.validator.as_ref()
    }

    /// Compile the regex for `pattern`, if any. Called by the parser after deserializing.
    pub(crate) fn compile(&mut self) -> Result<()> {
        self.compiled_pattern = match &self.pattern {
            Some(p) => Some(Regex::new(p).map_err(|e| {
                JsonDbError::Schema(format!("invalid pattern '{p}': {e}"))
            })?),
            None => None,
        };
        Ok(())
    }
}

impl fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSpec")
            .field("field_type", &self.field_type)
            .field("required", &self.required)
            .field("enum_values", &self.enum_values)
            .field("pattern", &self.pattern)
            .field("min", &self.min)
            .field("max", &self.max)
            .field("validator", &self.validator.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Per-field constraints enforced on writes, in declaration order.
/// An empty schema performs no validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    fields: IndexMap<String, FieldSpec>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the specification for a field.
    pub fn field(mut self, name: &str, spec: FieldSpec) -> Self {
        self.fields.insert(name.to_string(), spec);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.fields.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check the schema itself: compiles patterns and rejects constraints
    /// that can never be satisfied by the key field.
    pub(crate) fn prepare(&mut self) -> Result<()> {
        for (name, spec) in self.fields.iter_mut() {
            spec.compile()?;
            if name == KEY_FIELD
                && !matches!(
                    spec.field_type,
                    FieldType::String | FieldType::Any
                )
            {
                return Err(JsonDbError::Schema(format!(
                    "field '{KEY_FIELD}' holds the document key and must be declared as string, got {}",
                    spec.field_type
                )));
            }
            if let (Some(min), Some(max)) = (spec.min, spec.max) {
                if min > max {
                    return Err(JsonDbError::Schema(format!(
                        "field '{name}' has min {min} greater than max {max}"
                    )));
                }
            }
        }
        Ok(())
    }
}
