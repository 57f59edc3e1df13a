use crate::document::{type_name, Document};
use crate::error::ValidationError;
use crate::query::{Condition, Query};
use crate::schema::{FieldSpec, Schema};
use serde_json::Value;

/// Result of validating a document: every issue found, in schema order
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// The first issue, if any, as an error.
    pub fn into_result(self) -> Result<(), ValidationError> {
        match self.errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Validation outcome for every stored document
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub total: usize,
    pub issues: Vec<(String, Vec<ValidationError>)>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Validate a complete document: required fields, then type and rules for each
/// declared field the document carries. Collects every issue.
pub fn validate_document(schema: &Schema, doc: &Document) -> ValidationResult {
    let mut result = ValidationResult::default();

    for (field_name, spec) in schema.iter() {
        let value = doc.get(field_name);

        if spec.required && matches!(value, None | Some(Value::Null)) {
            result.errors.push(ValidationError::MissingRequiredField {
                field: field_name.to_string(),
            });
            continue;
        }

        if let Some(val) = value {
            if !val.is_null() {
                if let Err(e) = validate_field_value(field_name, spec, val) {
                    result.errors.push(e);
                }
            }
        }
    }

    result
}

/// Insert-path check. Fails on the first issue.
pub fn check_document(schema: &Schema, doc: &Document) -> Result<(), ValidationError> {
    validate_document(schema, doc).into_result()
}

/// Update-path check: only the fields present in the partial are looked at.
/// Setting an optional field to null is allowed; clearing a required one is not.
pub fn check_partial(schema: &Schema, partial: &Document) -> Result<(), ValidationError> {
    for (field_name, spec) in schema.iter() {
        match partial.get(field_name) {
            None => {}
            Some(Value::Null) if spec.required => {
                return Err(ValidationError::MissingRequiredField {
                    field: field_name.to_string(),
                });
            }
            Some(Value::Null) => {}
            Some(val) => validate_field_value(field_name, spec, val)?,
        }
    }
    Ok(())
}

/// Query check: each expected value of a queried field must itself be valid for that field.
pub fn check_query(schema: &Schema, query: &Query) -> Result<(), ValidationError> {
    if schema.is_empty() {
        return Ok(());
    }
    for (field_name, condition) in query.conditions() {
        let Some(spec) = schema.get(field_name) else {
            continue;
        };
        let expected: &[Value] = match condition {
            Condition::Eq(value) => std::slice::from_ref(value),
            Condition::In(values) => values,
        };
        for value in expected.iter().filter(|v| !v.is_null()) {
            validate_field_value(field_name, spec, value)?;
        }
    }
    Ok(())
}

fn validate_field_value(
    field_name: &str,
    spec: &FieldSpec,
    value: &Value,
) -> Result<(), ValidationError> {
    if !spec.field_type.matches(value) {
        return Err(ValidationError::TypeMismatch {
            field: field_name.to_string(),
            expected: spec.field_type.to_string(),
            found: type_name(value).to_string(),
        });
    }

    let failed = |reason: String| ValidationError::CustomValidationFailed {
        field: field_name.to_string(),
        reason,
    };

    if let Some(allowed) = &spec.enum_values {
        if !allowed.contains(value) {
            return Err(failed(format!("value {value} is not in enum {}", Value::from(allowed.clone()))));
        }
    }

    if let Some(re) = spec.compiled_pattern() {
        match value.as_str() {
            Some(s) if re.is_match(s) => {}
            Some(s) => return Err(failed(format!("'{s}' does not match pattern '{}'", re.as_str()))),
            None => return Err(failed(format!("pattern applies to strings, got {}", type_name(value)))),
        }
    }

    if spec.min.is_some() || spec.max.is_some() {
        let (measure, what) = match value {
            Value::String(s) => (s.chars().count() as f64, "length"),
            Value::Array(items) => (items.len() as f64, "length"),
            Value::Number(n) => (n.as_f64().unwrap_or(f64::NAN), "value"),
            other => {
                return Err(failed(format!(
                    "bounds apply to numbers, strings and arrays, got {}",
                    type_name(other)
                )))
            }
        };
        if let Some(min) = spec.min {
            if measure < min {
                return Err(failed(format!("{what} {measure} is below minimum {min}")));
            }
        }
        if let Some(max) = spec.max {
            if measure > max {
                return Err(failed(format!("{what} {measure} is above maximum {max}")));
            }
        }
    }

    if let Some(predicate) = spec.validator() {
        if !predicate(value) {
            return Err(failed("rejected by custom validator".to_string()));
        }
    }

    Ok(())
}
