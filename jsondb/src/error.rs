use thiserror::Error;

#[derive(Error, Debug)]
pub enum JsonDbError {
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Key '{key}' is immutable (update attempted to set _id to '{attempted}')")]
    ImmutableKey { key: String, attempted: String },

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Malformed store file: {0}")]
    Format(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why a document, partial update or query was rejected by the schema.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Required field '{field}' is missing")]
    MissingRequiredField { field: String },

    #[error("Field '{field}' expected {expected}, got {found}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },

    #[error("Field '{field}' failed validation: {reason}")]
    CustomValidationFailed { field: String, reason: String },
}

impl ValidationError {
    /// The field the failure is about.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::MissingRequiredField { field }
            | ValidationError::TypeMismatch { field, .. }
            | ValidationError::CustomValidationFailed { field, .. } => field,
        }
    }
}

impl From<tempfile::PersistError> for JsonDbError {
    fn from(err: tempfile::PersistError) -> Self {
        JsonDbError::Io(err.error)
    }
}

pub type Result<T> = std::result::Result<T, JsonDbError>;
