pub mod display;
pub mod document;
pub mod error;
pub mod index;
pub mod keygen;
pub mod persistence;
pub mod query;
pub mod schema;
pub mod store;
pub mod validation;

pub use document::{Document, Tree, KEY_FIELD};
pub use error::{JsonDbError, Result, ValidationError};
pub use keygen::KeyStrategy;
pub use query::{Condition, Query};
pub use schema::{FieldSpec, FieldType, Schema};
pub use store::{Store, StoreConfig};
