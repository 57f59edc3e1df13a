use crate::keygen::KeyStrategy;
use serde::{Deserialize, Serialize};

/// Store-wide settings, fixed at construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Key source for inserts whose document has no `_id`.
    pub key_strategy: KeyStrategy,
    /// Fields indexed as soon as the store is loaded.
    pub indexes: Vec<String>,
    /// Pretty-print the store file with two-space indentation.
    pub pretty: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            key_strategy: KeyStrategy::default(),
            indexes: Vec::new(),
            pretty: true,
        }
    }
}

impl StoreConfig {
    pub fn with_key_strategy(mut self, strategy: KeyStrategy) -> Self {
        self.key_strategy = strategy;
        self
    }

    pub fn with_index(mut self, field: &str) -> Self {
        if !self.indexes.iter().any(|f| f == field) {
            self.indexes.push(field.to_string());
        }
        self
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}
