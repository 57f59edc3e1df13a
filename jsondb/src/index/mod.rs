//! Secondary equality indexes.
//!
//! Each index maps the canonical form of a field value to the keys of the
//! documents currently holding that value. Invariant: for every document with
//! key `k` and indexed field `f` present, `k` sits in exactly one bucket of the
//! index for `f`, the one for its current value. The store calls into this
//! module on every insert, update and remove so the invariant holds after each
//! mutating call.

use crate::document::{Document, Tree};
use crate::query::Condition;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;

/// Canonical bucket key for a value.
///
/// Object fields are sorted so that two objects equal as `Value`s share a
/// bucket regardless of field order. Numbers keep their JSON spelling, which
/// agrees with `Value` equality (`1` and `1.0` differ there too).
pub fn index_value(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut fields: Vec<(&String, &Value)> = map.iter().collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (name, item)) in fields.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(name.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Index over a single field
#[derive(Debug, Clone, Default)]
pub struct FieldIndex {
    buckets: HashMap<String, Vec<String>>,
}

impl FieldIndex {
    /// Build an index over `field` from the current tree contents, in tree order.
    pub fn build(field: &str, tree: &Tree) -> Self {
        let mut index = FieldIndex::default();
        for (key, doc) in tree {
            if let Some(value) = doc.get(field) {
                index.add(key, value);
            }
        }
        index
    }

    fn add(&mut self, key: &str, value: &Value) {
        let bucket = self.buckets.entry(index_value(value)).or_default();
        debug_assert!(
            !bucket.iter().any(|k| k == key),
            "key '{key}' already indexed under {value}"
        );
        bucket.push(key.to_string());
    }

    fn remove(&mut self, key: &str, value: &Value) {
        let bucket_key = index_value(value);
        if let Some(bucket) = self.buckets.get_mut(&bucket_key) {
            bucket.retain(|k| k != key);
            if bucket.is_empty() {
                self.buckets.remove(&bucket_key);
            }
        }
    }

    /// Keys holding exactly `value`.
    pub fn get(&self, value: &Value) -> &[String] {
        self.buckets
            .get(&index_value(value))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of distinct values indexed.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// All secondary indexes of one store, keyed by field name in creation order.
#[derive(Debug, Clone, Default)]
pub struct IndexManager {
    indexes: IndexMap<String, FieldIndex>,
}

impl IndexManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an index for `field`, backfilled from `tree`.
    /// Returns false (and changes nothing) if the index already exists.
    pub fn create(&mut self, field: &str, tree: &Tree) -> bool {
        if self.indexes.contains_key(field) {
            return false;
        }
        let index = FieldIndex::build(field, tree);
        log::debug!(
            "built index on '{field}': {} distinct value(s) over {} document(s)",
            index.len(),
            tree.len()
        );
        self.indexes.insert(field.to_string(), index);
        true
    }

    /// Drop the index for `field`. Returns whether one existed.
    pub fn drop_index(&mut self, field: &str) -> bool {
        self.indexes.shift_remove(field).is_some()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.indexes.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&FieldIndex> {
        self.indexes.get(field)
    }

    /// Indexed field names, in creation order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.indexes.keys().map(String::as_str)
    }

    /// Rebuild every existing index from scratch against `tree`.
    pub fn rebuild(&mut self, tree: &Tree) {
        for (field, index) in self.indexes.iter_mut() {
            *index = FieldIndex::build(field, tree);
        }
    }

    /// A new document was added under `key`.
    pub fn index_insert(&mut self, key: &str, doc: &Document) {
        for (field, index) in self.indexes.iter_mut() {
            if let Some(value) = doc.get(field) {
                index.add(key, value);
            }
        }
    }

    /// The document under `key` changed from `old` to `new`. Moves the key
    /// between buckets for every indexed field whose value changed, appeared
    /// or disappeared.
    pub fn reindex_on_update(&mut self, key: &str, old: &Document, new: &Document) {
        for (field, index) in self.indexes.iter_mut() {
            match (old.get(field), new.get(field)) {
                (Some(before), Some(after)) if before == after => {}
                (before, after) => {
                    if let Some(before) = before {
                        index.remove(key, before);
                    }
                    if let Some(after) = after {
                        index.add(key, after);
                    }
                }
            }
        }
    }

    /// The document under `key` was removed.
    pub fn reindex_on_remove(&mut self, key: &str, doc: &Document) {
        for (field, index) in self.indexes.iter_mut() {
            if let Some(value) = doc.get(field) {
                index.remove(key, value);
            }
        }
    }

    /// Keys satisfying `condition` on `field`, or `None` if `field` has no index.
    /// A set condition yields the union of its buckets without duplicates.
    pub fn lookup(&self, field: &str, condition: &Condition) -> Option<Vec<String>> {
        let index = self.indexes.get(field)?;
        let keys = match condition {
            Condition::Eq(value) => index.get(value).to_vec(),
            Condition::In(values) => {
                let mut keys: Vec<String> = Vec::new();
                for value in values {
                    for key in index.get(value) {
                        if !keys.contains(key) {
                            keys.push(key.clone());
                        }
                    }
                }
                keys
            }
        };
        Some(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::from_value;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        from_value(value).unwrap()
    }

    fn sample_tree() -> Tree {
        let mut tree = Tree::new();
        tree.insert("1".into(), doc(json!({"_id": "1", "category": "A"})));
        tree.insert("2".into(), doc(json!({"_id": "2", "category": "B"})));
        tree.insert("3".into(), doc(json!({"_id": "3", "category": "A"})));
        tree.insert("4".into(), doc(json!({"_id": "4"})));
        tree
    }

    #[test]
    fn test_create_backfills_in_tree_order() {
        let tree = sample_tree();
        let mut indexes = IndexManager::new();
        assert!(indexes.create("category", &tree));

        let index = indexes.get("category").unwrap();
        assert_eq!(index.get(&json!("A")), &["1".to_string(), "3".to_string()]);
        assert_eq!(index.get(&json!("B")), &["2".to_string()]);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_create_is_idempotent() {
        let tree = sample_tree();
        let mut indexes = IndexManager::new();
        indexes.create("category", &tree);
        let once = indexes.lookup("category", &Condition::Eq(json!("A")));
        assert!(!indexes.create("category", &tree));
        let twice = indexes.lookup("category", &Condition::Eq(json!("A")));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_lookup_unindexed_field_is_none() {
        let indexes = IndexManager::new();
        assert!(indexes.lookup("category", &Condition::Eq(json!("A"))).is_none());
    }

    #[test]
    fn test_insert_appends_to_existing_indexes() {
        let mut tree = sample_tree();
        let mut indexes = IndexManager::new();
        indexes.create("category", &tree);

        let new_doc = doc(json!({"_id": "5", "category": "A"}));
        tree.insert("5".into(), new_doc.clone());
        indexes.index_insert("5", &new_doc);

        assert_eq!(
            indexes.lookup("category", &Condition::Eq(json!("A"))),
            Some(vec!["1".to_string(), "3".to_string(), "5".to_string()])
        );
    }

    #[test]
    fn test_update_moves_key_between_buckets() {
        let tree = sample_tree();
        let mut indexes = IndexManager::new();
        indexes.create("category", &tree);

        let old = tree["1"].clone();
        let new = doc(json!({"_id": "1", "category": "C"}));
        indexes.reindex_on_update("1", &old, &new);

        assert_eq!(
            indexes.lookup("category", &Condition::Eq(json!("A"))),
            Some(vec!["3".to_string()])
        );
        assert_eq!(
            indexes.lookup("category", &Condition::Eq(json!("C"))),
            Some(vec!["1".to_string()])
        );
    }

    #[test]
    fn test_update_adding_and_dropping_field() {
        let tree = sample_tree();
        let mut indexes = IndexManager::new();
        indexes.create("category", &tree);

        indexes.reindex_on_update("4", &tree["4"], &doc(json!({"_id": "4", "category": "B"})));
        assert_eq!(
            indexes.lookup("category", &Condition::Eq(json!("B"))),
            Some(vec!["2".to_string(), "4".to_string()])
        );

        indexes.reindex_on_update("2", &tree["2"], &doc(json!({"_id": "2"})));
        assert_eq!(
            indexes.lookup("category", &Condition::Eq(json!("B"))),
            Some(vec!["4".to_string()])
        );
    }

    #[test]
    fn test_remove_purges_key_and_empty_buckets() {
        let tree = sample_tree();
        let mut indexes = IndexManager::new();
        indexes.create("category", &tree);

        indexes.reindex_on_remove("2", &tree["2"]);
        let index = indexes.get("category").unwrap();
        assert!(index.get(&json!("B")).is_empty());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_set_lookup_unions_without_duplicates() {
        let tree = sample_tree();
        let mut indexes = IndexManager::new();
        indexes.create("category", &tree);

        let hits = indexes.lookup(
            "category",
            &Condition::In(vec![json!("B"), json!("A"), json!("B")]),
        );
        assert_eq!(hits, Some(vec!["2".to_string(), "1".to_string(), "3".to_string()]));
    }

    #[test]
    fn test_index_value_is_field_order_insensitive() {
        let a = json!({"x": 1, "y": [true, null]});
        let b: Value = serde_json::from_str(r#"{"y": [true, null], "x": 1}"#).unwrap();
        assert_eq!(a, b);
        assert_eq!(index_value(&a), index_value(&b));
        assert_ne!(index_value(&json!(1)), index_value(&json!(1.0)));
        assert_ne!(index_value(&json!("1")), index_value(&json!(1)));
    }

    #[test]
    fn test_drop_and_rebuild() {
        let mut tree = sample_tree();
        let mut indexes = IndexManager::new();
        indexes.create("category", &tree);
        indexes.create("_id", &tree);
        assert_eq!(indexes.fields().collect::<Vec<_>>(), vec!["category", "_id"]);

        tree.shift_remove("1");
        indexes.rebuild(&tree);
        assert_eq!(
            indexes.lookup("category", &Condition::Eq(json!("A"))),
            Some(vec!["3".to_string()])
        );

        assert!(indexes.drop_index("category"));
        assert!(!indexes.drop_index("category"));
        assert!(!indexes.contains("category"));
    }
}
