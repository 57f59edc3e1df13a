//! Whole-tree load/save.
//!
//! The store file is a single JSON object mapping keys to documents. Every
//! save rewrites it completely, through a temporary file in the same directory
//! that is then renamed over the target.

use crate::document::Tree;
use crate::error::{JsonDbError, Result};
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Where the tree is read from and written to.
pub trait Backend: Send {
    /// Read the stored tree. `Ok(None)` means nothing has been stored yet.
    fn load(&self) -> Result<Option<Tree>>;

    /// Replace the stored tree with `tree`.
    fn save(&self, tree: &Tree) -> Result<()>;

    /// Human-readable location, for logs and errors.
    fn describe(&self) -> String;
}

/// Parse store file contents. Any JSON object is accepted as long as every
/// value in it is an object.
pub fn parse_tree(text: &str) -> Result<Tree> {
    let root: Value = serde_json::from_str(text)?;
    let entries = match root {
        Value::Object(entries) => entries,
        other => {
            return Err(JsonDbError::Format(format!(
                "expected a JSON object at the top level, got {}",
                crate::document::type_name(&other)
            )))
        }
    };

    let mut tree = Tree::with_capacity(entries.len());
    for (key, value) in entries {
        match value {
            Value::Object(doc) => {
                tree.insert(key, doc);
            }
            other => {
                return Err(JsonDbError::Format(format!(
                    "document '{key}' is not an object (got {})",
                    crate::document::type_name(&other)
                )))
            }
        }
    }
    Ok(tree)
}

/// Serialize a tree, pretty-printed with two-space indentation unless `pretty` is off.
pub fn serialize_tree(tree: &Tree, pretty: bool) -> Result<String> {
    let mut text = if pretty {
        serde_json::to_string_pretty(tree)?
    } else {
        serde_json::to_string(tree)?
    };
    text.push('\n');
    Ok(text)
}

/// A JSON file on disk
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
    pretty: bool,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileBackend {
            path: path.into(),
            pretty: true,
        }
    }

    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Backend for FileBackend {
    fn load(&self) -> Result<Option<Tree>> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let tree = parse_tree(&text).map_err(|e| match e {
            JsonDbError::Format(msg) => {
                JsonDbError::Format(format!("{}: {msg}", self.path.display()))
            }
            other => other,
        })?;
        log::debug!(
            "loaded {} document(s) from {}",
            tree.len(),
            self.path.display()
        );
        Ok(Some(tree))
    }

    fn save(&self, tree: &Tree) -> Result<()> {
        let text = serialize_tree(tree, self.pretty)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(text.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)?;

        log::debug!(
            "saved {} document(s) to {}",
            tree.len(),
            self.path.display()
        );
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-process backend holding the serialized tree in memory.
///
/// Clones share the same contents, so a test can keep one handle to inspect
/// what the store wrote, and can make subsequent saves fail.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    contents: Arc<Mutex<Option<String>>>,
    fail_saves: Arc<AtomicBool>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing serialized contents.
    pub fn with_contents(text: &str) -> Self {
        let backend = Self::new();
        *backend.lock() = Some(text.to_string());
        backend
    }

    /// Replace the contents, as another writer would.
    pub fn set_contents(&self, text: &str) {
        *self.lock() = Some(text.to_string());
    }

    /// What the last successful save wrote.
    pub fn contents(&self) -> Option<String> {
        self.lock().clone()
    }

    /// Make every following save fail with an I/O error (or succeed again).
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.contents.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Backend for MemoryBackend {
    fn load(&self) -> Result<Option<Tree>> {
        match self.lock().as_deref() {
            Some(text) => Ok(Some(parse_tree(text)?)),
            None => Ok(None),
        }
    }

    fn save(&self, tree: &Tree) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(JsonDbError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "memory backend configured to fail saves",
            )));
        }
        let text = serialize_tree(tree, true)?;
        *self.lock() = Some(text);
        Ok(())
    }

    fn describe(&self) -> String {
        "<memory>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::from_value;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample_tree() -> Tree {
        let mut tree = Tree::new();
        tree.insert(
            "b".into(),
            from_value(json!({"_id": "b", "n": 1, "nested": {"x": [1, 2]}})).unwrap(),
        );
        tree.insert("a".into(), from_value(json!({"_id": "a", "flag": true})).unwrap());
        tree
    }

    #[test]
    fn test_missing_file_loads_as_none() {
        let tmp = TempDir::new().unwrap();
        let backend = FileBackend::new(tmp.path().join("db.json"));
        assert!(backend.load().unwrap().is_none());
    }

    #[test]
    fn test_save_then_load_round_trip_keeps_order() {
        let tmp = TempDir::new().unwrap();
        let backend = FileBackend::new(tmp.path().join("nested/dir/db.json"));
        let tree = sample_tree();

        backend.save(&tree).unwrap();
        let loaded = backend.load().unwrap().unwrap();

        assert_eq!(loaded, tree);
        assert_eq!(loaded.keys().collect::<Vec<_>>(), vec!["b", "a"]);
    }

    #[test]
    fn test_file_is_pretty_printed_with_two_spaces() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("db.json");
        let mut tree = Tree::new();
        tree.insert("1".into(), from_value(json!({"_id": "1"})).unwrap());

        FileBackend::new(&path).save(&tree).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "{\n  \"1\": {\n    \"_id\": \"1\"\n  }\n}\n");
    }

    #[test]
    fn test_compact_output() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("db.json");
        FileBackend::new(&path).pretty(false).save(&Tree::new()).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}\n");
    }

    #[test]
    fn test_parse_rejects_non_object_root_and_documents() {
        assert!(matches!(parse_tree("[1, 2]"), Err(JsonDbError::Format(_))));
        let err = parse_tree(r#"{"k": 5}"#).unwrap_err();
        assert!(err.to_string().contains("'k'"));
        assert!(matches!(parse_tree("{not json"), Err(JsonDbError::Json(_))));
    }

    #[test]
    fn test_parse_accepts_any_formatting() {
        let tree = parse_tree(r#"{"x":{"_id":"x","v":[1,{"w":null}]}}"#).unwrap();
        assert_eq!(tree["x"]["v"], json!([1, {"w": null}]));
    }

    #[test]
    fn test_memory_backend_shares_contents_and_can_fail() {
        let backend = MemoryBackend::new();
        let observer = backend.clone();
        assert!(backend.load().unwrap().is_none());

        backend.save(&sample_tree()).unwrap();
        assert!(observer.contents().unwrap().contains("\"nested\""));

        observer.set_fail_saves(true);
        assert!(matches!(backend.save(&Tree::new()), Err(JsonDbError::Io(_))));
        assert_eq!(backend.load().unwrap().unwrap(), sample_tree());
    }
}
