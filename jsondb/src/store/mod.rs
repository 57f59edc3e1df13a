use crate::display;
use crate::document::{self, Document, Tree, KEY_FIELD};
use crate::error::{JsonDbError, Result};
use crate::index::IndexManager;
use crate::keygen::{self, KeyStrategy};
use crate::persistence::{Backend, FileBackend};
use crate::query::{self, Query};
use crate::schema::{Schema, StoreDefinition};
use crate::validation::{self, ValidationReport};
use serde_json::Value;
use std::path::PathBuf;

mod config;

pub use config::StoreConfig;

/// Loaded contents: the tree plus the indexes derived from it
struct State {
    tree: Tree,
    indexes: IndexManager,
}

/// The main entry point for jsondb.
/// Owns one store file, its schema, and the in-memory tree and indexes.
/// Nothing is read until the first operation; every mutation rewrites the file.
pub struct Store {
    backend: Box<dyn Backend>,
    schema: Schema,
    config: StoreConfig,
    state: Option<State>,
}

impl Store {
    /// Open a store backed by the JSON file at `path`, with default settings.
    /// An empty `Schema` disables validation.
    pub fn open(path: impl Into<PathBuf>, schema: Schema) -> Result<Self> {
        Self::with_config(path, schema, StoreConfig::default())
    }

    /// Open a store backed by the JSON file at `path`.
    pub fn with_config(path: impl Into<PathBuf>, schema: Schema, config: StoreConfig) -> Result<Self> {
        let backend = FileBackend::new(path).pretty(config.pretty);
        Self::with_backend(Box::new(backend), schema, config)
    }

    /// Open a store from a parsed definition file.
    pub fn from_definition(path: impl Into<PathBuf>, definition: StoreDefinition) -> Result<Self> {
        Self::with_config(path, definition.fields, definition.config)
    }

    /// Open a store over any backend.
    pub fn with_backend(backend: Box<dyn Backend>, mut schema: Schema, config: StoreConfig) -> Result<Self> {
        schema.prepare()?;
        Ok(Store {
            backend,
            schema,
            config,
            state: None,
        })
    }

    /// Loaded state, reading the backend on first use.
    fn state_mut(&mut self) -> Result<&mut State> {
        Ok(self.parts_mut()?.1)
    }

    /// Schema and loaded state, borrowed together.
    fn parts_mut(&mut self) -> Result<(&Schema, &mut State)> {
        let state = match self.state.take() {
            Some(state) => state,
            None => self.load_state()?,
        };
        Ok((&self.schema, self.state.insert(state)))
    }

    fn load_state(&self) -> Result<State> {
        let tree = match self.backend.load()? {
            Some(mut tree) => {
                // The tree key wins over whatever `_id` the document carries.
                for (key, doc) in tree.iter_mut() {
                    match document::key_of(doc) {
                        Some(k) if k == key => continue,
                        Some(_) => log::warn!(
                            "document '{key}' carries a different {KEY_FIELD}: {}, using its key",
                            doc[KEY_FIELD]
                        ),
                        None if doc.contains_key(KEY_FIELD) => log::warn!(
                            "document '{key}' has a non-string {KEY_FIELD}: {}, using its key",
                            doc[KEY_FIELD]
                        ),
                        None => log::warn!("document '{key}' has no {KEY_FIELD} field, using its key"),
                    }
                    doc.insert(KEY_FIELD.to_string(), Value::String(key.clone()));
                }
                tree
            }
            None => {
                log::info!("store {} does not exist, creating it", self.backend.describe());
                let tree = Tree::new();
                self.backend.save(&tree)?;
                tree
            }
        };

        let mut indexes = IndexManager::new();
        for field in &self.config.indexes {
            indexes.create(field, &tree);
        }

        Ok(State { tree, indexes })
    }

    /// Write the whole tree back.
    fn persist(&self) -> Result<()> {
        match &self.state {
            Some(state) => self.backend.save(&state.tree),
            None => Ok(()),
        }
    }

    /// Get the schema
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Where the store lives, e.g. the file path.
    pub fn location(&self) -> String {
        self.backend.describe()
    }

    // ── Indexes ──────────────────────────────────────────────────────

    /// Create an index on `field`, backfilled from the current contents.
    /// Creating an index that already exists does nothing.
    pub fn create_index(&mut self, field: &str) -> Result<()> {
        let state = self.state_mut()?;
        state.indexes.create(field, &state.tree);
        Ok(())
    }

    /// Drop the index on `field`. Returns whether there was one.
    pub fn drop_index(&mut self, field: &str) -> Result<bool> {
        Ok(self.state_mut()?.indexes.drop_index(field))
    }

    /// Indexed fields, in creation order.
    pub fn indexed_fields(&mut self) -> Result<Vec<String>> {
        Ok(self.state_mut()?.indexes.fields().map(String::from).collect())
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Insert a document. Returns its key.
    ///
    /// The key is the document's own `_id` if it has one, otherwise a fresh key
    /// from the configured strategy. Inserting under a key that already exists
    /// replaces that document.
    pub fn insert(&mut self, document: Document) -> Result<String> {
        let strategy = self.config.key_strategy;
        self.insert_with(document, strategy)
    }

    /// Insert a document, generating a missing key with `strategy`.
    pub fn insert_with(&mut self, mut document: Document, strategy: KeyStrategy) -> Result<String> {
        validation::check_document(&self.schema, &document)?;

        let supplied = match document.get(KEY_FIELD) {
            None | Some(Value::Null) => None,
            Some(value) => Some(keygen::resolve_supplied_key(value)?),
        };

        let state = self.state_mut()?;
        let key = match supplied {
            Some(key) => key,
            None => keygen::generate_key(strategy, &state.tree)?,
        };
        document.insert(KEY_FIELD.to_string(), Value::String(key.clone()));

        match state.tree.get_mut(&key) {
            Some(existing) => {
                let old = std::mem::replace(existing, document);
                state.indexes.reindex_on_update(&key, &old, existing);
                log::debug!("replaced document '{key}'");
            }
            None => {
                state.indexes.index_insert(&key, &document);
                state.tree.insert(key.clone(), document);
                log::debug!("inserted document '{key}'");
            }
        }

        self.persist()?;
        Ok(key)
    }

    /// Merge `updates` into every document matching `query`.
    /// Returns the number of documents changed; zero matches is not an error.
    pub fn update(&mut self, query: &Query, updates: Document) -> Result<usize> {
        validation::check_partial(&self.schema, &updates)?;
        validation::check_query(&self.schema, query)?;

        let requested_key = match updates.get(KEY_FIELD) {
            Some(value) => Some(keygen::resolve_supplied_key(value)?),
            None => None,
        };

        let state = self.state_mut()?;
        let targets = query::evaluate(&state.tree, &state.indexes, query);
        if targets.is_empty() {
            return Ok(0);
        }

        // Keys are immutable: refuse before touching anything.
        if let Some(attempted) = &requested_key {
            if let Some(key) = targets.iter().find(|key| *key != attempted) {
                return Err(JsonDbError::ImmutableKey {
                    key: key.clone(),
                    attempted: attempted.clone(),
                });
            }
        }

        for key in &targets {
            if let Some(doc) = state.tree.get_mut(key) {
                let old = doc.clone();
                document::merge_partial(doc, &updates);
                doc.insert(KEY_FIELD.to_string(), Value::String(key.clone()));
                state.indexes.reindex_on_update(key, &old, doc);
            }
        }

        self.persist()?;
        log::debug!("updated {} document(s)", targets.len());
        Ok(targets.len())
    }

    /// Remove every document matching `query`. Returns how many were removed.
    pub fn remove(&mut self, query: &Query) -> Result<usize> {
        let state = self.state_mut()?;
        let targets = query::evaluate(&state.tree, &state.indexes, query);
        if targets.is_empty() {
            return Ok(0);
        }

        let mut removed = 0;
        for key in &targets {
            if let Some(doc) = state.tree.shift_remove(key) {
                state.indexes.reindex_on_remove(key, &doc);
                removed += 1;
            }
        }

        self.persist()?;
        log::debug!("removed {removed} document(s)");
        Ok(removed)
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Keys of all documents matching `query`, in store order.
    pub fn find(&mut self, query: &Query) -> Result<Vec<String>> {
        validation::check_query(&self.schema, query)?;
        let state = self.state_mut()?;
        Ok(query::evaluate(&state.tree, &state.indexes, query))
    }

    /// Copies of all documents matching `query`, in store order.
    pub fn find_documents(&mut self, query: &Query) -> Result<Vec<Document>> {
        validation::check_query(&self.schema, query)?;
        let state = self.state_mut()?;
        Ok(query::evaluate(&state.tree, &state.indexes, query)
            .iter()
            .filter_map(|key| state.tree.get(key).cloned())
            .collect())
    }

    /// The first document matching `query`, if any.
    pub fn find_one(&mut self, query: &Query) -> Result<Option<Document>> {
        validation::check_query(&self.schema, query)?;
        let state = self.state_mut()?;
        Ok(query::find_first(&state.tree, &state.indexes, query)
            .and_then(|key| state.tree.get(&key).cloned()))
    }

    /// Direct lookup by key.
    pub fn get(&mut self, key: &str) -> Result<Option<Document>> {
        Ok(self.state_mut()?.tree.get(key).cloned())
    }

    /// Snapshot of the whole tree. Later mutations are not reflected in it.
    pub fn get_all(&mut self) -> Result<Tree> {
        Ok(self.state_mut()?.tree.clone())
    }

    pub fn len(&mut self) -> Result<usize> {
        Ok(self.state_mut()?.tree.len())
    }

    pub fn is_empty(&mut self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// One more than the largest numeric key, or 1. Advisory only: pass it as
    /// `_id` (or use `KeyStrategy::AutoIncrement`) to actually use it.
    pub fn auto_increment_id(&mut self) -> Result<i64> {
        keygen::next_auto_increment(&self.state_mut()?.tree)
    }

    // ── Maintenance ──────────────────────────────────────────────────

    /// Check every stored document against the schema.
    pub fn validate_all(&mut self) -> Result<ValidationReport> {
        let (schema, state) = self.parts_mut()?;
        let mut report = ValidationReport {
            total: state.tree.len(),
            issues: Vec::new(),
        };
        for (key, doc) in &state.tree {
            let result = validation::validate_document(schema, doc);
            if !result.is_ok() {
                report.issues.push((key.clone(), result.errors));
            }
        }
        Ok(report)
    }

    /// Discard in-memory state and read the store again. Existing indexes are
    /// rebuilt against the fresh contents.
    pub fn reload(&mut self) -> Result<()> {
        let previous = self.state.take();
        let mut state = self.load_state()?;
        if let Some(previous) = previous {
            let mut indexes = previous.indexes;
            indexes.rebuild(&state.tree);
            for field in state.indexes.fields() {
                indexes.create(field, &state.tree);
            }
            state.indexes = indexes;
        }
        self.state = Some(state);
        Ok(())
    }

    /// The table `visualize` prints.
    pub fn render(&mut self) -> Result<String> {
        Ok(display::render_table(&self.state_mut()?.tree))
    }

    /// Print every document as a table on stdout.
    pub fn visualize(&mut self) -> Result<()> {
        print!("{}", self.render()?);
        Ok(())
    }
}
