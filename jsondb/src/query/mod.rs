//! Query evaluation against the store tree.
//!
//! A query is a conjunction of per-field conditions. Fields with an index are
//! resolved through the index (hits for different fields are intersected);
//! the remaining fields are checked against each candidate document. With no
//! indexed field involved the whole tree is scanned.

use crate::document::{Document, Tree, KEY_FIELD};
use crate::error::{JsonDbError, Result};
use crate::index::IndexManager;
use serde_json::Value;
use std::collections::HashSet;

/// Expected value(s) for one field
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// The field must equal this value.
    Eq(Value),
    /// The field must equal one of these values.
    In(Vec<Value>),
}

impl Condition {
    /// Whether a document's field value satisfies the condition.
    /// An absent field never matches, not even `null`.
    pub fn matches(&self, actual: Option<&Value>) -> bool {
        let Some(actual) = actual else {
            return false;
        };
        match self {
            Condition::Eq(expected) => actual == expected,
            Condition::In(expected) => expected.contains(actual),
        }
    }
}

impl From<Value> for Condition {
    /// Arrays are read as "any of these values", everything else as exact match.
    fn from(value: Value) -> Self {
        match value {
            Value::Array(values) => Condition::In(values),
            other => Condition::Eq(other),
        }
    }
}

/// A conjunction of field conditions, kept in the order they were added.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    conditions: Vec<(String, Condition)>,
}

impl Query {
    /// The empty query, which matches every document.
    pub fn new() -> Self {
        Self::default()
    }

    /// `{_id: key}`
    pub fn by_key(key: &str) -> Self {
        Query::new().eq(KEY_FIELD, key)
    }

    pub fn eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.with(field, Condition::Eq(value.into()))
    }

    pub fn one_of<I, V>(self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.with(field, Condition::In(values.into_iter().map(Into::into).collect()))
    }

    /// Set the condition for a field, replacing any earlier one for the same field.
    pub fn with(mut self, field: &str, condition: Condition) -> Self {
        match self.conditions.iter_mut().find(|(f, _)| f == field) {
            Some(slot) => slot.1 = condition,
            None => self.conditions.push((field.to_string(), condition)),
        }
        self
    }

    /// Build a query from a JSON object such as `{"category": "A", "tier": [1, 2]}`.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self::from(map)),
            other => Err(JsonDbError::InvalidQuery(format!(
                "expected an object, got {other}"
            ))),
        }
    }

    pub fn conditions(&self) -> impl Iterator<Item = (&str, &Condition)> {
        self.conditions.iter().map(|(f, c)| (f.as_str(), c))
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Check every condition against a document.
    pub fn matches(&self, doc: &Document) -> bool {
        self.conditions
            .iter()
            .all(|(field, cond)| cond.matches(doc.get(field)))
    }
}

impl From<Document> for Query {
    fn from(map: Document) -> Self {
        map.into_iter()
            .fold(Query::new(), |q, (field, value)| q.with(&field, value.into()))
    }
}

/// How a query will be answered
#[derive(Debug)]
struct Plan<'q> {
    /// Keys allowed by the indexed conditions, or `None` when no queried field is indexed.
    candidates: Option<HashSet<String>>,
    /// Conditions without an index, checked per document.
    residual: Vec<(&'q str, &'q Condition)>,
}

impl Plan<'_> {
    fn residual_matches(&self, doc: &Document) -> bool {
        self.residual
            .iter()
            .all(|(field, cond)| cond.matches(doc.get(*field)))
    }
}

fn plan<'q>(indexes: &IndexManager, query: &'q Query) -> Plan<'q> {
    let mut candidates: Option<HashSet<String>> = None;
    let mut residual = Vec::new();
    let mut indexed = Vec::new();

    for (field, cond) in query.conditions() {
        match indexes.lookup(field, cond) {
            Some(hits) => {
                indexed.push(field);
                let hits: HashSet<String> = hits.into_iter().collect();
                candidates = Some(match candidates {
                    Some(prev) => prev.intersection(&hits).cloned().collect(),
                    None => hits,
                });
            }
            None => residual.push((field, cond)),
        }
    }

    log::debug!(
        "query plan: indexed={:?} scanned={:?} candidates={}",
        indexed,
        residual.iter().map(|(f, _)| *f).collect::<Vec<_>>(),
        candidates
            .as_ref()
            .map(|c| c.len().to_string())
            .unwrap_or_else(|| "all".to_string()),
    );

    Plan {
        candidates,
        residual,
    }
}

/// Candidate entries that are still in the tree, in tree order.
fn ordered_candidates<'t>(tree: &'t Tree, candidates: &HashSet<String>) -> Vec<(&'t String, &'t Document)> {
    let mut positioned: Vec<usize> = candidates
        .iter()
        .filter_map(|key| tree.get_index_of(key))
        .collect();
    positioned.sort_unstable();
    positioned
        .into_iter()
        .filter_map(|i| tree.get_index(i))
        .collect()
}

/// Evaluate a query, returning matching keys in tree order.
pub fn evaluate(tree: &Tree, indexes: &IndexManager, query: &Query) -> Vec<String> {
    let plan = plan(indexes, query);
    match &plan.candidates {
        None => tree
            .iter()
            .filter(|(_, doc)| plan.residual_matches(doc))
            .map(|(key, _)| key.clone())
            .collect(),
        Some(candidates) => ordered_candidates(tree, candidates)
            .into_iter()
            .filter(|(_, doc)| plan.residual_matches(doc))
            .map(|(key, _)| key.clone())
            .collect(),
    }
}

/// First matching key in tree order, if any.
pub fn find_first(tree: &Tree, indexes: &IndexManager, query: &Query) -> Option<String> {
    let plan = plan(indexes, query);
    match &plan.candidates {
        None => tree
            .iter()
            .find(|(_, doc)| plan.residual_matches(doc))
            .map(|(key, _)| key.clone()),
        // Earliest matching candidate by tree position, without sorting them all.
        Some(candidates) => candidates
            .iter()
            .filter_map(|key| tree.get_full(key))
            .filter(|(_, _, doc)| plan.residual_matches(doc))
            .min_by_key(|(pos, _, _)| *pos)
            .map(|(_, key, _)| key.clone()),
    }
}
