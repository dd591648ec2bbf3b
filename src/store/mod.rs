//! Generic record store used for audit logs, strikes, control flags and the like.
//!
//! Documents are JSON objects. Every document carries an `_id` and a
//! `created_at` timestamp assigned on creation.

mod memory;
mod yaml;

pub use memory::MemoryRecordStore;
pub use yaml::YamlRecordStore;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

pub type Document = Map<String, Value>;

pub const ID_FIELD: &str = "_id";
pub const CREATED_AT_FIELD: &str = "created_at";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid collection pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Record is not an object")]
    NotAnObject,

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Equality filter over (possibly dotted) field paths. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn field(mut self, path: &str, value: impl Into<Value>) -> Self {
        self.conditions.push((path.to_string(), value.into()));
        self
    }

    #[must_use]
    pub fn by_id(id: &str) -> Self {
        Self::new().field(ID_FIELD, id)
    }

    #[must_use]
    pub fn matches(&self, document: &Document) -> bool {
        self.conditions
            .iter()
            .all(|(path, expected)| lookup(document, path) == Some(expected))
    }

    /// Top-level equalities, used to seed an upserted document.
    fn seed(&self) -> Document {
        self.conditions
            .iter()
            .filter(|(path, _)| !path.contains('.'))
            .map(|(path, value)| (path.clone(), value.clone()))
            .collect()
    }
}

/// Field assignments applied by `find_one_and_update`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    set: Document,
}

impl Update {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.set.insert(field.to_string(), value.into());
        self
    }

    pub fn apply(&self, document: &mut Document) {
        for (field, value) in &self.set {
            document.insert(field.clone(), value.clone());
        }
    }
}

fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Fill in `_id` and `created_at` when the caller did not provide them.
pub(crate) fn stamp(mut document: Document) -> Document {
    document
        .entry(ID_FIELD)
        .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
    document
        .entry(CREATED_AT_FIELD)
        .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));
    document
}

/// Build the document an upsert creates when nothing matched.
pub(crate) fn upserted(filter: &Filter, update: &Update) -> Document {
    let mut document = filter.seed();
    update.apply(&mut document);
    stamp(document)
}

/// Serialize a typed record into a document.
///
/// # Errors
///
/// Fails when the value does not serialize to a JSON object.
pub fn to_document<T: Serialize>(value: &T) -> StoreResult<Document> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::NotAnObject),
    }
}

/// Deserialize a document into a typed record.
///
/// # Errors
///
/// Fails when the document does not have the record's shape.
pub fn from_document<T: DeserializeOwned>(document: Document) -> StoreResult<T> {
    Ok(serde_json::from_value(Value::Object(document))?)
}

/// Persistence operations the bot relies on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a document and return it with its assigned `_id` and `created_at`.
    async fn create(&self, collection: &str, document: Document) -> StoreResult<Document>;

    async fn find(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>>;

    async fn find_one(&self, collection: &str, filter: &Filter) -> StoreResult<Option<Document>>;

    /// Update the first match and return it after the update.
    ///
    /// With `upsert`, a document is created from the filter and update when nothing matches.
    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        upsert: bool,
    ) -> StoreResult<Option<Document>>;

    async fn find_one_and_delete(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> StoreResult<Option<Document>>;

    async fn count_documents(&self, collection: &str, filter: &Filter) -> StoreResult<u64>;
}
