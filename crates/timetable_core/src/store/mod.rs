//! Document store contract and adapters.
//!
//! # Responsibility
//! - Define the key/document storage contract the services are written
//!   against (`DocumentStore`).
//! - Provide an in-memory adapter and a SQLite-backed adapter.
//!
//! # Invariants
//! - `transact` is the only read-modify-write primitive with atomicity; it
//!   commits only when the document version is unchanged since the read.
//! - `delete` never checks for existence.
//! - Default query ordering is document creation order.

use crate::db::DbError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub mod layout;
mod memory;
mod path;
mod sqlite;

pub use memory::InMemoryDocumentStore;
pub use path::{CollectionPath, DocPath};
pub use sqlite::SqliteDocumentStore;

/// Top-level document fields.
pub type Fields = Map<String, Value>;

/// Store-generated write time, epoch milliseconds.
pub type Timestamp = i64;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by document store adapters.
#[derive(Debug)]
pub enum StoreError {
    /// Target document does not exist.
    NotFound(String),
    /// Optimistic transaction kept colliding until the retry budget ran out.
    Conflict { path: String, attempts: u32 },
    InvalidPath(String),
    InvalidData(String),
    Serialization(serde_json::Error),
    Db(DbError),
    /// Adapter internal failure (for example a poisoned lock).
    Internal(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "document not found: {path}"),
            Self::Conflict { path, attempts } => write!(
                f,
                "transaction on `{path}` conflicted after {attempts} attempts"
            ),
            Self::InvalidPath(message) => write!(f, "invalid path: {message}"),
            Self::InvalidData(message) => write!(f, "invalid stored data: {message}"),
            Self::Serialization(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Internal(message) => write!(f, "store internal error: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Serialization(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// One stored document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub path: DocPath,
    pub fields: Fields,
}

impl Document {
    /// Document id, the last segment of `path`.
    pub fn id(&self) -> &str {
        self.path.id()
    }

    /// Decodes the document fields into a typed record.
    pub fn decode<T: DeserializeOwned>(&self) -> StoreResult<T> {
        serde_json::from_value(Value::Object(self.fields.clone())).map_err(|err| {
            StoreError::InvalidData(format!("`{}` does not decode: {err}", self.path))
        })
    }
}

/// Encodes a typed record into top-level document fields.
pub fn encode<T: Serialize>(record: &T) -> StoreResult<Fields> {
    match serde_json::to_value(record)? {
        Value::Object(fields) => Ok(fields),
        other => Err(StoreError::InvalidData(format!(
            "records must encode to an object, got `{other}`"
        ))),
    }
}

/// Overwrite semantics for `DocumentStore::set`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetMode {
    /// Replace every field.
    Overwrite,
    /// Replace only the given top-level fields, keep the rest.
    Merge,
}

/// Sort direction for `Query::order_by`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Top-level `field == value` condition; a missing field never matches.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub value: Value,
}

/// Sort key; documents missing the field sort first ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// Equality-filtered collection query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<FieldFilter>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<u32>,
}

impl Query {
    /// Unfiltered query in creation order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an equality filter; JSON types must match exactly.
    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(FieldFilter {
            field: field.to_string(),
            value: value.into(),
        });
        self
    }

    /// Orders by `field`, ties broken by creation order.
    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.to_string(),
            direction,
        });
        self
    }

    /// Caps the number of returned documents.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub(crate) fn validate(&self) -> StoreResult<()> {
        for filter in &self.filters {
            path::validate_field(&filter.field)?;
        }
        if let Some(order) = &self.order_by {
            path::validate_field(&order.field)?;
        }
        Ok(())
    }

    pub(crate) fn matches(&self, fields: &Fields) -> bool {
        self.filters
            .iter()
            .all(|filter| fields.get(&filter.field) == Some(&filter.value))
    }
}

/// Retry budget for optimistic transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS)
    }
}

/// Result of a committed (or intentionally empty) transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionOutcome {
    /// Number of times the closure ran, including the successful run.
    pub attempts: u32,
    /// `false` when the closure asked for no write.
    pub committed: bool,
}

/// Closure run inside `DocumentStore::transact`.
///
/// Receives the current document (`None` when absent). Returns the top-level
/// fields to merge into the document, or `None` to commit nothing. Returning
/// an error aborts the transaction without retry.
pub type TransactionFn<'a> = dyn FnMut(Option<&Document>) -> StoreResult<Option<Fields>> + 'a;

/// Key/document storage contract.
pub trait DocumentStore {
    fn get(&self, path: &DocPath) -> StoreResult<Option<Document>>;
    fn set(&self, path: &DocPath, fields: Fields, mode: SetMode) -> StoreResult<()>;
    /// Merges `fields` into an existing document; `NotFound` when absent.
    fn update(&self, path: &DocPath, fields: Fields) -> StoreResult<()>;
    /// Creates a document with a store-generated id.
    fn add(&self, collection: &CollectionPath, fields: Fields) -> StoreResult<DocPath>;
    fn query(&self, collection: &CollectionPath, query: &Query) -> StoreResult<Vec<Document>>;
    fn delete(&self, path: &DocPath) -> StoreResult<()>;
    fn transact(
        &self,
        path: &DocPath,
        apply: &mut TransactionFn<'_>,
    ) -> StoreResult<TransactionOutcome>;
    fn server_timestamp(&self) -> StoreResult<Timestamp>;
}

impl<T: DocumentStore + ?Sized> DocumentStore for &T {
    fn get(&self, path: &DocPath) -> StoreResult<Option<Document>> {
        (**self).get(path)
    }

    fn set(&self, path: &DocPath, fields: Fields, mode: SetMode) -> StoreResult<()> {
        (**self).set(path, fields, mode)
    }

    fn update(&self, path: &DocPath, fields: Fields) -> StoreResult<()> {
        (**self).update(path, fields)
    }

    fn add(&self, collection: &CollectionPath, fields: Fields) -> StoreResult<DocPath> {
        (**self).add(collection, fields)
    }

    fn query(&self, collection: &CollectionPath, query: &Query) -> StoreResult<Vec<Document>> {
        (**self).query(collection, query)
    }

    fn delete(&self, path: &DocPath) -> StoreResult<()> {
        (**self).delete(path)
    }

    fn transact(
        &self,
        path: &DocPath,
        apply: &mut TransactionFn<'_>,
    ) -> StoreResult<TransactionOutcome> {
        (**self).transact(path, apply)
    }

    fn server_timestamp(&self) -> StoreResult<Timestamp> {
        (**self).server_timestamp()
    }
}

impl<T: DocumentStore + ?Sized> DocumentStore for Arc<T> {
    fn get(&self, path: &DocPath) -> StoreResult<Option<Document>> {
        (**self).get(path)
    }

    fn set(&self, path: &DocPath, fields: Fields, mode: SetMode) -> StoreResult<()> {
        (**self).set(path, fields, mode)
    }

    fn update(&self, path: &DocPath, fields: Fields) -> StoreResult<()> {
        (**self).update(path, fields)
    }

    fn add(&self, collection: &CollectionPath, fields: Fields) -> StoreResult<DocPath> {
        (**self).add(collection, fields)
    }

    fn query(&self, collection: &CollectionPath, query: &Query) -> StoreResult<Vec<Document>> {
        (**self).query(collection, query)
    }

    fn delete(&self, path: &DocPath) -> StoreResult<()> {
        (**self).delete(path)
    }

    fn transact(
        &self,
        path: &DocPath,
        apply: &mut TransactionFn<'_>,
    ) -> StoreResult<TransactionOutcome> {
        (**self).transact(path, apply)
    }

    fn server_timestamp(&self) -> StoreResult<Timestamp> {
        (**self).server_timestamp()
    }
}

/// Generates a new document id.
pub(crate) fn generate_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Shallow merge of top-level fields.
pub(crate) fn merge_fields(target: &mut Fields, patch: Fields) {
    for (key, value) in patch {
        target.insert(key, value);
    }
}

/// Total order over JSON values used for `order_by`.
///
/// Missing fields sort first; values of different JSON types are ordered
/// null < bool < number < string < array < object.
pub(crate) fn compare_values(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (left, right) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (a, b) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Number(a), Value::Number(b)) => {
                match (a.as_i64(), b.as_i64()) {
                    (Some(a), Some(b)) => a.cmp(&b),
                    _ => a
                        .as_f64()
                        .unwrap_or_default()
                        .total_cmp(&b.as_f64().unwrap_or_default()),
                }
            }
            (Value::String(a), Value::String(b)) => a.cmp(b),
            _ => rank(a).cmp(&rank(b)),
        },
    }
}
