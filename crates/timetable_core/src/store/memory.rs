//! In-memory document store.
//!
//! # Responsibility
//! - Back tests and embedded callers with the full `DocumentStore` contract.
//!
//! # Invariants
//! - Each document carries a version bumped on every write; `transact`
//!   commits only against the version it read.
//! - The lock is never held while a transaction closure runs, so closures
//!   observe real interleavings with other writers.
//! - `server_timestamp` is strictly increasing per store.

use super::{
    compare_values, generate_id, merge_fields, CollectionPath, DocPath, Document, DocumentStore,
    Fields, Query, RetryPolicy, SetMode, StoreError, StoreResult, Timestamp, TransactionFn,
    TransactionOutcome,
};
use log::{debug, warn};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone)]
struct StoredDocument {
    fields: Fields,
    version: u64,
    seq: u64,
}

#[derive(Debug, Default)]
struct MemoryState {
    // collection path -> document id -> document
    collections: BTreeMap<String, HashMap<String, StoredDocument>>,
    next_seq: u64,
    last_timestamp: Timestamp,
}

impl MemoryState {
    fn lookup(&self, path: &DocPath) -> Option<&StoredDocument> {
        self.collections
            .get(&path.parent().as_string())
            .and_then(|docs| docs.get(path.id()))
    }

    fn write(&mut self, path: &DocPath, fields: Fields) {
        let seq = self.next_seq;
        let docs = self.collections.entry(path.parent().as_string()).or_default();
        match docs.get_mut(path.id()) {
            Some(existing) => {
                existing.fields = fields;
                existing.version += 1;
            }
            None => {
                docs.insert(
                    path.id().to_string(),
                    StoredDocument {
                        fields,
                        version: 1,
                        seq,
                    },
                );
                self.next_seq += 1;
            }
        }
    }
}

/// `Mutex`-guarded in-memory `DocumentStore`.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    state: Mutex<MemoryState>,
    retry: RetryPolicy,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retry_policy(retry: RetryPolicy) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            retry,
        }
    }

    /// Number of documents currently stored directly in `collection`.
    pub fn collection_len(&self, collection: &CollectionPath) -> StoreResult<usize> {
        let state = self.lock()?;
        Ok(state
            .collections
            .get(&collection.as_string())
            .map_or(0, HashMap::len))
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|err| StoreError::Internal(err.to_string()))
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn get(&self, path: &DocPath) -> StoreResult<Option<Document>> {
        let state = self.lock()?;
        Ok(state.lookup(path).map(|stored| Document {
            path: path.clone(),
            fields: stored.fields.clone(),
        }))
    }

    fn set(&self, path: &DocPath, fields: Fields, mode: SetMode) -> StoreResult<()> {
        let mut state = self.lock()?;
        let next = match (mode, state.lookup(path)) {
            (SetMode::Merge, Some(existing)) => {
                let mut merged = existing.fields.clone();
                merge_fields(&mut merged, fields);
                merged
            }
            _ => fields,
        };
        state.write(path, next);
        Ok(())
    }

    fn update(&self, path: &DocPath, fields: Fields) -> StoreResult<()> {
        let mut state = self.lock()?;
        let mut merged = state
            .lookup(path)
            .map(|existing| existing.fields.clone())
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        merge_fields(&mut merged, fields);
        state.write(path, merged);
        Ok(())
    }

    fn add(&self, collection: &CollectionPath, fields: Fields) -> StoreResult<DocPath> {
        let path = collection.doc(&generate_id())?;
        let mut state = self.lock()?;
        state.write(&path, fields);
        Ok(path)
    }

    fn query(&self, collection: &CollectionPath, query: &Query) -> StoreResult<Vec<Document>> {
        query.validate()?;
        let state = self.lock()?;
        let Some(docs) = state.collections.get(&collection.as_string()) else {
            return Ok(Vec::new());
        };

        let mut matched: Vec<(&String, &StoredDocument)> = docs
            .iter()
            .filter(|(_, stored)| query.matches(&stored.fields))
            .collect();
        matched.sort_by(|(_, a), (_, b)| {
            let by_field = query.order_by.as_ref().map(|order| {
                let ordering =
                    compare_values(a.fields.get(&order.field), b.fields.get(&order.field));
                match order.direction {
                    super::Direction::Ascending => ordering,
                    super::Direction::Descending => ordering.reverse(),
                }
            });
            by_field
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.seq.cmp(&b.seq))
        });

        let limit = query.limit.map_or(usize::MAX, |limit| limit as usize);
        matched
            .into_iter()
            .take(limit)
            .map(|(id, stored)| -> StoreResult<Document> {
                Ok(Document {
                    path: collection.doc(id)?,
                    fields: stored.fields.clone(),
                })
            })
            .collect()
    }

    fn delete(&self, path: &DocPath) -> StoreResult<()> {
        let mut state = self.lock()?;
        if let Some(docs) = state.collections.get_mut(&path.parent().as_string()) {
            docs.remove(path.id());
        }
        Ok(())
    }

    fn transact(
        &self,
        path: &DocPath,
        apply: &mut TransactionFn<'_>,
    ) -> StoreResult<TransactionOutcome> {
        for attempt in 1..=self.retry.max_attempts {
            let (snapshot, read_version) = {
                let state = self.lock()?;
                match state.lookup(path) {
                    Some(stored) => (
                        Some(Document {
                            path: path.clone(),
                            fields: stored.fields.clone(),
                        }),
                        Some(stored.version),
                    ),
                    None => (None, None),
                }
            };

            let Some(patch) = apply(snapshot.as_ref())? else {
                return Ok(TransactionOutcome {
                    attempts: attempt,
                    committed: false,
                });
            };

            let mut state = self.lock()?;
            let current_version = state.lookup(path).map(|stored| stored.version);
            if current_version != read_version {
                debug!(
                    "event=tx_conflict module=store backend=memory path={} attempt={}",
                    path, attempt
                );
                continue;
            }

            let mut next = snapshot.map(|doc| doc.fields).unwrap_or_default();
            merge_fields(&mut next, patch);
            state.write(path, next);
            return Ok(TransactionOutcome {
                attempts: attempt,
                committed: true,
            });
        }

        warn!(
            "event=tx_exhausted module=store backend=memory path={} attempts={}",
            path, self.retry.max_attempts
        );
        Err(StoreError::Conflict {
            path: path.to_string(),
            attempts: self.retry.max_attempts,
        })
    }

    fn server_timestamp(&self) -> StoreResult<Timestamp> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|err| StoreError::Internal(err.to_string()))?
            .as_millis();
        let now = Timestamp::try_from(now).unwrap_or(Timestamp::MAX);
        let mut state = self.lock()?;
        let next = now.max(state.last_timestamp + 1);
        state.last_timestamp = next;
        Ok(next)
    }
}
