//! SQLite-backed document store.
//!
//! # Responsibility
//! - Persist documents as JSON bodies in one `documents` table keyed by
//!   `(collection, doc_id)`.
//! - Translate equality queries to SQLite JSON1 expressions.
//!
//! # Invariants
//! - Every write bumps `version`; `transact` commits with
//!   `UPDATE ... WHERE version = ?` and retries when no row matched.
//! - The connection lock is released while a transaction closure runs.

use super::{
    generate_id, merge_fields, CollectionPath, DocPath, Document, DocumentStore, Fields, Query,
    RetryPolicy, SetMode, StoreError, StoreResult, Timestamp, TransactionFn, TransactionOutcome,
};
use crate::db::{open_db, open_db_in_memory};
use log::{debug, warn};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const NOW_MS_SQL: &str = "CAST((julianday('now') - 2440587.5) * 86400000 AS INTEGER)";

/// `DocumentStore` over a migrated SQLite connection.
pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
    retry: RetryPolicy,
}

impl SqliteDocumentStore {
    /// Opens a database file, applying migrations first.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Ok(Self::from_connection(open_db(path)?))
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::from_connection(open_db_in_memory()?))
    }

    /// Wraps a connection returned by `db::open_db*`.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|err| StoreError::Internal(err.to_string()))
    }
}

impl DocumentStore for SqliteDocumentStore {
    fn get(&self, path: &DocPath) -> StoreResult<Option<Document>> {
        let conn = self.lock()?;
        Ok(read_row(&conn, path)?.map(|(fields, _)| Document {
            path: path.clone(),
            fields,
        }))
    }

    fn set(&self, path: &DocPath, fields: Fields, mode: SetMode) -> StoreResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let next = match (mode, read_row(&tx, path)?) {
            (SetMode::Merge, Some((mut existing, _))) => {
                merge_fields(&mut existing, fields);
                existing
            }
            _ => fields,
        };
        upsert(&tx, path, &next)?;
        tx.commit()?;
        Ok(())
    }

    fn update(&self, path: &DocPath, fields: Fields) -> StoreResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let (mut existing, _) =
            read_row(&tx, path)?.ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        merge_fields(&mut existing, fields);
        upsert(&tx, path, &existing)?;
        tx.commit()?;
        Ok(())
    }

    fn add(&self, collection: &CollectionPath, fields: Fields) -> StoreResult<DocPath> {
        let path = collection.doc(&generate_id())?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO documents (collection, doc_id, body) VALUES (?1, ?2, ?3);",
            params![
                collection.as_string(),
                path.id(),
                serde_json::to_string(&fields)?
            ],
        )?;
        Ok(path)
    }

    fn query(&self, collection: &CollectionPath, query: &Query) -> StoreResult<Vec<Document>> {
        query.validate()?;
        let (sql, binds) = build_query_sql(collection, query)?;

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut documents = Vec::new();
        while let Some(row) = rows.next()? {
            let doc_id: String = row.get("doc_id")?;
            let body: String = row.get("body")?;
            let path = collection.doc(&doc_id)?;
            documents.push(Document {
                fields: parse_body(&path, &body)?,
                path,
            });
        }

        Ok(documents)
    }

    fn delete(&self, path: &DocPath) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM documents WHERE collection = ?1 AND doc_id = ?2;",
            params![path.parent().as_string(), path.id()],
        )?;
        Ok(())
    }

    fn transact(
        &self,
        path: &DocPath,
        apply: &mut TransactionFn<'_>,
    ) -> StoreResult<TransactionOutcome> {
        let collection = path.parent().as_string();

        for attempt in 1..=self.retry.max_attempts {
            let snapshot = {
                let conn = self.lock()?;
                read_row(&conn, path)?
            };
            let read_version = snapshot.as_ref().map(|(_, version)| *version);
            let current = snapshot.map(|(fields, _)| Document {
                path: path.clone(),
                fields,
            });

            let Some(patch) = apply(current.as_ref())? else {
                return Ok(TransactionOutcome {
                    attempts: attempt,
                    committed: false,
                });
            };

            let mut next = current.map(|doc| doc.fields).unwrap_or_default();
            merge_fields(&mut next, patch);
            let body = serde_json::to_string(&next)?;

            let conn = self.lock()?;
            let changed = match read_version {
                Some(version) => conn.execute(
                    &format!(
                        "UPDATE documents
                         SET body = ?1, version = version + 1, updated_at = {NOW_MS_SQL}
                         WHERE collection = ?2 AND doc_id = ?3 AND version = ?4;"
                    ),
                    params![body, collection, path.id(), version],
                )?,
                None => conn.execute(
                    "INSERT INTO documents (collection, doc_id, body) VALUES (?1, ?2, ?3)
                     ON CONFLICT (collection, doc_id) DO NOTHING;",
                    params![collection, path.id(), body],
                )?,
            };

            if changed == 1 {
                return Ok(TransactionOutcome {
                    attempts: attempt,
                    committed: true,
                });
            }
            debug!(
                "event=tx_conflict module=store backend=sqlite path={} attempt={}",
                path, attempt
            );
        }

        warn!(
            "event=tx_exhausted module=store backend=sqlite path={} attempts={}",
            path, self.retry.max_attempts
        );
        Err(StoreError::Conflict {
            path: path.to_string(),
            attempts: self.retry.max_attempts,
        })
    }

    fn server_timestamp(&self) -> StoreResult<Timestamp> {
        let conn = self.lock()?;
        let now = conn.query_row(&format!("SELECT {NOW_MS_SQL};"), [], |row| {
            row.get::<_, i64>(0)
        })?;
        Ok(now)
    }
}

fn read_row(conn: &Connection, path: &DocPath) -> StoreResult<Option<(Fields, i64)>> {
    let row = conn
        .query_row(
            "SELECT body, version FROM documents WHERE collection = ?1 AND doc_id = ?2;",
            params![path.parent().as_string(), path.id()],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
        )
        .optional()?;

    match row {
        Some((body, version)) => Ok(Some((parse_body(path, &body)?, version))),
        None => Ok(None),
    }
}

fn upsert(conn: &Connection, path: &DocPath, fields: &Fields) -> StoreResult<()> {
    conn.execute(
        &format!(
            "INSERT INTO documents (collection, doc_id, body) VALUES (?1, ?2, ?3)
             ON CONFLICT (collection, doc_id) DO UPDATE SET
                body = excluded.body,
                version = documents.version + 1,
                updated_at = {NOW_MS_SQL};"
        ),
        params![
            path.parent().as_string(),
            path.id(),
            serde_json::to_string(fields)?
        ],
    )?;
    Ok(())
}

fn parse_body(path: &DocPath, body: &str) -> StoreResult<Fields> {
    match serde_json::from_str::<Value>(body)? {
        Value::Object(fields) => Ok(fields),
        other => Err(StoreError::InvalidData(format!(
            "`{path}` body is not an object: {other}"
        ))),
    }
}

fn build_query_sql(
    collection: &CollectionPath,
    query: &Query,
) -> StoreResult<(String, Vec<SqlValue>)> {
    let mut sql = "SELECT doc_id, body FROM documents WHERE collection = ?".to_string();
    let mut binds = vec![SqlValue::Text(collection.as_string())];

    for filter in &query.filters {
        let json_path = SqlValue::Text(format!("$.{}", filter.field));
        match &filter.value {
            Value::Null => {
                sql.push_str(" AND json_type(body, ?) = 'null'");
                binds.push(json_path);
            }
            Value::Bool(flag) => {
                sql.push_str(" AND json_type(body, ?) = ?");
                binds.push(json_path);
                binds.push(SqlValue::Text(flag.to_string()));
            }
            Value::Number(number) => {
                // JSON1 extracts booleans as 0/1, so pin the type first.
                sql.push_str(
                    " AND json_type(body, ?) IN ('integer', 'real') AND json_extract(body, ?) = ?",
                );
                binds.push(json_path.clone());
                binds.push(json_path);
                binds.push(match number.as_i64() {
                    Some(integer) => SqlValue::Integer(integer),
                    None => SqlValue::Real(number.as_f64().unwrap_or_default()),
                });
            }
            Value::String(text) => {
                sql.push_str(" AND json_type(body, ?) = 'text' AND json_extract(body, ?) = ?");
                binds.push(json_path.clone());
                binds.push(json_path);
                binds.push(SqlValue::Text(text.clone()));
            }
            nested @ (Value::Array(_) | Value::Object(_)) => {
                sql.push_str(" AND json_extract(body, ?) = json(?)");
                binds.push(json_path);
                binds.push(SqlValue::Text(serde_json::to_string(nested)?));
            }
        }
    }

    match &query.order_by {
        Some(order) => {
            let direction = match order.direction {
                super::Direction::Ascending => "ASC",
                super::Direction::Descending => "DESC",
            };
            sql.push_str(&format!(
                " ORDER BY json_extract(body, ?) {direction}, seq ASC"
            ));
            binds.push(SqlValue::Text(format!("$.{}", order.field)));
        }
        None => sql.push_str(" ORDER BY seq ASC"),
    }

    if let Some(limit) = query.limit {
        sql.push_str(" LIMIT ?");
        binds.push(SqlValue::Integer(i64::from(limit)));
    }

    Ok((sql, binds))
}
