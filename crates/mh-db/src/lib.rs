//! Storage layer for the media history tracker.
//!
//! Implements [`MediaStore`] on top of `rusqlite`, emulating the single-table
//! key-value layout the engine expects.
//!
//! # Thread Safety
//!
//! A `rusqlite::Connection` is `Send` but not `Sync`. [`Database`] wraps it in
//! a `Mutex` so one instance can be shared by the concurrent batch writes of a
//! single invocation. Statements are short and run while the lock is held.
//!
//! # Schema
//!
//! Every logical table lives in one `items` table keyed by
//! `(table_name, pk, sk)`. The `attributes` column holds the item's JSON
//! object. `last_update` mirrors the attribute of the same name so the
//! `lastUpdatedIndex` range query can be answered from an index.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use mh_core::store::{LAST_UPDATED_INDEX, MAX_BATCH_SIZE, RangeCondition};
use mh_core::{Attributes, CompositeKey, IndexQuery, Item, MediaStore, StoreError, WriteRequest};
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A stored attribute blob is not a JSON object.
    #[error("invalid attributes for ({pk}, {sk}): {source}")]
    InvalidAttributes {
        pk: String,
        sk: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("attributes could not be encoded: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("batch of {len} writes exceeds the limit of {max}", max = MAX_BATCH_SIZE)]
    BatchTooLarge { len: usize },
    #[error("unknown index {0:?}")]
    UnknownIndex(String),
    /// A previous holder of the connection lock panicked.
    #[error("database connection lock poisoned")]
    Poisoned,
}

impl DbError {
    fn into_store_error(self, operation: &'static str) -> StoreError {
        match self {
            Self::BatchTooLarge { len } => StoreError::BatchTooLarge { len },
            Self::UnknownIndex(index) => StoreError::UnknownIndex(index),
            Self::Encode(source) => StoreError::Serialization(source),
            other => StoreError::backend(operation, other),
        }
    }
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(conn: Connection) -> Result<Self, DbError> {
        conn.execute_batch(
            "
            -- Items table: one row per (table, pk, sk)
            -- attributes: JSON object of the item's non-key fields
            -- last_update: copy of the numeric last_update attribute, if any
            CREATE TABLE IF NOT EXISTS items (
                table_name TEXT NOT NULL,
                pk TEXT NOT NULL,
                sk TEXT NOT NULL,
                last_update INTEGER,
                attributes TEXT NOT NULL,
                PRIMARY KEY (table_name, pk, sk)
            );

            CREATE INDEX IF NOT EXISTS idx_items_last_update
                ON items(table_name, pk, last_update);
            ",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    /// Fetches one item.
    pub fn get(&self, table: &str, key: &CompositeKey) -> Result<Option<Item>, DbError> {
        let conn = self.lock()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT attributes FROM items WHERE table_name = ?1 AND pk = ?2 AND sk = ?3",
                params![table, key.pk, key.sk],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|raw| decode_item(key.pk.clone(), key.sk.clone(), &raw))
            .transpose()
    }

    /// Merges `attributes` into the item, creating it when missing.
    pub fn update(
        &self,
        table: &str,
        key: &CompositeKey,
        attributes: Attributes,
    ) -> Result<(), DbError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let existing: Option<String> = tx
            .query_row(
                "SELECT attributes FROM items WHERE table_name = ?1 AND pk = ?2 AND sk = ?3",
                params![table, key.pk, key.sk],
                |row| row.get(0),
            )
            .optional()?;

        let mut item = match existing {
            Some(raw) => decode_item(key.pk.clone(), key.sk.clone(), &raw)?,
            None => Item::new(key.clone(), Attributes::new()),
        };
        item.attributes.extend(attributes);
        upsert(&tx, table, &item)?;
        tx.commit()?;
        Ok(())
    }

    /// Removes one item if present.
    pub fn delete(&self, table: &str, key: &CompositeKey) -> Result<(), DbError> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM items WHERE table_name = ?1 AND pk = ?2 AND sk = ?3",
            params![table, key.pk, key.sk],
        )?;
        Ok(())
    }

    /// Lists a partition's items by `last_update`, oldest first.
    pub fn query_index(&self, query: &IndexQuery) -> Result<Vec<Item>, DbError> {
        if query.index != LAST_UPDATED_INDEX {
            return Err(DbError::UnknownIndex(query.index.clone()));
        }
        let RangeCondition::AtLeast(bound) = query.condition;

        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "
            SELECT pk, sk, attributes
            FROM items
            WHERE table_name = ?1 AND pk = ?2 AND last_update >= ?3
            ORDER BY last_update ASC, sk ASC
            ",
        )?;
        let rows = stmt.query_map(params![query.table, query.pk, bound], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        let mut items = Vec::new();
        for row in rows {
            let (pk, sk, raw) = row?;
            items.push(decode_item(pk, sk, &raw)?);
        }
        Ok(items)
    }

    /// Applies a batch of puts and deletes in one transaction.
    pub fn batch_write(&self, table: &str, requests: &[WriteRequest]) -> Result<(), DbError> {
        if requests.len() > MAX_BATCH_SIZE {
            return Err(DbError::BatchTooLarge {
                len: requests.len(),
            });
        }
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for request in requests {
            match request {
                WriteRequest::Put(item) => upsert(&tx, table, item)?,
                WriteRequest::Delete(key) => {
                    tx.execute(
                        "DELETE FROM items WHERE table_name = ?1 AND pk = ?2 AND sk = ?3",
                        params![table, key.pk, key.sk],
                    )?;
                }
            }
        }
        tx.commit()?;
        debug!(table, items = requests.len(), "batch committed");
        Ok(())
    }
}

fn upsert(tx: &Transaction<'_>, table: &str, item: &Item) -> Result<(), DbError> {
    let raw = serde_json::to_string(&item.attributes).map_err(DbError::Encode)?;
    tx.execute(
        "
        INSERT INTO items (table_name, pk, sk, last_update, attributes)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT (table_name, pk, sk) DO UPDATE SET
            last_update = excluded.last_update,
            attributes = excluded.attributes
        ",
        params![table, item.pk, item.sk, item.last_update(), raw],
    )?;
    Ok(())
}

fn decode_item(pk: String, sk: String, raw: &str) -> Result<Item, DbError> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(attributes)) => Ok(Item {
            pk,
            sk,
            attributes,
        }),
        Ok(other) => Err(DbError::InvalidAttributes {
            source: serde::de::Error::custom(format!("expected an object, got {other}")),
            pk,
            sk,
        }),
        Err(source) => Err(DbError::InvalidAttributes { pk, sk, source }),
    }
}

#[async_trait]
impl MediaStore for Database {
    async fn get_item(&self, table: &str, key: &CompositeKey) -> Result<Option<Item>, StoreError> {
        self.get(table, key)
            .map_err(|err| err.into_store_error("get_item"))
    }

    async fn update_item(
        &self,
        table: &str,
        key: &CompositeKey,
        attributes: Attributes,
    ) -> Result<(), StoreError> {
        self.update(table, key, attributes)
            .map_err(|err| err.into_store_error("update_item"))
    }

    async fn delete_item(&self, table: &str, key: &CompositeKey) -> Result<(), StoreError> {
        self.delete(table, key)
            .map_err(|err| err.into_store_error("delete_item"))
    }

    async fn query(&self, query: &IndexQuery) -> Result<Vec<Item>, StoreError> {
        self.query_index(query)
            .map_err(|err| err.into_store_error("query"))
    }

    async fn batch_write_item(
        &self,
        table: &str,
        requests: &[WriteRequest],
    ) -> Result<Vec<WriteRequest>, StoreError> {
        self.batch_write(table, requests)
            .map_err(|err| err.into_store_error("batch_write_item"))?;
        Ok(Vec::new())
    }
}
