//! Redb (Rust embedded database) backend.
//!
//! Two tables per [`TableConfig`]:
//! - `<name>`: canonical key → identifier, the uniqueness constraint;
//! - `<name>_<id_column>`: identifier → canonical key, ordered, so the highest
//!   identifier ever assigned is its last entry.
//!
//! A new identifier is `last + 1`, read and written inside the same write
//! transaction. Redb serializes write transactions, which makes
//! insert-or-fetch atomic and keeps identifiers from ever being reused.
//!
//! # Configuration Example
//! ```yaml
//! store:
//!   backend: redb
//!   path: /data/objects.redb
//! ```

use crate::{KeyedRow, StoreError, StoreGateway, TableConfig};
use canonical::CanonicalKey;
use redb::{
    Database, ReadableDatabase, ReadableTable, Table, TableDefinition, WriteTransaction,
};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Redb backend for persistent insert-or-fetch storage.
///
/// # Thread Safety
/// The `Arc<Database>` wrapper allows safe sharing across threads.
/// Redb handles its own internal locking and MVCC.
pub struct RedbStore {
    db: Arc<Database>,
    key_table: String,
    id_table: String,
}

impl RedbStore {
    /// Open or create a Redb database at the given path and make sure both
    /// tables exist.
    ///
    /// # Example
    /// ```no_run
    /// use store::{RedbStore, TableConfig};
    ///
    /// let store = RedbStore::open("/tmp/objects.redb", &TableConfig::default()).unwrap();
    /// ```
    pub fn open<P: AsRef<Path>>(path: P, table: &TableConfig) -> Result<Self, StoreError> {
        table.validate()?;
        let db = Database::create(path.as_ref())
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let store = Self {
            db: Arc::new(db),
            key_table: table.name.clone(),
            id_table: format!("{}_{}", table.name, table.id_column),
        };

        let write_txn = store
            .db
            .begin_write()
            .map_err(|e| StoreError::backend(e.to_string()))?;
        {
            // Opening a table in a write transaction creates it.
            let _keys = write_txn
                .open_table(store.key_def())
                .map_err(|e| StoreError::backend(e.to_string()))?;
            let _ids = write_txn
                .open_table(store.id_def())
                .map_err(|e| StoreError::backend(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| StoreError::backend(e.to_string()))?;

        debug!(
            path = %path.as_ref().display(),
            table = %store.key_table,
            "redb_store_opened"
        );
        Ok(store)
    }

    fn key_def(&self) -> TableDefinition<'_, &'static str, u64> {
        TableDefinition::new(&self.key_table)
    }

    fn id_def(&self) -> TableDefinition<'_, u64, &'static str> {
        TableDefinition::new(&self.id_table)
    }

    /// Identifier held for `key`, without inserting it.
    pub fn lookup(&self, key: &str) -> Result<Option<i64>, StoreError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| StoreError::backend(e.to_string()))?;
        let table = read_txn
            .open_table(self.key_def())
            .map_err(|e| StoreError::backend(e.to_string()))?;
        match table
            .get(key)
            .map_err(|e| StoreError::backend(e.to_string()))?
        {
            Some(id) => Ok(Some(to_row_id(id.value())?)),
            None => Ok(None),
        }
    }

    fn with_write<T>(
        &self,
        body: impl FnOnce(&mut Tables<'_>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| StoreError::backend(e.to_string()))?;
        let result = {
            let mut tables = Tables::open(&write_txn, self)?;
            body(&mut tables)?
        };
        // An early return above drops the transaction, which aborts it.
        write_txn
            .commit()
            .map_err(|e| StoreError::backend(e.to_string()))?;
        Ok(result)
    }
}

struct Tables<'txn> {
    keys: Table<'txn, &'static str, u64>,
    ids: Table<'txn, u64, &'static str>,
}

impl<'txn> Tables<'txn> {
    fn open(txn: &'txn WriteTransaction, store: &RedbStore) -> Result<Self, StoreError> {
        let keys = txn
            .open_table(store.key_def())
            .map_err(|e| StoreError::backend(e.to_string()))?;
        let ids = txn
            .open_table(store.id_def())
            .map_err(|e| StoreError::backend(e.to_string()))?;
        Ok(Self { keys, ids })
    }

    fn insert_or_fetch(&mut self, key: &str) -> Result<i64, StoreError> {
        let existing = self
            .keys
            .get(key)
            .map_err(|e| StoreError::backend(e.to_string()))?
            .map(|id| id.value());
        if let Some(id) = existing {
            return to_row_id(id);
        }

        let last = self
            .ids
            .last()
            .map_err(|e| StoreError::backend(e.to_string()))?
            .map(|(id, _)| id.value())
            .unwrap_or(0);
        let id = last
            .checked_add(1)
            .ok_or_else(|| StoreError::backend("identifier space exhausted"))?;

        self.keys
            .insert(key, id)
            .map_err(|e| StoreError::backend(e.to_string()))?;
        self.ids
            .insert(id, key)
            .map_err(|e| StoreError::backend(e.to_string()))?;
        to_row_id(id)
    }
}

fn to_row_id(id: u64) -> Result<i64, StoreError> {
    i64::try_from(id).map_err(|_| StoreError::Malformed(format!("stored id {id} out of range")))
}

impl StoreGateway for RedbStore {
    fn insert_or_fetch(&self, key: &CanonicalKey) -> Result<Vec<i64>, StoreError> {
        self.with_write(|tables| Ok(vec![tables.insert_or_fetch(key.as_str())?]))
    }

    fn insert_or_fetch_batch(&self, keys: &[CanonicalKey]) -> Result<Vec<KeyedRow>, StoreError> {
        self.with_write(|tables| {
            let mut seen = HashSet::with_capacity(keys.len());
            let mut rows = Vec::with_capacity(keys.len());
            for key in keys {
                if seen.insert(key.as_str()) {
                    let id = tables.insert_or_fetch(key.as_str())?;
                    rows.push(KeyedRow::new(key.as_str(), id));
                }
            }
            Ok(rows)
        })
    }
}
