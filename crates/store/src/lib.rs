//! # Store gateway
//!
//! The persistent half of JSON registration: a uniqueness-constrained,
//! append-only table mapping canonical JSON keys to integer identifiers,
//! reached through two idempotent operations.
//!
//! ## Core Features
//!
//! - **Insert-or-fetch**: [`StoreGateway::insert_or_fetch`] inserts a key if
//!   absent, otherwise returns the identifier already assigned to it. The
//!   decision is made inside the store in one statement or one write
//!   transaction, so concurrent callers racing on the same key always agree.
//! - **Batch insert-or-fetch**: [`StoreGateway::insert_or_fetch_batch`] does
//!   the same for many keys in one transaction and answers with one
//!   [`KeyedRow`] per distinct key.
//! - **Pluggable Backends** selected at runtime through [`BackendConfig`]:
//!   - an in-memory map for tests and ephemeral use;
//!   - redb, a pure Rust embedded database (`backend-redb` feature);
//!   - SQLite through rusqlite with a bounded connection pool
//!     (`backend-sqlite` feature).
//! - **Async callers**: [`AsyncStoreGateway`] is the async counterpart and
//!   [`BlockingGateway`] adapts any blocking gateway to it.
//!
//! Gateways return the raw rows they produced. Checking that a response is
//! well formed (exactly one row, every key answered, positive identifiers) is
//! the caller's job.
//!
//! ## Example Usage
//!
//! ```
//! use store::{BackendConfig, StoreGateway, TableConfig};
//! use serde_json::json;
//!
//! let store = BackendConfig::in_memory().build(&TableConfig::default()).unwrap();
//! let key = canonical::canonicalise(&json!({"b": 2, "a": 1}));
//!
//! let first = store.insert_or_fetch(&key).unwrap();
//! let again = store.insert_or_fetch(&key).unwrap();
//! assert_eq!(first, again);
//! assert_eq!(first.len(), 1);
//! ```

mod backend;
mod gateway;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use canonical::CanonicalKey;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(feature = "backend-redb")]
pub use backend::RedbStore;
#[cfg(feature = "backend-sqlite")]
pub use backend::SqliteStore;
pub use backend::{BackendConfig, InMemoryStore, SqliteConfig};
pub use gateway::{AsyncStoreGateway, BlockingGateway};

/// Default table holding registered documents.
pub const DEFAULT_TABLE_NAME: &str = "json_objects";
/// Default identifier column.
pub const DEFAULT_ID_COLUMN: &str = "id";
/// Default column holding the canonical JSON text.
pub const DEFAULT_JSON_COLUMN: &str = "json_object";

/// Errors raised by store gateways.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid store configuration: {0}")]
    InvalidConfig(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("timed out after {0:?} waiting for a store connection")]
    Timeout(Duration),
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("malformed store response: {0}")]
    Malformed(String),
}

impl StoreError {
    pub fn backend<E: fmt::Display>(err: E) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Identifier assigned to a canonical key on first insertion.
///
/// Always positive, never reused, never changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(u64);

impl ObjectId {
    /// Returns `None` for zero.
    pub fn new(id: u64) -> Option<Self> {
        (id > 0).then_some(ObjectId(id))
    }

    /// Converts an identifier column value, rejecting zero and negatives.
    pub fn from_row(id: i64) -> Option<Self> {
        u64::try_from(id).ok().and_then(Self::new)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<ObjectId> for u64 {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}

/// One row of a batch response: a canonical key and the identifier the store
/// holds for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyedRow {
    pub key: String,
    pub id: i64,
}

impl KeyedRow {
    pub fn new(key: impl Into<String>, id: i64) -> Self {
        Self {
            key: key.into(),
            id,
        }
    }
}

/// Names of the table and columns backing a store.
///
/// Names are interpolated into SQL (quoted) and into redb table names, so
/// they are restricted to non-empty ASCII alphanumerics and underscores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    #[serde(default = "default_table_name")]
    pub name: String,
    #[serde(default = "default_id_column")]
    pub id_column: String,
    #[serde(default = "default_json_column")]
    pub json_column: String,
}

fn default_table_name() -> String {
    DEFAULT_TABLE_NAME.to_string()
}

fn default_id_column() -> String {
    DEFAULT_ID_COLUMN.to_string()
}

fn default_json_column() -> String {
    DEFAULT_JSON_COLUMN.to_string()
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            name: default_table_name(),
            id_column: default_id_column(),
            json_column: default_json_column(),
        }
    }
}

impl TableConfig {
    pub fn new(
        name: impl Into<String>,
        id_column: impl Into<String>,
        json_column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            id_column: id_column.into(),
            json_column: json_column.into(),
        }
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        for (field, value) in [
            ("table name", &self.name),
            ("id column", &self.id_column),
            ("json column", &self.json_column),
        ] {
            if !is_valid_identifier(value) {
                return Err(StoreError::InvalidConfig(format!(
                    "{field} {value:?} must be non-empty ASCII letters, digits or underscores"
                )));
            }
        }
        if self.id_column == self.json_column {
            return Err(StoreError::InvalidConfig(format!(
                "id column and json column must differ (both {:?})",
                self.id_column
            )));
        }
        Ok(())
    }
}

/// True when `name` is safe to use as a table or column identifier.
pub fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Blocking insert-or-fetch access to a store.
pub trait StoreGateway: Send + Sync {
    /// Insert `key` if absent, otherwise fetch it. Returns the identifier rows
    /// the store produced, normally exactly one.
    fn insert_or_fetch(&self, key: &CanonicalKey) -> Result<Vec<i64>, StoreError>;

    /// Insert every absent key and fetch all of them in one transaction.
    /// Returns one row per distinct key, in no particular order.
    fn insert_or_fetch_batch(&self, keys: &[CanonicalKey]) -> Result<Vec<KeyedRow>, StoreError>;
}

impl<S: StoreGateway + ?Sized> StoreGateway for Box<S> {
    fn insert_or_fetch(&self, key: &CanonicalKey) -> Result<Vec<i64>, StoreError> {
        (**self).insert_or_fetch(key)
    }

    fn insert_or_fetch_batch(&self, keys: &[CanonicalKey]) -> Result<Vec<KeyedRow>, StoreError> {
        (**self).insert_or_fetch_batch(keys)
    }
}

impl<S: StoreGateway + ?Sized> StoreGateway for Arc<S> {
    fn insert_or_fetch(&self, key: &CanonicalKey) -> Result<Vec<i64>, StoreError> {
        (**self).insert_or_fetch(key)
    }

    fn insert_or_fetch_batch(&self, keys: &[CanonicalKey]) -> Result<Vec<KeyedRow>, StoreError> {
        (**self).insert_or_fetch_batch(keys)
    }
}
