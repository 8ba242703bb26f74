use crate::{KeyedRow, StoreError, StoreGateway, TableConfig};
use canonical::CanonicalKey;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::RwLock;
use std::time::Duration;

/// Default number of pooled SQLite connections.
pub const DEFAULT_POOL_SIZE: usize = 10;
/// Default wait for a free pooled connection.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);
/// Default SQLite busy timeout.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for selecting and building a backend.
///
/// # Example
/// ```
/// use store::{BackendConfig, SqliteConfig};
///
/// // In-memory (for testing)
/// let config = BackendConfig::in_memory();
///
/// // Redb (pure Rust, no external libraries)
/// let config = BackendConfig::redb("/data/objects.redb");
///
/// // SQLite with a pool of four connections
/// let config = BackendConfig::sqlite(SqliteConfig::new("/data/objects.sqlite3").with_pool_size(4));
/// ```
#[derive(Clone, Debug, Default)]
pub enum BackendConfig {
    /// Use an in-memory map. Nothing survives the process.
    #[default]
    InMemory,
    /// Use Redb for storage. The `path` is the file path for the database.
    ///
    /// Requires the `backend-redb` feature.
    Redb { path: PathBuf },
    /// Use SQLite through a pool of connections.
    ///
    /// Requires the `backend-sqlite` feature.
    Sqlite(SqliteConfig),
}

impl BackendConfig {
    pub fn in_memory() -> Self {
        BackendConfig::InMemory
    }

    pub fn redb<P: Into<PathBuf>>(path: P) -> Self {
        BackendConfig::Redb { path: path.into() }
    }

    pub fn sqlite(config: SqliteConfig) -> Self {
        BackendConfig::Sqlite(config)
    }

    /// Short backend name, as used in configuration files and logs.
    pub fn name(&self) -> &'static str {
        match self {
            BackendConfig::InMemory => "in_memory",
            BackendConfig::Redb { .. } => "redb",
            BackendConfig::Sqlite(_) => "sqlite",
        }
    }

    /// Build the backend for `table`.
    ///
    /// The table configuration is validated first. A persistent backend whose
    /// feature is disabled fails with [`StoreError::InvalidConfig`].
    pub fn build(&self, table: &TableConfig) -> Result<Box<dyn StoreGateway>, StoreError> {
        table.validate()?;
        match self {
            BackendConfig::InMemory => Ok(Box::new(InMemoryStore::new())),
            BackendConfig::Redb { path } => {
                #[cfg(feature = "backend-redb")]
                {
                    Ok(Box::new(RedbStore::open(path, table)?))
                }
                #[cfg(not(feature = "backend-redb"))]
                {
                    let _ = path;
                    Err(StoreError::InvalidConfig(
                        "redb backend disabled at compile time".into(),
                    ))
                }
            }
            BackendConfig::Sqlite(config) => {
                #[cfg(feature = "backend-sqlite")]
                {
                    Ok(Box::new(SqliteStore::open(config, table)?))
                }
                #[cfg(not(feature = "backend-sqlite"))]
                {
                    let _ = config;
                    Err(StoreError::InvalidConfig(
                        "sqlite backend disabled at compile time".into(),
                    ))
                }
            }
        }
    }

    /// Make sure the backing table exists.
    ///
    /// Registration never creates tables on its own; this is for tooling and
    /// tests. Redb creates its tables when opened and the in-memory backend
    /// has none, so only SQLite does any work here.
    pub fn create_schema(&self, table: &TableConfig) -> Result<(), StoreError> {
        table.validate()?;
        match self {
            BackendConfig::InMemory | BackendConfig::Redb { .. } => Ok(()),
            BackendConfig::Sqlite(config) => {
                #[cfg(feature = "backend-sqlite")]
                {
                    let single = config.clone().with_pool_size(1);
                    SqliteStore::open(&single, table)?.create_schema()
                }
                #[cfg(not(feature = "backend-sqlite"))]
                {
                    let _ = config;
                    Err(StoreError::InvalidConfig(
                        "sqlite backend disabled at compile time".into(),
                    ))
                }
            }
        }
    }
}

/// Settings for the SQLite backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SqliteConfig {
    pub path: PathBuf,
    /// Number of connections opened up front. At least one.
    pub pool_size: usize,
    /// How long a call waits for a free connection before failing.
    pub acquire_timeout: Duration,
    /// How long SQLite waits on a locked database before failing.
    pub busy_timeout: Duration,
}

impl SqliteConfig {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            pool_size: DEFAULT_POOL_SIZE,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        if self.pool_size == 0 {
            return Err(StoreError::InvalidConfig(
                "sqlite pool_size must be at least 1".into(),
            ));
        }
        if self.acquire_timeout.is_zero() || self.busy_timeout.is_zero() {
            return Err(StoreError::InvalidConfig(
                "sqlite timeouts must be at least 1ms".into(),
            ));
        }
        if self.path.as_os_str().is_empty() {
            return Err(StoreError::InvalidConfig("sqlite path is empty".into()));
        }
        Ok(())
    }
}

struct InMemoryState {
    ids: HashMap<String, i64>,
    last_id: i64,
}

impl InMemoryState {
    fn insert_or_fetch(&mut self, key: &str) -> i64 {
        if let Some(id) = self.ids.get(key) {
            return *id;
        }
        self.last_id += 1;
        self.ids.insert(key.to_string(), self.last_id);
        self.last_id
    }
}

/// An in-memory backend using a `RwLock` around a `HashMap`.
pub struct InMemoryStore {
    state: RwLock<InMemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(InMemoryState {
                ids: HashMap::new(),
                last_id: 0,
            }),
        }
    }

    /// Number of distinct keys stored.
    pub fn len(&self) -> usize {
        self.state
            .read()
            .map(|state| state.ids.len())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Identifier held for `key`, without inserting it.
    pub fn lookup(&self, key: &str) -> Result<Option<i64>, StoreError> {
        let guard = self
            .state
            .read()
            .map_err(|_| StoreError::backend("poisoned lock"))?;
        Ok(guard.ids.get(key).copied())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreGateway for InMemoryStore {
    fn insert_or_fetch(&self, key: &CanonicalKey) -> Result<Vec<i64>, StoreError> {
        let mut guard = self
            .state
            .write()
            .map_err(|_| StoreError::backend("poisoned lock"))?;
        Ok(vec![guard.insert_or_fetch(key.as_str())])
    }

    fn insert_or_fetch_batch(&self, keys: &[CanonicalKey]) -> Result<Vec<KeyedRow>, StoreError> {
        // A single write lock is held for the entire batch.
        let mut guard = self
            .state
            .write()
            .map_err(|_| StoreError::backend("poisoned lock"))?;
        let mut seen = HashSet::with_capacity(keys.len());
        let mut rows = Vec::with_capacity(keys.len());
        for key in keys {
            if seen.insert(key.as_str()) {
                let id = guard.insert_or_fetch(key.as_str());
                rows.push(KeyedRow::new(key.as_str(), id));
            }
        }
        Ok(rows)
    }
}

/// The Redb backend implementation.
#[cfg(feature = "backend-redb")]
pub mod redb;

#[cfg(feature = "backend-redb")]
pub use redb::RedbStore;

/// The SQLite backend implementation.
#[cfg(feature = "backend-sqlite")]
pub mod sqlite;

#[cfg(feature = "backend-sqlite")]
pub use sqlite::SqliteStore;
