use crate::backend::SqliteConfig;
use crate::StoreError;
use rusqlite::{Connection, OpenFlags};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};
use tracing::warn;

/// Fixed-size pool of SQLite connections.
///
/// Connections are opened up front. A caller checks one out through
/// [`PooledConnection`], which hands it back when dropped, including while
/// unwinding.
pub(crate) struct ConnectionPool {
    idle: Mutex<Vec<Connection>>,
    available: Condvar,
    size: usize,
    acquire_timeout: Duration,
}

impl ConnectionPool {
    pub(crate) fn open(config: &SqliteConfig) -> Result<Self, StoreError> {
        config.validate()?;
        let mut idle = Vec::with_capacity(config.pool_size);
        for _ in 0..config.pool_size {
            idle.push(open_connection(config)?);
        }
        Ok(Self {
            idle: Mutex::new(idle),
            available: Condvar::new(),
            size: config.pool_size,
            acquire_timeout: config.acquire_timeout,
        })
    }

    pub(crate) fn size(&self) -> usize {
        self.size
    }

    pub(crate) fn idle(&self) -> usize {
        self.idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Waits up to the acquire timeout for a free connection.
    pub(crate) fn acquire(&self) -> Result<PooledConnection<'_>, StoreError> {
        let deadline = Instant::now() + self.acquire_timeout;
        let mut idle = self
            .idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        loop {
            if let Some(conn) = idle.pop() {
                return Ok(PooledConnection {
                    pool: self,
                    conn: Some(conn),
                });
            }
            let now = Instant::now();
            if now >= deadline {
                warn!(
                    pool_size = self.size,
                    timeout_ms = self.acquire_timeout.as_millis() as u64,
                    "sqlite_pool_exhausted"
                );
                return Err(StoreError::Timeout(self.acquire_timeout));
            }
            let (guard, _) = self
                .available
                .wait_timeout(idle, deadline - now)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            idle = guard;
        }
    }

    fn release(&self, conn: Connection) {
        self.idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(conn);
        self.available.notify_one();
    }
}

/// A connection checked out of a [`ConnectionPool`].
pub(crate) struct PooledConnection<'a> {
    pool: &'a ConnectionPool,
    conn: Option<Connection>,
}

impl PooledConnection<'_> {
    pub(crate) fn connection(&mut self) -> Result<&mut Connection, StoreError> {
        self.conn
            .as_mut()
            .ok_or_else(|| StoreError::Unavailable("connection already released".into()))
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}

/// Opens one connection with WAL journaling and the configured busy timeout.
fn open_connection(config: &SqliteConfig) -> Result<Connection, StoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let conn = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| StoreError::Unavailable(err.to_string()))?;
    conn.execute_batch("PRAGMA journal_mode = WAL;")
        .map_err(|err| StoreError::Unavailable(err.to_string()))?;
    conn.busy_timeout(config.busy_timeout)
        .map_err(|err| StoreError::Unavailable(err.to_string()))?;
    Ok(conn)
}
