//! SQLite backend.
//!
//! The table holds an `INTEGER PRIMARY KEY AUTOINCREMENT` identifier column
//! and a `TEXT NOT NULL UNIQUE` column with the canonical JSON. Insert-or-fetch
//! is one statement:
//!
//! ```sql
//! INSERT INTO "json_objects" ("json_object") VALUES (?1)
//! ON CONFLICT ("json_object") DO UPDATE SET "json_object" = excluded."json_object"
//! RETURNING "id"
//! ```
//!
//! The no-op update makes the conflicting row visible to `RETURNING`, so both
//! the insert path and the fetch path answer with one row from one statement.
//! A batch runs the same statement per distinct key inside one
//! `BEGIN IMMEDIATE` transaction.
//!
//! The table must exist before registration starts. [`SqliteStore::create_schema`]
//! creates it for tooling and tests.

mod pool;

use crate::backend::SqliteConfig;
use crate::{KeyedRow, StoreError, StoreGateway, TableConfig};
use canonical::CanonicalKey;
use pool::ConnectionPool;
use rusqlite::{params, ErrorCode, TransactionBehavior};
use std::collections::HashSet;
use tracing::debug;

pub struct SqliteStore {
    pool: ConnectionPool,
    upsert_sql: String,
    schema_sql: String,
    table: TableConfig,
}

impl SqliteStore {
    /// Opens the connection pool. Does not touch the schema.
    pub fn open(config: &SqliteConfig, table: &TableConfig) -> Result<Self, StoreError> {
        table.validate()?;
        let pool = ConnectionPool::open(config)?;
        debug!(
            path = %config.path.display(),
            pool_size = config.pool_size,
            table = %table.name,
            "sqlite_store_opened"
        );
        Ok(Self {
            pool,
            upsert_sql: upsert_sql(table),
            schema_sql: schema_sql(table),
            table: table.clone(),
        })
    }

    /// Creates the table if it does not exist yet.
    pub fn create_schema(&self) -> Result<(), StoreError> {
        let mut pooled = self.pool.acquire()?;
        pooled
            .connection()?
            .execute_batch(&self.schema_sql)
            .map_err(map_sqlite_error)?;
        debug!(table = %self.table.name, "sqlite_schema_ready");
        Ok(())
    }

    /// Number of rows in the table.
    pub fn count(&self) -> Result<u64, StoreError> {
        let mut pooled = self.pool.acquire()?;
        let sql = format!("SELECT COUNT(*) FROM {}", quote(&self.table.name));
        let count: i64 = pooled
            .connection()?
            .query_row(&sql, [], |row| row.get(0))
            .map_err(map_sqlite_error)?;
        u64::try_from(count).map_err(|_| StoreError::Malformed(format!("negative count {count}")))
    }
}

impl StoreGateway for SqliteStore {
    fn insert_or_fetch(&self, key: &CanonicalKey) -> Result<Vec<i64>, StoreError> {
        let mut pooled = self.pool.acquire()?;
        let conn = pooled.connection()?;
        let mut stmt = conn
            .prepare_cached(&self.upsert_sql)
            .map_err(map_sqlite_error)?;
        let ids = stmt
            .query_map(params![key.as_str()], |row| row.get::<_, i64>(0))
            .map_err(map_sqlite_error)?
            .collect::<Result<Vec<i64>, _>>()
            .map_err(map_sqlite_error)?;
        Ok(ids)
    }

    fn insert_or_fetch_batch(&self, keys: &[CanonicalKey]) -> Result<Vec<KeyedRow>, StoreError> {
        let mut pooled = self.pool.acquire()?;
        let conn = pooled.connection()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(map_sqlite_error)?;

        let mut rows = Vec::with_capacity(keys.len());
        {
            let mut stmt = tx
                .prepare_cached(&self.upsert_sql)
                .map_err(map_sqlite_error)?;
            let mut seen = HashSet::with_capacity(keys.len());
            for key in keys {
                if !seen.insert(key.as_str()) {
                    continue;
                }
                // Any error here drops `tx`, which rolls the whole batch back.
                let id: i64 = stmt
                    .query_row(params![key.as_str()], |row| row.get(0))
                    .map_err(map_sqlite_error)?;
                rows.push(KeyedRow::new(key.as_str(), id));
            }
        }

        tx.commit().map_err(map_sqlite_error)?;
        Ok(rows)
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{identifier}\"")
}

fn upsert_sql(table: &TableConfig) -> String {
    let name = quote(&table.name);
    let id = quote(&table.id_column);
    let json = quote(&table.json_column);
    format!(
        "INSERT INTO {name} ({json}) VALUES (?1) \
         ON CONFLICT ({json}) DO UPDATE SET {json} = excluded.{json} \
         RETURNING {id}"
    )
}

fn schema_sql(table: &TableConfig) -> String {
    let name = quote(&table.name);
    let id = quote(&table.id_column);
    let json = quote(&table.json_column);
    format!(
        "CREATE TABLE IF NOT EXISTS {name} (\
         {id} INTEGER PRIMARY KEY AUTOINCREMENT, \
         {json} TEXT NOT NULL UNIQUE);"
    )
}

fn map_sqlite_error(err: rusqlite::Error) -> StoreError {
    let message = err.to_string();
    match err {
        rusqlite::Error::SqliteFailure(failure, _)
            if matches!(
                failure.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::CannotOpen
            ) =>
        {
            StoreError::Unavailable(message)
        }
        rusqlite::Error::InvalidColumnType(..) | rusqlite::Error::IntegralValueOutOfRange(..) => {
            StoreError::Malformed(message)
        }
        _ => StoreError::Backend(message),
    }
}
