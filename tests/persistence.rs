//! Identifiers survive a restart when the store is persistent.

#![cfg(any(feature = "sqlite", feature = "redb"))]

mod common;

use std::fs;
use std::path::Path;

use common::doc;
use json_register::{RawJson, RegisterConfig, RegisterError, Registry};

fn write_config(dir: &Path, backend: &str, db: &str) -> RegisterConfig {
    let path = dir.join("register.yaml");
    let yaml = format!(
        "version: \"1.0\"\n\
         name: persistence\n\
         cache:\n  capacity: 4\n\
         table:\n  name: documents\n  id_column: doc_id\n  json_column: body\n\
         store:\n  backend: {backend}\n  path: {}\n  pool_size: 2\n",
        dir.join(db).display()
    );
    fs::write(&path, yaml).unwrap();
    RegisterConfig::from_file(&path).unwrap()
}

fn register_then_reopen(config: &RegisterConfig) {
    let first = {
        let registry = Registry::open(config).unwrap();
        let mut ids = registry.register_batch(&[doc(1), doc(2), doc(3)]).unwrap();
        ids.push(registry.register(&doc(4)).unwrap());
        ids
    };

    let registry = Registry::open(config).unwrap();
    assert!(registry.cache().is_empty());

    let again = registry
        .register_batch(&[doc(1), doc(2), doc(3), doc(4)])
        .unwrap();
    assert_eq!(again, first);

    let fresh = registry.register(&doc(5)).unwrap();
    assert!(first.iter().all(|id| *id != fresh));
    assert!(first.iter().all(|id| id.get() < fresh.get()), "ids only grow");
}

#[cfg(feature = "sqlite")]
#[test]
fn sqlite_ids_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "sqlite", "objects.sqlite3");
    config
        .backend_config()
        .unwrap()
        .create_schema(&config.table)
        .unwrap();
    register_then_reopen(&config);
}

#[cfg(feature = "sqlite")]
#[test]
fn sqlite_without_schema_is_a_connection_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "sqlite", "empty.sqlite3");
    let registry = Registry::open(&config).unwrap();
    assert!(matches!(
        registry.register(&RawJson("{}")),
        Err(RegisterError::Connection(_))
    ));
}

#[cfg(feature = "sqlite")]
#[test]
fn schema_creation_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "sqlite", "objects.sqlite3");
    let backend = config.backend_config().unwrap();
    backend.create_schema(&config.table).unwrap();

    let id = Registry::open(&config).unwrap().register(&doc(9)).unwrap();
    backend.create_schema(&config.table).unwrap();
    assert_eq!(Registry::open(&config).unwrap().register(&doc(9)).unwrap(), id);
}

#[cfg(feature = "redb")]
#[test]
fn redb_ids_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "redb", "objects.redb");
    register_then_reopen(&config);
}
