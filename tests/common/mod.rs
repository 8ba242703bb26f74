//! Shared test doubles for registry integration tests.

#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use json_register::{
    AsyncStoreGateway, CanonicalKey, InMemoryStore, KeyedRow, StoreError, StoreGateway,
};
use serde_json::{Value, json};

/// Failure injected into the next store calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    None,
    Unavailable,
    Timeout,
    /// Single calls answer with no rows.
    EmptyRows,
    /// Single calls answer with two rows.
    ExtraRow,
    /// Batch calls leave out the last row.
    DropLastRow,
    /// Batch calls add a row for a key nobody asked for.
    ForeignKey,
    /// Every returned id is negated.
    NegativeId,
    Malformed,
}

/// In-memory store that counts calls and can be told to misbehave.
///
/// Faulty calls never reach the inner store, so a failed call changes
/// nothing persistent.
pub struct CountingStore {
    inner: InMemoryStore,
    singles: AtomicUsize,
    batches: AtomicUsize,
    fault: Mutex<Fault>,
}

impl CountingStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryStore::new(),
            singles: AtomicUsize::new(0),
            batches: AtomicUsize::new(0),
            fault: Mutex::new(Fault::None),
        }
    }

    pub fn singles(&self) -> usize {
        self.singles.load(Ordering::SeqCst)
    }

    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.singles() + self.batches()
    }

    pub fn stored(&self) -> usize {
        self.inner.len()
    }

    pub fn set_fault(&self, fault: Fault) {
        *self.fault.lock().unwrap() = fault;
    }

    fn fault(&self) -> Fault {
        *self.fault.lock().unwrap()
    }

    fn transport_fault(&self) -> Result<(), StoreError> {
        match self.fault() {
            Fault::Unavailable => Err(StoreError::Unavailable("injected outage".into())),
            Fault::Timeout => Err(StoreError::Timeout(Duration::from_millis(10))),
            Fault::Malformed => Err(StoreError::Malformed("injected garbage".into())),
            _ => Ok(()),
        }
    }
}

impl Default for CountingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreGateway for CountingStore {
    fn insert_or_fetch(&self, key: &CanonicalKey) -> Result<Vec<i64>, StoreError> {
        self.singles.fetch_add(1, Ordering::SeqCst);
        self.transport_fault()?;
        match self.fault() {
            Fault::EmptyRows => Ok(Vec::new()),
            Fault::ExtraRow => {
                let mut rows = self.inner.insert_or_fetch(key)?;
                rows.push(rows[0]);
                Ok(rows)
            }
            Fault::NegativeId => Ok(vec![-1]),
            _ => self.inner.insert_or_fetch(key),
        }
    }

    fn insert_or_fetch_batch(&self, keys: &[CanonicalKey]) -> Result<Vec<KeyedRow>, StoreError> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        self.transport_fault()?;
        match self.fault() {
            Fault::DropLastRow => {
                let mut rows = self.inner.insert_or_fetch_batch(keys)?;
                rows.pop();
                Ok(rows)
            }
            Fault::ForeignKey => {
                let mut rows = self.inner.insert_or_fetch_batch(keys)?;
                rows.push(KeyedRow::new("\"nobody asked\"", 999));
                Ok(rows)
            }
            Fault::NegativeId => Ok(keys
                .iter()
                .map(|key| KeyedRow::new(key.as_str(), -5))
                .collect()),
            _ => self.inner.insert_or_fetch_batch(keys),
        }
    }
}

#[async_trait]
impl AsyncStoreGateway for CountingStore {
    async fn insert_or_fetch(&self, key: &CanonicalKey) -> Result<Vec<i64>, StoreError> {
        StoreGateway::insert_or_fetch(self, key)
    }

    async fn insert_or_fetch_batch(
        &self,
        keys: &[CanonicalKey],
    ) -> Result<Vec<KeyedRow>, StoreError> {
        StoreGateway::insert_or_fetch_batch(self, keys)
    }
}

/// A small document, distinct for every `n`.
pub fn doc(n: u64) -> Value {
    json!({ "id": n, "name": format!("doc-{n}"), "tags": ["a", "b"] })
}
