//! Stable integer identifiers for JSON documents.
//!
//! A registry maps every JSON document to a positive integer such that
//! documents equal as JSON values (object member order ignored, numbers
//! compared by value) share one identifier and different documents never do.
//!
//! The lookup path is:
//!
//! 1. canonicalise the document ([`canonical`]);
//! 2. consult a bounded LRU [`LookupCache`];
//! 3. on a miss, ask the store to insert-or-fetch the canonical key in one
//!    round trip ([`store::StoreGateway`]) and cache the answer.
//!
//! Batches either come entirely from the cache or go to the store entirely,
//! and always come back in input order.
//!
//! [`Registry`] is the blocking front end and [`AsyncRegistry`] the async one.
//! Both share one registration engine.

mod async_registry;
mod cache;
pub mod config;
mod engine;
mod error;
mod registry;

pub use crate::async_registry::AsyncRegistry;
pub use crate::cache::LookupCache;
pub use crate::config::{ConfigLoadError, RegisterConfig};
pub use crate::error::RegisterError;
pub use crate::registry::Registry;

pub use canonical::{CanonicalKey, CanonicalisationError, RawJson, ToCanonical};
pub use store::{
    AsyncStoreGateway, BackendConfig, BlockingGateway, InMemoryStore, KeyedRow, ObjectId,
    SqliteConfig, StoreError, StoreGateway, TableConfig,
};
#[cfg(feature = "redb")]
pub use store::RedbStore;
#[cfg(feature = "sqlite")]
pub use store::SqliteStore;
