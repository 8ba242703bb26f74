use std::num::NonZeroUsize;
use std::time::Instant;

use canonical::ToCanonical;
use store::{ObjectId, StoreGateway};
use tracing::Level;

use crate::cache::LookupCache;
use crate::config::RegisterConfig;
use crate::engine::Resolver;
use crate::error::RegisterError;

/// Blocking JSON registry.
///
/// Maps documents to stable identifiers through a bounded cache in front of
/// a [`StoreGateway`]. Shareable across threads behind an `Arc`; the cache is
/// internally synchronized and the store resolves races on its own.
///
/// ```
/// use json_register::{InMemoryStore, Registry};
/// use serde_json::json;
///
/// let registry = Registry::new(InMemoryStore::new(), 100).unwrap();
/// let a = registry.register(&json!({"b": 2, "a": 1})).unwrap();
/// let b = registry.register(&json!({"a": 1, "b": 2})).unwrap();
/// assert_eq!(a, b);
/// ```
pub struct Registry<S = Box<dyn StoreGateway>> {
    engine: Resolver,
    store: S,
}

impl Registry {
    /// Builds the store and cache described by `config`.
    ///
    /// Configuration problems are reported before the store is opened.
    pub fn open(config: &RegisterConfig) -> Result<Self, RegisterError> {
        config.validate()?;
        let capacity = config.cache_capacity()?;
        let store = config.backend_config()?.build(&config.table)?;
        Ok(Self::with_capacity(store, capacity))
    }
}

impl<S: StoreGateway> Registry<S> {
    /// Wraps an existing store. `capacity` must be at least one.
    pub fn new(store: S, capacity: usize) -> Result<Self, RegisterError> {
        let capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
            RegisterError::Configuration("cache capacity must be at least 1".into())
        })?;
        Ok(Self::with_capacity(store, capacity))
    }

    pub fn with_capacity(store: S, capacity: NonZeroUsize) -> Self {
        Self {
            engine: Resolver::new(capacity),
            store,
        }
    }

    /// Registers one document and returns its identifier.
    ///
    /// A cached document costs no store access. Otherwise the store is asked
    /// once to insert-or-fetch the canonical key and the answer is cached.
    pub fn register<D: ToCanonical + ?Sized>(&self, document: &D) -> Result<ObjectId, RegisterError> {
        let start = Instant::now();
        let key = self.engine.canonicalise(document, start)?;
        if let Some(id) = self.engine.cached(&key) {
            return Ok(id);
        }

        let span = tracing::span!(Level::INFO, "register.single", key_digest = %key.digest());
        let _guard = span.enter();
        let response = self.store.insert_or_fetch(&key);
        self.engine.finish_single(key, response, start)
    }

    /// Registers many documents; `result[i]` belongs to `documents[i]`.
    ///
    /// Either every document is answered from the cache, or the whole batch
    /// goes to the store in one call and the store's answer is used for every
    /// position. Nothing is cached unless the whole batch succeeds.
    pub fn register_batch<D: ToCanonical>(
        &self,
        documents: &[D],
    ) -> Result<Vec<ObjectId>, RegisterError> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        let start = Instant::now();
        let keys = self.engine.canonicalise_batch(documents, start)?;
        if let Some(ids) = self.engine.cached_batch(&keys) {
            return Ok(ids);
        }

        let span = tracing::span!(Level::INFO, "register.batch", batch_len = keys.len());
        let _guard = span.enter();
        let response = self.store.insert_or_fetch_batch(&keys);
        self.engine.finish_batch(keys, response, start)
    }

    pub fn cache(&self) -> &LookupCache {
        self.engine.cache()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }
}

impl<S> std::fmt::Debug for Registry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("cache", self.engine.cache())
            .finish_non_exhaustive()
    }
}
