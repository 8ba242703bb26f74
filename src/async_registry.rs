use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;

use canonical::ToCanonical;
use store::{AsyncStoreGateway, BlockingGateway, ObjectId};
use tracing::Instrument;

use crate::cache::LookupCache;
use crate::config::RegisterConfig;
use crate::engine::Resolver;
use crate::error::RegisterError;

struct Shared<S> {
    engine: Resolver,
    store: S,
}

/// Async JSON registry.
///
/// Same semantics as [`Registry`](crate::Registry), written against an
/// [`AsyncStoreGateway`]. Cache hits complete without suspending; only the
/// store round trip awaits. Cloning is cheap and clones share one cache and
/// one store.
///
/// ```
/// use json_register::{AsyncRegistry, BlockingGateway, InMemoryStore};
/// use serde_json::json;
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let registry = AsyncRegistry::new(BlockingGateway::new(InMemoryStore::new()), 100).unwrap();
/// let id = registry.register(&json!({"a": 1})).await.unwrap();
/// assert_eq!(registry.register(&json!({"a": 1.0})).await.unwrap(), id);
/// # });
/// ```
pub struct AsyncRegistry<S = Box<dyn AsyncStoreGateway>> {
    shared: Arc<Shared<S>>,
}

impl<S> Clone for AsyncRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl AsyncRegistry {
    /// Builds the store and cache described by `config`. Blocking backends
    /// run on tokio's blocking pool.
    pub fn open(config: &RegisterConfig) -> Result<Self, RegisterError> {
        config.validate()?;
        let capacity = config.cache_capacity()?;
        let store: Arc<dyn store::StoreGateway> =
            Arc::from(config.backend_config()?.build(&config.table)?);
        let gateway: Box<dyn AsyncStoreGateway> = Box::new(BlockingGateway::from_shared(store));
        Ok(Self::with_capacity(gateway, capacity))
    }
}

impl<S: AsyncStoreGateway> AsyncRegistry<S> {
    /// Wraps an existing store. `capacity` must be at least one.
    pub fn new(store: S, capacity: usize) -> Result<Self, RegisterError> {
        let capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
            RegisterError::Configuration("cache capacity must be at least 1".into())
        })?;
        Ok(Self::with_capacity(store, capacity))
    }

    pub fn with_capacity(store: S, capacity: NonZeroUsize) -> Self {
        Self {
            shared: Arc::new(Shared {
                engine: Resolver::new(capacity),
                store,
            }),
        }
    }

    /// Registers one document and returns its identifier.
    pub async fn register<D: ToCanonical + ?Sized>(
        &self,
        document: &D,
    ) -> Result<ObjectId, RegisterError> {
        let start = Instant::now();
        let engine = &self.shared.engine;
        let key = engine.canonicalise(document, start)?;
        if let Some(id) = engine.cached(&key) {
            return Ok(id);
        }

        let span = tracing::info_span!("register.single", key_digest = %key.digest());
        let response = self
            .shared
            .store
            .insert_or_fetch(&key)
            .instrument(span.clone())
            .await;
        let _guard = span.enter();
        engine.finish_single(key, response, start)
    }

    /// Registers many documents; `result[i]` belongs to `documents[i]`.
    pub async fn register_batch<D: ToCanonical>(
        &self,
        documents: &[D],
    ) -> Result<Vec<ObjectId>, RegisterError> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        let start = Instant::now();
        let engine = &self.shared.engine;
        let keys = engine.canonicalise_batch(documents, start)?;
        if let Some(ids) = engine.cached_batch(&keys) {
            return Ok(ids);
        }

        let span = tracing::info_span!("register.batch", batch_len = keys.len());
        let response = self
            .shared
            .store
            .insert_or_fetch_batch(&keys)
            .instrument(span.clone())
            .await;
        let _guard = span.enter();
        engine.finish_batch(keys, response, start)
    }

    pub fn cache(&self) -> &LookupCache {
        self.shared.engine.cache()
    }

    pub fn store(&self) -> &S {
        &self.shared.store
    }
}
