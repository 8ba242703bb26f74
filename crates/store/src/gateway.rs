use std::sync::Arc;

use async_trait::async_trait;
use canonical::CanonicalKey;

use crate::{KeyedRow, StoreError, StoreGateway};

/// Async insert-or-fetch access to a store.
///
/// Same contract as [`StoreGateway`]. Implementations should suspend rather
/// than block while waiting on the store.
#[async_trait]
pub trait AsyncStoreGateway: Send + Sync {
    async fn insert_or_fetch(&self, key: &CanonicalKey) -> Result<Vec<i64>, StoreError>;

    async fn insert_or_fetch_batch(
        &self,
        keys: &[CanonicalKey],
    ) -> Result<Vec<KeyedRow>, StoreError>;
}

#[async_trait]
impl<S: AsyncStoreGateway + ?Sized> AsyncStoreGateway for Box<S> {
    async fn insert_or_fetch(&self, key: &CanonicalKey) -> Result<Vec<i64>, StoreError> {
        (**self).insert_or_fetch(key).await
    }

    async fn insert_or_fetch_batch(
        &self,
        keys: &[CanonicalKey],
    ) -> Result<Vec<KeyedRow>, StoreError> {
        (**self).insert_or_fetch_batch(keys).await
    }
}

#[async_trait]
impl<S: AsyncStoreGateway + ?Sized> AsyncStoreGateway for Arc<S> {
    async fn insert_or_fetch(&self, key: &CanonicalKey) -> Result<Vec<i64>, StoreError> {
        (**self).insert_or_fetch(key).await
    }

    async fn insert_or_fetch_batch(
        &self,
        keys: &[CanonicalKey],
    ) -> Result<Vec<KeyedRow>, StoreError> {
        (**self).insert_or_fetch_batch(keys).await
    }
}

/// Runs a blocking [`StoreGateway`] on tokio's blocking thread pool.
///
/// Must be used from within a tokio runtime.
pub struct BlockingGateway<S: ?Sized> {
    inner: Arc<S>,
}

impl<S: StoreGateway + 'static> BlockingGateway<S> {
    pub fn new(store: S) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }
}

impl<S: StoreGateway + ?Sized + 'static> BlockingGateway<S> {
    pub fn from_shared(store: Arc<S>) -> Self {
        Self { inner: store }
    }

    pub fn inner(&self) -> &Arc<S> {
        &self.inner
    }
}

impl<S: ?Sized> Clone for BlockingGateway<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

fn join_error(err: tokio::task::JoinError) -> StoreError {
    StoreError::Backend(format!("blocking store task failed: {err}"))
}

#[async_trait]
impl<S: StoreGateway + ?Sized + 'static> AsyncStoreGateway for BlockingGateway<S> {
    async fn insert_or_fetch(&self, key: &CanonicalKey) -> Result<Vec<i64>, StoreError> {
        let store = Arc::clone(&self.inner);
        let key = key.clone();
        tokio::task::spawn_blocking(move || StoreGateway::insert_or_fetch(&*store, &key))
            .await
            .map_err(join_error)?
    }

    async fn insert_or_fetch_batch(
        &self,
        keys: &[CanonicalKey],
    ) -> Result<Vec<KeyedRow>, StoreError> {
        let store = Arc::clone(&self.inner);
        let keys = keys.to_vec();
        tokio::task::spawn_blocking(move || StoreGateway::insert_or_fetch_batch(&*store, &keys))
            .await
            .map_err(join_error)?
    }
}
