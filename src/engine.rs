//! Registration logic shared by the sync and async front ends.
//!
//! Front ends own the store call; everything before it (canonicalisation,
//! cache policy) and after it (response checks, order reconstruction, cache
//! writes, logging) lives here so both behave identically.

use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::time::Instant;

use canonical::{CanonicalKey, ToCanonical};
use store::{KeyedRow, ObjectId, StoreError};
use tracing::{debug, info, warn};

use crate::cache::LookupCache;
use crate::error::RegisterError;

pub(crate) struct Resolver {
    cache: LookupCache,
}

impl Resolver {
    pub(crate) fn new(capacity: NonZeroUsize) -> Self {
        Self {
            cache: LookupCache::new(capacity),
        }
    }

    pub(crate) fn cache(&self) -> &LookupCache {
        &self.cache
    }

    pub(crate) fn canonicalise<D: ToCanonical + ?Sized>(
        &self,
        document: &D,
        start: Instant,
    ) -> Result<CanonicalKey, RegisterError> {
        document.to_canonical().map_err(|err| {
            let err = RegisterError::from(err);
            warn!(error = %err, elapsed_micros = start.elapsed().as_micros(), "register_failure");
            err
        })
    }

    /// Canonicalises every document, failing on the first one that cannot be.
    pub(crate) fn canonicalise_batch<D: ToCanonical>(
        &self,
        documents: &[D],
        start: Instant,
    ) -> Result<Vec<CanonicalKey>, RegisterError> {
        let mut keys = Vec::with_capacity(documents.len());
        for (index, document) in documents.iter().enumerate() {
            match document.to_canonical() {
                Ok(key) => keys.push(key),
                Err(err) => {
                    let err = RegisterError::from(err);
                    warn!(
                        error = %err,
                        document_index = index,
                        batch_len = documents.len(),
                        elapsed_micros = start.elapsed().as_micros(),
                        "register_batch_failure"
                    );
                    return Err(err);
                }
            }
        }
        Ok(keys)
    }

    pub(crate) fn cached(&self, key: &CanonicalKey) -> Option<ObjectId> {
        let id = self.cache.get(key.as_str())?;
        debug!(key_digest = %key.digest(), object_id = id.get(), "register_cache_hit");
        Some(id)
    }

    /// All identifiers when every key is cached, otherwise `None`.
    pub(crate) fn cached_batch(&self, keys: &[CanonicalKey]) -> Option<Vec<ObjectId>> {
        let ids = self.cache.get_all(keys)?;
        debug!(batch_len = keys.len(), "register_batch_cache_hit");
        Some(ids)
    }

    /// Checks a single insert-or-fetch answer, caches it and logs the outcome.
    pub(crate) fn finish_single(
        &self,
        key: CanonicalKey,
        response: Result<Vec<i64>, StoreError>,
        start: Instant,
    ) -> Result<ObjectId, RegisterError> {
        let result = response
            .map_err(RegisterError::from)
            .and_then(|rows| single_id(&rows));

        match result {
            Ok(id) => {
                self.cache.put(key, id);
                info!(
                    object_id = id.get(),
                    cache_resident = self.cache.len(),
                    elapsed_micros = start.elapsed().as_micros(),
                    "register_success"
                );
                Ok(id)
            }
            Err(err) => {
                warn!(
                    error = %err,
                    elapsed_micros = start.elapsed().as_micros(),
                    "register_failure"
                );
                Err(err)
            }
        }
    }

    /// Checks a batch answer, rebuilds results in request order, caches every
    /// distinct pair and logs the outcome.
    ///
    /// The cache is only written when the whole answer is valid.
    pub(crate) fn finish_batch(
        &self,
        keys: Vec<CanonicalKey>,
        response: Result<Vec<KeyedRow>, StoreError>,
        start: Instant,
    ) -> Result<Vec<ObjectId>, RegisterError> {
        let batch_len = keys.len();
        let result = response
            .map_err(RegisterError::from)
            .and_then(|rows| remap(&keys, &rows));

        match result {
            Ok((ids, distinct_keys)) => {
                let mut seen = HashSet::with_capacity(distinct_keys);
                let pairs: Vec<(CanonicalKey, ObjectId)> = keys
                    .into_iter()
                    .zip(ids.iter().copied())
                    .filter(|(key, _)| seen.insert(key.clone()))
                    .collect();
                self.cache.put_all(pairs);
                info!(
                    batch_len,
                    distinct_keys,
                    cache_resident = self.cache.len(),
                    elapsed_micros = start.elapsed().as_micros(),
                    "register_batch_success"
                );
                Ok(ids)
            }
            Err(err) => {
                warn!(
                    error = %err,
                    batch_len,
                    elapsed_micros = start.elapsed().as_micros(),
                    "register_batch_failure"
                );
                Err(err)
            }
        }
    }
}

/// A single insert-or-fetch must yield exactly one positive identifier.
fn single_id(rows: &[i64]) -> Result<ObjectId, RegisterError> {
    match rows {
        [id] => ObjectId::from_row(*id).ok_or_else(|| {
            RegisterError::InvalidResponse(format!("store returned non-positive id {id}"))
        }),
        [] => Err(RegisterError::InvalidResponse(
            "store returned no rows for insert-or-fetch".into(),
        )),
        many => Err(RegisterError::InvalidResponse(format!(
            "store returned {} rows for insert-or-fetch, expected 1",
            many.len()
        ))),
    }
}

/// Maps keyed rows back onto the requested keys.
///
/// Returns the identifiers in request order and the number of distinct keys.
fn remap(
    keys: &[CanonicalKey],
    rows: &[KeyedRow],
) -> Result<(Vec<ObjectId>, usize), RegisterError> {
    let requested: HashSet<&str> = keys.iter().map(CanonicalKey::as_str).collect();
    let mut by_key: HashMap<&str, ObjectId> = HashMap::with_capacity(rows.len());

    for row in rows {
        if !requested.contains(row.key.as_str()) {
            return Err(RegisterError::InvalidResponse(
                "store answered for a key that was not requested".into(),
            ));
        }
        let id = ObjectId::from_row(row.id).ok_or_else(|| {
            RegisterError::InvalidResponse(format!("store returned non-positive id {}", row.id))
        })?;
        if let Some(previous) = by_key.insert(row.key.as_str(), id) {
            if previous != id {
                return Err(RegisterError::InvalidResponse(format!(
                    "store returned ids {previous} and {id} for one key"
                )));
            }
        }
    }

    let ids = keys
        .iter()
        .map(|key| {
            by_key.get(key.as_str()).copied().ok_or_else(|| {
                RegisterError::InvalidResponse(format!(
                    "store response is missing key with digest {}",
                    key.digest()
                ))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok((ids, requested.len()))
}
