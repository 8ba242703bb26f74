//! Bounded lookup cache from canonical key to identifier.

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};

use canonical::CanonicalKey;
use lru::LruCache;
use store::ObjectId;

/// Least-recently-used map from [`CanonicalKey`] to [`ObjectId`].
///
/// Internally synchronized, so one cache can be shared by every caller of a
/// registry. Reads count as use: `get` promotes the entry just like `put`.
/// Entries only ever come from successful store round trips, so a lookup
/// returns either nothing or the identifier the store holds.
pub struct LookupCache {
    entries: Mutex<LruCache<CanonicalKey, ObjectId>>,
}

impl LookupCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    // A panic while holding the lock cannot leave a half-written entry, so
    // a poisoned cache is still consistent.
    fn lock(&self) -> MutexGuard<'_, LruCache<CanonicalKey, ObjectId>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Looks up `key` and marks it most recently used.
    pub fn get(&self, key: &str) -> Option<ObjectId> {
        self.lock().get(key).copied()
    }

    /// True when `key` is cached. Does not change recency.
    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains(key)
    }

    /// Inserts or refreshes an entry, evicting the least recently used one
    /// when full.
    pub fn put(&self, key: CanonicalKey, id: ObjectId) {
        self.lock().put(key, id);
    }

    /// Identifiers for every key, in order, or `None` if any key is missing.
    ///
    /// Runs under one lock, so the answer is consistent even while other
    /// callers evict. Hits are promoted even when the overall answer is
    /// `None`.
    pub fn get_all(&self, keys: &[CanonicalKey]) -> Option<Vec<ObjectId>> {
        let mut entries = self.lock();
        let mut ids = Vec::with_capacity(keys.len());
        let mut complete = true;
        for key in keys {
            match entries.get(key.as_str()) {
                Some(id) => ids.push(*id),
                None => complete = false,
            }
        }
        complete.then_some(ids)
    }

    /// Inserts every pair under one lock.
    pub fn put_all<I>(&self, pairs: I)
    where
        I: IntoIterator<Item = (CanonicalKey, ObjectId)>,
    {
        let mut entries = self.lock();
        for (key, id) in pairs {
            entries.put(key, id);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> NonZeroUsize {
        self.lock().cap()
    }

    /// Drops every entry. The store is unaffected.
    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl std::fmt::Debug for LookupCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.lock();
        f.debug_struct("LookupCache")
            .field("len", &entries.len())
            .field("capacity", &entries.cap())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canonical::canonicalise;
    use serde_json::json;
    use std::sync::Arc;
    use std::thread;

    fn key(n: u64) -> CanonicalKey {
        canonicalise(&json!({ "n": n }))
    }

    fn id(n: u64) -> ObjectId {
        ObjectId::new(n).unwrap()
    }

    fn cache(capacity: usize) -> LookupCache {
        LookupCache::new(NonZeroUsize::new(capacity).unwrap())
    }

    #[test]
    fn get_after_put() {
        let cache = cache(4);
        assert_eq!(cache.get(key(1).as_str()), None);
        cache.put(key(1), id(10));
        assert_eq!(cache.get(key(1).as_str()), Some(id(10)));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.capacity().get(), 4);
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = cache(2);
        cache.put(key(1), id(1));
        cache.put(key(2), id(2));
        // Reading 1 makes 2 the eviction candidate.
        assert!(cache.get(key(1).as_str()).is_some());
        cache.put(key(3), id(3));

        assert!(cache.contains(key(1).as_str()));
        assert!(!cache.contains(key(2).as_str()));
        assert!(cache.contains(key(3).as_str()));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn contains_does_not_promote() {
        let cache = cache(2);
        cache.put(key(1), id(1));
        cache.put(key(2), id(2));
        assert!(cache.contains(key(1).as_str()));
        cache.put(key(3), id(3));
        assert!(!cache.contains(key(1).as_str()));
    }

    #[test]
    fn get_all_is_all_or_nothing() {
        let cache = cache(8);
        cache.put_all([(key(1), id(1)), (key(2), id(2))]);

        assert_eq!(
            cache.get_all(&[key(2), key(1), key(2)]),
            Some(vec![id(2), id(1), id(2)])
        );
        assert_eq!(cache.get_all(&[key(1), key(3)]), None);
        assert_eq!(cache.get_all(&[]), Some(vec![]));
    }

    #[test]
    fn clear_empties() {
        let cache = cache(2);
        cache.put(key(1), id(1));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn concurrent_readers_never_see_wrong_ids() {
        let cache = Arc::new(cache(16));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for n in 0..200u64 {
                        let k = (n + t) % 32 + 1;
                        if let Some(found) = cache.get(key(k).as_str()) {
                            assert_eq!(found, id(k * 100));
                        }
                        cache.put(key(k), id(k * 100));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(cache.len() <= 16);
    }
}
