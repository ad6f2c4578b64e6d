//! Fixed-capacity LRU caches in front of the persisted store.
//!
//! Each [`FrontCache`] is internally locked, so it can be read and filled
//! from any thread regardless of the cache-wide lock. Entries are only ever
//! inserted after the corresponding mapping is durable in the store, so a
//! hit is always authoritative; a miss only means "ask the store".

use ahash::RandomState;
use lru::LruCache;
use parking_lot::Mutex;
use std::borrow::Borrow;
use std::hash::Hash;
use std::num::NonZeroUsize;
use tracing::trace;

/// A thread-safe, growable LRU cache.
pub struct FrontCache<K, V> {
    name: &'static str,
    inner: Mutex<LruCache<K, V, RandomState>>,
    max_capacity: usize,
}

impl<K: Hash + Eq, V: Clone> FrontCache<K, V> {
    /// Create a cache holding `capacity` entries that may grow up to
    /// `max_capacity`. Both are clamped to at least one entry.
    pub fn new(name: &'static str, capacity: usize, max_capacity: usize) -> Self {
        let max_capacity = max_capacity.max(1);
        let capacity = non_zero(capacity.min(max_capacity));
        Self {
            name,
            inner: Mutex::new(LruCache::with_hasher(capacity, RandomState::new())),
            max_capacity,
        }
    }

    /// Look up `key`, marking it most recently used.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.lock().get(key).cloned()
    }

    /// Insert or refresh an entry, evicting the least recently used one if
    /// the cache is full.
    pub fn put(&self, key: K, value: V) {
        self.inner.lock().put(key, value);
    }

    /// Grow the cache ahead of a write batch.
    ///
    /// The target is `headroom * batch_len`, capped at the configured
    /// maximum. Capacity never shrinks. Returns the new capacity if the
    /// cache grew.
    pub fn grow_for_batch(&self, batch_len: usize, headroom: usize) -> Option<usize> {
        let target = batch_len.saturating_mul(headroom).min(self.max_capacity);

        let mut inner = self.inner.lock();
        let current = inner.cap().get();
        if target <= current {
            return None;
        }
        inner.resize(non_zero(target));
        trace!(cache = self.name, from = current, to = target, "Grew front cache");
        Some(target)
    }

    /// Current capacity in entries.
    pub fn capacity(&self) -> usize {
        self.inner.lock().cap().get()
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Returns `true` if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

fn non_zero(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap_or(NonZeroUsize::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_put() {
        let cache: FrontCache<Box<[u8]>, u64> = FrontCache::new("test", 4, 16);
        assert!(cache.is_empty());

        cache.put(b"a".to_vec().into_boxed_slice(), 1);
        assert_eq!(cache.get(&b"a"[..]), Some(1));
        assert_eq!(cache.get(&b"b"[..]), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_lru_eviction() {
        let cache: FrontCache<u64, &str> = FrontCache::new("test", 2, 16);
        cache.put(1, "one");
        cache.put(2, "two");
        // Touch 1 so 2 becomes the eviction candidate.
        assert_eq!(cache.get(&1), Some("one"));
        cache.put(3, "three");

        assert_eq!(cache.get(&1), Some("one"));
        assert_eq!(cache.get(&2), None);
        assert_eq!(cache.get(&3), Some("three"));
    }

    #[test]
    fn test_grow_for_batch() {
        let cache: FrontCache<u64, u64> = FrontCache::new("test", 10, 100);
        assert_eq!(cache.capacity(), 10);

        // 3 * 3 = 9 fits already.
        assert_eq!(cache.grow_for_batch(3, 3), None);
        assert_eq!(cache.capacity(), 10);

        assert_eq!(cache.grow_for_batch(5, 3), Some(15));
        assert_eq!(cache.capacity(), 15);

        // Never shrinks.
        assert_eq!(cache.grow_for_batch(1, 3), None);
        assert_eq!(cache.capacity(), 15);

        // Capped at the maximum.
        assert_eq!(cache.grow_for_batch(1000, 3), Some(100));
        assert_eq!(cache.capacity(), 100);
        assert_eq!(cache.grow_for_batch(1000, 3), None);
    }

    #[test]
    fn test_growth_keeps_entries() {
        let cache: FrontCache<u64, u64> = FrontCache::new("test", 2, 100);
        cache.put(1, 10);
        cache.put(2, 20);
        cache.grow_for_batch(10, 3);
        cache.put(3, 30);
        assert_eq!(cache.get(&1), Some(10));
        assert_eq!(cache.get(&2), Some(20));
        assert_eq!(cache.get(&3), Some(30));
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let cache: FrontCache<u64, u64> = FrontCache::new("test", 0, 0);
        assert_eq!(cache.capacity(), 1);
        cache.put(1, 1);
        assert_eq!(cache.get(&1), Some(1));
    }
}
