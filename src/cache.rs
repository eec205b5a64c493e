/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Thread-safe, bounded caches.
//!
//! Every cache the backend keeps (validator-set snapshots, the self message cache, and the per-peer
//! message caches) is a [`BoundedCache`]. Entries may be evicted at any time once the cache is full, so
//! nothing that reads from a `BoundedCache` may depend on an entry surviving: snapshots are recomputed,
//! and messages whose hashes were evicted may be relayed again.

use std::{
    hash::Hash,
    num::NonZeroUsize,
    sync::{Mutex, MutexGuard},
};

use lru::LruCache;

/// A least-recently-used cache with a fixed capacity that can be shared between threads.
///
/// All methods take `&self`; the cache is internally synchronized and callers never take a lock around it.
pub struct BoundedCache<K: Hash + Eq, V: Clone> {
    inner: Mutex<LruCache<K, V>>,
}

impl<K: Hash + Eq, V: Clone> BoundedCache<K, V> {
    /// Create a new, empty `BoundedCache` that holds at most `capacity` entries. A `capacity` of 0 is treated
    /// as 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Get a copy of the value stored for `key`, marking it as recently used.
    pub fn get(&self, key: &K) -> Option<V> {
        self.lock().get(key).cloned()
    }

    /// Check whether `key` is in the cache, without marking it as recently used.
    pub fn contains(&self, key: &K) -> bool {
        self.lock().contains(key)
    }

    /// Store `value` for `key`, evicting the least recently used entry if the cache is full.
    pub fn add(&self, key: K, value: V) {
        self.lock().put(key, value);
    }

    /// Get the value stored for `key`, or store and return the value produced by `f` if there is none.
    ///
    /// The lookup and the insertion happen atomically, so two threads racing on the same missing key observe
    /// the same value.
    pub fn get_or_insert_with(&self, key: K, f: impl FnOnce() -> V) -> V {
        let mut cache = self.lock();
        if let Some(value) = cache.get(&key) {
            return value.clone();
        }
        let value = f();
        cache.put(key, value.clone());
        value
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<K, V>> {
        self.inner
            .lock()
            .expect("a thread panicked while holding a cache lock")
    }
}
