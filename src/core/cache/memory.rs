// src/core/cache/memory.rs

//! An in-process LRU `CacheStore`.

use super::CacheStore;
use crate::core::outcome::Outcome;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(1024) {
    Some(n) => n,
    None => unreachable!(),
};

/// A bounded store of outcomes keyed by cache key. `get` refreshes recency.
#[derive(Debug)]
pub struct MemoryCacheStore {
    entries: Mutex<LruCache<String, Outcome>>,
    lookups: AtomicU64,
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl MemoryCacheStore {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            lookups: AtomicU64::new(0),
        }
    }

    /// Stores `outcome` under `key`, evicting the least recently used entry when full.
    pub fn put(&self, key: impl Into<String>, outcome: Outcome) {
        self.entries.lock().put(key.into(), outcome);
    }

    pub fn remove(&self, key: &str) -> Option<Outcome> {
        self.entries.lock().pop(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Number of `get` calls served so far, hits and misses alike.
    pub fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &str) -> Option<Outcome> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().get(key).cloned()
    }
}
