//! Injectable key/value cache with per-entry TTL.

use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Cache seam used by lookups that should not hit the network every time.
pub trait Cache<V>: Send + Sync {
    /// Fresh value for `key`, if any.
    fn get(&self, key: &str) -> Option<V>;

    /// Store `value` for `ttl`.
    fn set(&self, key: String, value: V, ttl: Duration);
}

/// Thread-safe in-memory cache; expired entries are dropped on read.
pub struct MemoryCache<V> {
    data: DashMap<String, CacheEntry<V>>,
}

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V: Clone> MemoryCache<V> {
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }

    /// Remove all expired entries.
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.data.retain(|_, entry| entry.expires_at > now);
    }

    /// Number of entries, expired ones included.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<V: Clone> Default for MemoryCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Send + Sync> Cache<V> for MemoryCache<V> {
    fn get(&self, key: &str) -> Option<V> {
        let entry = self.data.get(key)?;
        if entry.expires_at > Instant::now() {
            Some(entry.value.clone())
        } else {
            drop(entry);
            self.data.remove(key);
            None
        }
    }

    fn set(&self, key: String, value: V, ttl: Duration) {
        self.data.insert(
            key,
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }
}
