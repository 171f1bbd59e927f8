//! Concurrent TTL cache.

use dashmap::DashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Thread-safe map whose entries expire after a per-entry TTL.
///
/// Expired entries are dropped lazily on read and on insert of the same key.
pub struct TtlCache<K, V> {
    entries: DashMap<K, CacheEntry<V>>,
}

struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
    ttl: Duration,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Fetch a value if present and fresh.
    pub fn get(&self, key: &K) -> Option<V> {
        match self.entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() < entry.ttl => Some(entry.value.clone()),
            Some(_) => {
                drop(self.entries.remove(key));
                None
            }
            None => None,
        }
    }

    /// Store a value with the given TTL.
    pub fn insert(&self, key: K, value: V, ttl: Duration) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Drop an entry regardless of freshness.
    pub fn invalidate(&self, key: &K) {
        self.entries.remove(key);
    }

    /// Number of stored entries, including not-yet-collected expired ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Default for TtlCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
