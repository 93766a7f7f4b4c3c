//! Generic TTL-bounded memoization store.
//!
//! Every entry carries its own time-to-live; reads past the deadline are
//! treated as absent and evicted on the spot, so no background sweep is
//! needed for correctness. [`TtlCache::cleanup`] exists to bound memory
//! between reads and is driven by the maintenance task. An LRU capacity
//! bound caps growth even when nothing sweeps.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use lru::LruCache;
use metrics::counter;

use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::ttl";

#[derive(Debug, Clone)]
struct TtlEntry<V> {
    value: V,
    inserted_at: Instant,
    ttl: Duration,
}

impl<V> TtlEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) > self.ttl
    }
}

/// Key-value store with per-entry expiry, lazy eviction, and an LRU bound.
pub struct TtlCache<K, V> {
    entries: RwLock<LruCache<K, TtlEntry<V>>>,
    /// Metrics label identifying this cache instance.
    namespace: &'static str,
}

impl<K, V> TtlCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    pub fn new(namespace: &'static str, capacity: NonZeroUsize) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
            namespace,
        }
    }

    /// Store `value` under `key` for `ttl`. A capacity-evicted victim is
    /// silently dropped.
    pub fn insert(&self, key: K, value: V, ttl: Duration) {
        let entry = TtlEntry {
            value,
            inserted_at: Instant::now(),
            ttl,
        };
        rw_write(&self.entries, SOURCE, "insert").put(key, entry);
    }

    /// Fetch a live value. An expired entry is removed and reported absent.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let mut entries = rw_write(&self.entries, SOURCE, "get");

        let expired = match entries.get(key) {
            Some(entry) if entry.is_expired(now) => true,
            Some(entry) => {
                counter!("foglio_cache_hit_total", "namespace" => self.namespace).increment(1);
                return Some(entry.value.clone());
            }
            None => false,
        };

        if expired {
            entries.pop(key);
        }
        counter!("foglio_cache_miss_total", "namespace" => self.namespace).increment(1);
        None
    }

    pub fn remove(&self, key: &K) {
        rw_write(&self.entries, SOURCE, "remove").pop(key);
    }

    /// Sweep every expired entry, returning how many were removed.
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let mut entries = rw_write(&self.entries, SOURCE, "cleanup");

        let expired: Vec<K> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            entries.pop(key);
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        rw_write(&self.entries, SOURCE, "clear").clear();
    }

    /// Shift an entry's insertion time into the past (deterministic expiry in
    /// tests, no sleeping).
    #[cfg(test)]
    pub(crate) fn backdate(&self, key: &K, by: Duration) {
        let mut entries = rw_write(&self.entries, SOURCE, "backdate");
        if let Some(entry) = entries.get_mut(key) {
            entry.inserted_at -= by;
        }
    }
}
