//! Generic TTL-evicting store, C6.
//!
//! Grounded on `original_source/utils/cleanup.py`'s `DataStore`/
//! `CleanupManager` pair: each mode owns one `TtlStore` keyed by whatever
//! identity that mode's entities use (MAC, ICAO hex, pager address), rather
//! than the Python original's handful of module-level globals.

use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    last_seen: Instant,
}

/// A keyed collection of values that expire `ttl` after their last touch.
#[derive(Debug, Clone)]
pub struct TtlStore<K, V> {
    entries: HashMap<K, Entry<V>>,
}

impl<K, V> Default for TtlStore<K, V>
where
    K: std::hash::Hash + Eq,
{
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K, V> TtlStore<K, V>
where
    K: std::hash::Hash + Eq + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces `key`, refreshing its last-seen timestamp.
    pub fn upsert(&mut self, key: K, value: V) {
        self.entries.insert(
            key,
            Entry {
                value,
                last_seen: Instant::now(),
            },
        );
    }

    /// Updates an existing entry in place via `f`, refreshing last-seen.
    /// No-op (returns `false`) if `key` is absent.
    pub fn update_with<F: FnOnce(&mut V)>(&mut self, key: &K, f: F) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) => {
                f(&mut entry.value);
                entry.last_seen = Instant::now();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|e| &e.value)
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|e| e.value)
    }

    pub fn all(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().map(|(k, e)| (k, &e.value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Evicts entries whose last-seen time is older than `ttl`, returning
    /// the keys that were removed.
    pub fn sweep(&mut self, ttl: Duration) -> Vec<K> {
        let now = Instant::now();
        let expired: Vec<K> = self
            .entries
            .iter()
            .filter(|(_, e)| now.duration_since(e.last_seen) > ttl)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            self.entries.remove(key);
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn upsert_and_get() {
        let mut store: TtlStore<String, i32> = TtlStore::new();
        store.upsert("a".to_string(), 1);
        assert_eq!(store.get(&"a".to_string()), Some(&1));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn update_with_refreshes_last_seen() {
        let mut store: TtlStore<String, i32> = TtlStore::new();
        store.upsert("a".to_string(), 1);
        assert!(store.update_with(&"a".to_string(), |v| *v += 1));
        assert_eq!(store.get(&"a".to_string()), Some(&2));
        assert!(!store.update_with(&"missing".to_string(), |v| *v += 1));
    }

    #[test]
    fn sweep_evicts_stale_entries() {
        let mut store: TtlStore<String, i32> = TtlStore::new();
        store.upsert("stale".to_string(), 1);
        sleep(Duration::from_millis(20));
        store.upsert("fresh".to_string(), 2);
        let evicted = store.sweep(Duration::from_millis(10));
        assert_eq!(evicted, vec!["stale".to_string()]);
        assert_eq!(store.len(), 1);
        assert!(store.get(&"fresh".to_string()).is_some());
    }

    #[test]
    fn clear_empties_store() {
        let mut store: TtlStore<String, i32> = TtlStore::new();
        store.upsert("a".to_string(), 1);
        store.clear();
        assert!(store.is_empty());
    }
}
