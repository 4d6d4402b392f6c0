//! Archive Cache for Bookshelf.
//!
//! A small capacity- and time-bounded cache for opened archive handles.
//! Every entry that leaves the cache by eviction (capacity, expiry or
//! explicit removal) is handed to the registered eviction callback exactly
//! once, so the owner can release whatever the value holds.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};

/// Callback invoked with the key and value of every evicted entry.
pub type EvictionCallback<K, V> = Arc<dyn Fn(&K, V) + Send + Sync>;

/// Trait defining cache operations with explicit eviction notification.
pub trait ArchiveCacheTrait<K, V> {
    fn get(&self, key: &K) -> Option<V>;
    fn put(&self, key: K, value: V);
    fn remove(&self, key: &K) -> bool;
    fn on_evict(&self, callback: EvictionCallback<K, V>);
    /// Evicts every expired entry and returns how many were removed.
    fn purge_expired(&self) -> usize;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

/// In-memory cache bounded by entry count and entry age.
pub struct ArchiveCache<K, V> {
    capacity: usize,
    ttl: Duration,
    entries: Mutex<HashMap<K, CacheEntry<V>>>,
    callback: RwLock<Option<EvictionCallback<K, V>>>,
}

impl<K, V> ArchiveCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates a cache holding at most `capacity` entries (minimum 1), each
    /// for at most `ttl`.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            ttl,
            entries: Mutex::new(HashMap::new()),
            callback: RwLock::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hands evicted entries to the callback. Called without the entry lock held.
    fn notify(&self, evicted: Vec<(K, V)>) {
        if evicted.is_empty() {
            return;
        }
        let callback = self
            .callback
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(callback) = callback {
            for (key, value) in evicted {
                callback(&key, value);
            }
        }
    }

    fn is_expired(&self, entry: &CacheEntry<V>, now: Instant) -> bool {
        now.duration_since(entry.inserted_at) >= self.ttl
    }
}

impl<K, V> ArchiveCacheTrait<K, V> for ArchiveCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let mut entries = self.lock();

        match entries.get(key) {
            None => return None,
            Some(entry) if !self.is_expired(entry, now) => return Some(entry.value.clone()),
            Some(_) => {}
        }
        let expired = entries.remove(key).map(|entry| (key.clone(), entry.value));
        drop(entries);

        self.notify(expired.into_iter().collect());
        None
    }

    fn put(&self, key: K, value: V) {
        let now = Instant::now();
        let mut evicted = Vec::new();
        let mut entries = self.lock();

        if let Some(old) = entries.remove(&key) {
            evicted.push((key.clone(), old.value));
        }

        while entries.len() >= self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.inserted_at)
                .map(|(k, _)| k.clone());
            match oldest.and_then(|k| entries.remove(&k).map(|entry| (k, entry.value))) {
                Some(pair) => evicted.push(pair),
                None => break,
            }
        }

        entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: now,
            },
        );
        drop(entries);

        self.notify(evicted);
    }

    fn remove(&self, key: &K) -> bool {
        let removed = self.lock().remove(key);
        match removed {
            Some(entry) => {
                self.notify(vec![(key.clone(), entry.value)]);
                true
            }
            None => false,
        }
    }

    fn on_evict(&self, callback: EvictionCallback<K, V>) {
        *self.callback.write().unwrap_or_else(PoisonError::into_inner) = Some(callback);
    }

    fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();
        let expired_keys: Vec<K> = entries
            .iter()
            .filter(|(_, entry)| self.is_expired(entry, now))
            .map(|(k, _)| k.clone())
            .collect();

        let evicted: Vec<(K, V)> = expired_keys
            .into_iter()
            .filter_map(|k| entries.remove(&k).map(|entry| (k, entry.value)))
            .collect();
        drop(entries);

        let count = evicted.len();
        self.notify(evicted);
        count
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}
