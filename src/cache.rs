//! Minimal key-value stores with two lifetimes.
//!
//! [`ProcessCache`] keeps entries for the whole process, [`ThreadCache`]
//! keeps entries for the thread that wrote them. Both are used internally
//! (the bean provider's singleton cache is a [`ThreadCache`], the bundle
//! entry map a [`ProcessCache`]) but are general enough to be reused by
//! applications.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;
use std::thread::{self, ThreadId};

/// A cache whose entries live for the whole process.
///
/// Values are cloned out on access, so `V` is typically an `Arc` or
/// another cheaply clonable handle.
pub struct ProcessCache<K, V> {
    entries: RwLock<HashMap<K, V>>,
}

impl<K: Eq + Hash, V: Clone> ProcessCache<K, V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.read().get(key).cloned()
    }

    pub fn put(&self, key: K, value: V) {
        self.entries.write().insert(key, value);
    }

    /// Returns the stored value, creating and storing one when absent.
    pub fn get_or_insert_with(&self, key: K, create: impl FnOnce() -> V) -> V {
        if let Some(value) = self.entries.read().get(&key) {
            return value.clone();
        }

        self.entries.write().entry(key).or_insert_with(create).clone()
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.entries.write().remove(key)
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<K: Eq + Hash, V: Clone> Default for ProcessCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// A cache whose entries live for the writing thread only.
///
/// Entries are partitioned by [`ThreadId`], so a value stored by one
/// thread is never visible to another. Unlike a `thread_local!` static,
/// a `ThreadCache` can live inside an owning struct and be dropped with it.
pub struct ThreadCache<K, V> {
    entries: RwLock<HashMap<ThreadId, HashMap<K, V>>>,
}

impl<K: Eq + Hash, V: Clone> ThreadCache<K, V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the value stored under `key` by the calling thread.
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries
            .read()
            .get(&thread::current().id())
            .and_then(|entries| entries.get(key))
            .cloned()
    }

    /// Stores a value visible to the calling thread only.
    pub fn put(&self, key: K, value: V) {
        self.entries
            .write()
            .entry(thread::current().id())
            .or_default()
            .insert(key, value);
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.entries
            .write()
            .get_mut(&thread::current().id())
            .and_then(|entries| entries.remove(key))
    }

    /// Drops all entries of the calling thread. Other threads keep theirs.
    pub fn clear_current_thread(&self) {
        self.entries.write().remove(&thread::current().id());
    }

    /// Drops the entries of every thread.
    pub fn clear_all(&self) {
        self.entries.write().clear();
    }
}

impl<K: Eq + Hash, V: Clone> Default for ThreadCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn process_cache_stores_and_removes() {
        let cache = ProcessCache::new();
        assert!(cache.is_empty());

        cache.put("a", 1);
        cache.put("b", 2);
        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.len(), 2);

        assert_eq!(cache.remove(&"a"), Some(1));
        assert_eq!(cache.get(&"a"), None);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn process_cache_get_or_insert_creates_only_once() {
        let cache = ProcessCache::new();

        let first: Arc<u32> = cache.get_or_insert_with("a", || Arc::new(1));
        let second = cache.get_or_insert_with("a", || Arc::new(2));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*second, 1);
    }

    #[test]
    fn process_cache_overwrites_existing_entries() {
        let cache = ProcessCache::new();
        cache.put("a", 1);
        cache.put("a", 2);
        assert_eq!(cache.get(&"a"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn thread_cache_isolates_threads() {
        let cache = Arc::new(ThreadCache::new());
        cache.put("a", 1);
        assert_eq!(cache.get(&"a"), Some(1));

        let cache_for_thread = cache.clone();
        let seen_elsewhere = thread::spawn(move || {
            let before = cache_for_thread.get(&"a");
            cache_for_thread.put("a", 99);
            (before, cache_for_thread.get(&"a"))
        })
        .join()
        .unwrap();

        // The other thread saw nothing at first and its write stays there.
        assert_eq!(seen_elsewhere, (None, Some(99)));
        assert_eq!(cache.get(&"a"), Some(1));
    }

    #[test]
    fn thread_cache_clear_current_thread_keeps_other_threads() {
        let cache = Arc::new(ThreadCache::new());
        cache.put("a", 1);

        let cache_for_thread = cache.clone();
        thread::spawn(move || {
            cache_for_thread.put("a", 2);
            cache_for_thread.clear_current_thread();
            assert_eq!(cache_for_thread.get(&"a"), None);
        })
        .join()
        .unwrap();

        assert_eq!(cache.get(&"a"), Some(1));

        cache.clear_all();
        assert_eq!(cache.get(&"a"), None);
    }
}
