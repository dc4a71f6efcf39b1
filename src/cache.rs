//! Bounded response cache keyed by request URL.
//!
//! A plain least-recently-used cache from the `lru` crate with a max-age on top:
//! entries older than the configured age are dropped the next time they are read.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use lru::LruCache;

struct Entry<V> {
    value: Arc<V>,
    stored_at: Instant,
}

pub struct ResponseCache<V> {
    inner: Arc<Mutex<LruCache<String, Entry<V>>>>,
    max_age: Duration,
}

impl<V> Clone for ResponseCache<V> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone(), max_age: self.max_age }
    }
}

impl<V> ResponseCache<V> {
    pub fn new(capacity: NonZeroUsize, max_age: Duration) -> Self {
        Self { inner: Arc::new(Mutex::new(LruCache::new(capacity))), max_age }
    }

    /// Returns a live entry and marks it most recently used.
    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&self, key: &str, now: Instant) -> Option<Arc<V>> {
        let mut cache = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let expired = match cache.get(key) {
            Some(entry) => now.saturating_duration_since(entry.stored_at) >= self.max_age,
            None => return None,
        };
        if expired {
            cache.pop(key);
            return None;
        }
        cache.get(key).map(|entry| entry.value.clone())
    }

    pub fn insert(&self, key: impl Into<String>, value: V) -> Arc<V> {
        self.insert_at(key.into(), value, Instant::now())
    }

    fn insert_at(&self, key: String, value: V, now: Instant) -> Arc<V> {
        let value = Arc::new(value);
        let mut cache = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        cache.put(key, Entry { value: value.clone(), stored_at: now });
        value
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    pub fn clear(&self) {
        let mut cache = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        cache.clear();
    }
}
