use async_trait::async_trait;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use super::{sanitize_key, CachePayload, EntityCache};

/// Thread-safe in-memory LRU cache of lookup payloads
///
/// Stands in for [`DiskCache`](super::DiskCache) in tests and for runs that
/// should leave nothing on disk. Uses LRU eviction to keep memory bounded.
pub struct MemoryCache {
    cache: Mutex<LruCache<String, CachePayload>>,
}

impl MemoryCache {
    /// Create a new cache holding at most `capacity` records (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);

        Self {
            cache: Mutex::new(LruCache::new(cap)),
        }
    }

    /// Current number of cached records
    pub fn len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store a record without validation (tests use this to plant corrupt data)
    pub fn insert_raw(&self, key: &str, payload: CachePayload) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(sanitize_key(key), payload);
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(4096)
    }
}

#[async_trait]
impl EntityCache for MemoryCache {
    async fn get(&self, key: &str) -> Option<CachePayload> {
        let key = sanitize_key(key);
        let payload = self.cache.lock().ok()?.get(&key).cloned()?;

        if !payload.is_well_formed() {
            log::warn!("Discarding malformed cache record: {}", key);
            return None;
        }

        Some(payload)
    }

    async fn put(&self, key: &str, payload: &CachePayload) {
        match self.cache.lock() {
            Ok(mut cache) => {
                cache.put(sanitize_key(key), payload.clone());
            }
            Err(e) => log::warn!("Cache write skipped for {}: {}", key, e),
        }
    }
}
