//! Response memoization keyed by the canonical request string.
//!
//! The cache is a side channel: handlers must behave identically, apart from
//! re-querying the store, when it is replaced with [`NoCache`].

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Six days, the lifetime the public deployment uses.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 6);
pub const DEFAULT_CACHE_CAPACITY: usize = 4096;

pub trait ResponseCache: Send + Sync {
    /// Returns the serialized response stored under `key`, if still fresh.
    fn get(&self, key: &str) -> Option<Arc<str>>;

    /// Stores a serialized successful response.
    fn put(&self, key: &str, body: Arc<str>);
}

/// Disabled cache.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

impl ResponseCache for NoCache {
    fn get(&self, _key: &str) -> Option<Arc<str>> {
        None
    }

    fn put(&self, _key: &str, _body: Arc<str>) {}
}

struct CachedBody {
    body: Arc<str>,
    expires_at: Instant,
}

/// Bounded in-process cache with a fixed time-to-live per entry.
pub struct LruResponseCache {
    entries: Mutex<LruCache<String, CachedBody>>,
    ttl: Duration,
}

impl LruResponseCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LruResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL)
    }
}

impl ResponseCache for LruResponseCache {
    fn get(&self, key: &str) -> Option<Arc<str>> {
        let mut entries = self.entries.lock();
        let fresh = entries
            .get(key)
            .map(|cached| Instant::now() < cached.expires_at)?;
        if fresh {
            entries.get(key).map(|cached| Arc::clone(&cached.body))
        } else {
            entries.pop(key);
            None
        }
    }

    fn put(&self, key: &str, body: Arc<str>) {
        let Some(expires_at) = Instant::now().checked_add(self.ttl) else {
            return;
        };
        self.entries
            .lock()
            .put(key.to_string(), CachedBody { body, expires_at });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_entries_are_returned() {
        let cache = LruResponseCache::default();
        assert_eq!(cache.ttl(), DEFAULT_CACHE_TTL);
        cache.put("/search?q=iron", Arc::from("{\"total\":5}"));
        assert_eq!(
            cache.get("/search?q=iron").as_deref(),
            Some("{\"total\":5}")
        );
        assert!(cache.get("/search?q=iron&page=2").is_none());
    }

    #[test]
    fn expired_entries_are_evicted() {
        let cache = LruResponseCache::new(8, Duration::ZERO);
        cache.put("/search?q=iron", Arc::from("{}"));
        assert!(cache.get("/search?q=iron").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn capacity_bounds_entries() {
        let cache = LruResponseCache::new(2, DEFAULT_CACHE_TTL);
        cache.put("a", Arc::from("1"));
        cache.put("b", Arc::from("2"));
        cache.get("a");
        cache.put("c", Arc::from("3"));
        assert_eq!(cache.len(), 2);
        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
    }

    #[test]
    fn zero_capacity_still_caches_one_entry() {
        let cache = LruResponseCache::new(0, DEFAULT_CACHE_TTL);
        cache.put("a", Arc::from("1"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn no_cache_never_returns() {
        let cache = NoCache;
        cache.put("a", Arc::from("1"));
        assert!(cache.get("a").is_none());
    }
}
