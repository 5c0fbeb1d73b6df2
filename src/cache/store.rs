//! Thread-safe TTL store for check results.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::entry::*;
use crate::probe::CheckResult;

/// Method used by [`ResultCache::set`].
pub const DEFAULT_METHOD: &str = "GET";

/// In-memory result cache.
///
/// Every method takes the internal lock for its whole duration, so concurrent
/// probe workers can call `get`/`insert` while a scan runs.
#[derive(Debug)]
pub struct ResultCache {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
    default_ttl: Duration,
}

impl ResultCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a result.
    ///
    /// `ttl` overrides the entry's stored TTL for this read only. An expired
    /// entry is evicted and reported as a miss.
    pub fn get(
        &self,
        name: &str,
        url: &str,
        method: &str,
        ttl: Option<Duration>,
    ) -> Option<CheckResult> {
        let key = CacheKey::new(name, url, method);
        let mut entries = self.lock();

        let entry = entries.get(&key)?;
        if entry.is_expired(Instant::now(), ttl.unwrap_or(entry.ttl)) {
            entries.remove(&key);
            return None;
        }

        Some(entry.result.clone())
    }

    /// Store a result under the `GET` method.
    ///
    /// Results carry no method, so this always keys by `GET`; a non-GET
    /// endpoint stored this way never produces a hit. Use [`insert`] when the
    /// endpoint's method is known.
    ///
    /// [`insert`]: ResultCache::insert
    pub fn set(&self, result: CheckResult, ttl: Option<Duration>) {
        self.insert(DEFAULT_METHOD, result, ttl);
    }

    /// Store a result under an explicit method.
    pub fn insert(&self, method: &str, result: CheckResult, ttl: Option<Duration>) {
        let key = CacheKey::new(&result.name, &result.url, method);
        let entry = CacheEntry::new(result, ttl.unwrap_or(self.default_ttl));
        self.lock().insert(key, entry);
    }

    pub fn remove(&self, name: &str, url: &str, method: &str) {
        self.lock().remove(&CacheKey::new(name, url, method));
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Drop every entry past its own TTL. Returns the number removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now, entry.ttl));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let entries = self.lock();
        let expired = entries
            .values()
            .filter(|entry| entry.is_expired(now, entry.ttl))
            .count();

        CacheStats {
            total: entries.len(),
            valid: entries.len() - expired,
            expired,
            default_ttl_secs: self.default_ttl.as_secs_f64(),
        }
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn result(name: &str, url: &str) -> CheckResult {
        CheckResult {
            name: name.to_string(),
            url: url.to_string(),
            status_code: Some(200),
            latency_ms: 12.5,
            success: true,
            error: None,
            timeout: false,
        }
    }

    #[test]
    fn test_set_and_get() {
        let cache = ResultCache::new(Duration::from_secs(60));
        let stored = result("users", "http://api/users");
        cache.set(stored.clone(), None);

        assert_eq!(cache.get("users", "http://api/users", "GET", None), Some(stored));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_miss_for_unknown_key() {
        let cache = ResultCache::default();
        assert!(cache.get("users", "http://api/users", "GET", None).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_key_includes_method() {
        let cache = ResultCache::default();
        cache.set(result("users", "http://api/users"), None);

        assert!(cache.get("users", "http://api/users", "POST", None).is_none());
        assert!(cache.get("users", "http://api/users", "GET", None).is_some());
    }

    #[test]
    fn test_insert_with_method() {
        let cache = ResultCache::default();
        cache.insert("POST", result("orders", "http://api/orders"), None);

        assert!(cache.get("orders", "http://api/orders", "POST", None).is_some());
        assert!(cache.get("orders", "http://api/orders", "GET", None).is_none());
    }

    #[test]
    fn test_entry_expires_lazily() {
        let cache = ResultCache::new(Duration::from_secs(1));
        cache.set(result("users", "http://api/users"), None);
        assert!(cache.get("users", "http://api/users", "GET", None).is_some());

        sleep(Duration::from_millis(1500));

        assert_eq!(cache.len(), 1);
        assert!(cache.get("users", "http://api/users", "GET", None).is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_ttl_override_on_read() {
        let cache = ResultCache::new(Duration::from_secs(60));
        cache.set(result("users", "http://api/users"), None);
        sleep(Duration::from_millis(60));

        // Generous override still hits, tight override expires and evicts
        let hit = cache.get("users", "http://api/users", "GET", Some(Duration::from_secs(10)));
        assert!(hit.is_some());
        let miss = cache.get("users", "http://api/users", "GET", Some(Duration::from_millis(10)));
        assert!(miss.is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_ttl_override_on_write() {
        let cache = ResultCache::new(Duration::from_secs(60));
        cache.set(result("short", "http://api/short"), Some(Duration::from_millis(20)));
        cache.set(result("long", "http://api/long"), None);
        sleep(Duration::from_millis(60));

        assert!(cache.get("short", "http://api/short", "GET", None).is_none());
        assert!(cache.get("long", "http://api/long", "GET", None).is_some());
    }

    #[test]
    fn test_remove_and_clear() {
        let cache = ResultCache::default();
        cache.set(result("a", "http://a"), None);
        cache.set(result("b", "http://b"), None);

        cache.remove("a", "http://a", "GET");
        cache.remove("missing", "http://missing", "GET");
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cleanup_expired_uses_stored_ttl() {
        let cache = ResultCache::new(Duration::from_secs(60));
        cache.set(result("a", "http://a"), Some(Duration::from_millis(10)));
        cache.set(result("b", "http://b"), Some(Duration::from_millis(10)));
        cache.set(result("c", "http://c"), None);
        sleep(Duration::from_millis(50));

        assert_eq!(cache.cleanup_expired(), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.cleanup_expired(), 0);
    }

    #[test]
    fn test_stats() {
        let cache = ResultCache::new(Duration::from_secs(30));
        cache.set(result("a", "http://a"), Some(Duration::from_millis(10)));
        cache.set(result("b", "http://b"), None);
        sleep(Duration::from_millis(50));

        let stats = cache.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.valid, 1);
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.default_ttl_secs, 30.0);
    }

    #[test]
    fn test_concurrent_writers() {
        let cache = std::sync::Arc::new(ResultCache::default());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for j in 0..50 {
                        let name = format!("api-{}-{}", i, j);
                        cache.set(result(&name, "http://api"), None);
                        cache.stats();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.len(), 400);
    }
}
