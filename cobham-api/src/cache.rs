//! In-memory TTL caches
//!
//! [`TtlCache`] backs the profile cache; [`ResponseCache`] stores whole GET
//! responses keyed by URL for the catalog routes.

use axum::body::Bytes;
use axum::http::{HeaderValue, StatusCode};
use serde::Serialize;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Default entry lifetime
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Hit/miss counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub keys: usize,
}

/// Key/value cache with per-entry expiry
///
/// Cloning is cheap; clones share the same storage.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    entries: Arc<RwLock<HashMap<K, Entry<V>>>>,
    default_ttl: Duration,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl<K, V> Clone for TtlCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            default_ttl: self.default_ttl,
            hits: Arc::clone(&self.hits),
            misses: Arc::clone(&self.misses),
        }
    }
}

impl<K, V> Default for TtlCache<K, V> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl<K, V> TtlCache<K, V> {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            default_ttl,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Fetch a live entry; expired entries count as misses
    pub async fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub async fn set(&self, key: K, value: V) {
        self.set_with_ttl(key, value, self.default_ttl).await;
    }

    pub async fn set_with_ttl(&self, key: K, value: V, ttl: Duration) {
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().await.insert(key, entry);
    }

    pub async fn remove(&self, key: &K) -> bool {
        self.entries.write().await.remove(key).is_some()
    }

    /// Remove every key matching the predicate, returning how many were dropped
    pub async fn remove_where<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&K) -> bool,
    {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|k, _| !predicate(k));
        before - entries.len()
    }

    /// Drop expired entries
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        before - entries.len()
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            keys: self.entries.read().await.len(),
        }
    }
}

/// Snapshot of a successful GET response
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

/// URL-keyed response cache shared by the catalog routes
#[derive(Debug, Clone, Default)]
pub struct ResponseCache {
    inner: TtlCache<String, CachedResponse>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<CachedResponse> {
        self.inner.get(&key.to_string()).await
    }

    pub async fn put(&self, key: String, response: CachedResponse, ttl: Duration) {
        self.inner.set_with_ttl(key, response, ttl).await;
    }

    /// Remove every cached URL containing `pattern`
    pub async fn clear(&self, pattern: &str) -> usize {
        let removed = self.inner.remove_where(|key| key.contains(pattern)).await;
        if removed > 0 {
            tracing::debug!(pattern, removed, "Cleared cached responses");
        }
        removed
    }

    pub async fn stats(&self) -> CacheStats {
        self.inner.stats().await
    }

    pub async fn purge_expired(&self) -> usize {
        self.inner.purge_expired().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_set_remove() {
        let cache: TtlCache<String, u32> = TtlCache::default();
        cache.set("a".into(), 1).await;

        assert_eq!(cache.get(&"a".to_string()).await, Some(1));
        assert!(cache.remove(&"a".to_string()).await);
        assert_eq!(cache.get(&"a".to_string()).await, None);

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.keys, 0);
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let cache: TtlCache<&'static str, u32> = TtlCache::new(Duration::from_millis(20));
        cache.set("k", 7).await;
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(cache.get(&"k").await, None);
        assert_eq!(cache.purge_expired().await, 1);
    }

    #[tokio::test]
    async fn test_clones_share_storage() {
        let cache: TtlCache<u8, u8> = TtlCache::default();
        let other = cache.clone();
        cache.set(1, 2).await;
        assert_eq!(other.get(&1).await, Some(2));
        assert!(other.remove(&1).await);
        assert_eq!(cache.get(&1).await, None);
    }

    #[tokio::test]
    async fn test_response_cache_clear_by_pattern() {
        let cache = ResponseCache::new();
        let response = CachedResponse {
            status: StatusCode::OK,
            content_type: None,
            body: Bytes::from_static(b"{}"),
        };
        let ttl = Duration::from_secs(60);
        cache.put("-|/api/songs".into(), response.clone(), ttl).await;
        cache.put("u1|/api/songs/me".into(), response.clone(), ttl).await;
        cache.put("-|/api/other".into(), response, ttl).await;

        assert_eq!(cache.clear("/api/songs").await, 2);
        assert!(cache.get("-|/api/other").await.is_some());
    }
}
