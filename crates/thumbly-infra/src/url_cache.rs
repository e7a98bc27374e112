//! Short-TTL cache for signed read URLs.
//!
//! Entries are keyed by storage key, which embeds the document id, content
//! version, and variant. A content change produces a new key, so stale URLs
//! are never served for updated documents; old entries simply age out.
//!
//! Eviction is lazy (expired entries are dropped on lookup) with a periodic
//! [`purge_expired`](SignedUrlCache::purge_expired) sweep for keys that are
//! never read again.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct CacheEntry {
    url: String,
    expires_at: Instant,
}

/// A cached signed URL together with its remaining validity.
#[derive(Debug, Clone)]
pub struct CachedUrl {
    pub url: String,
    pub remaining_ttl: Duration,
}

/// Sharded TTL cache for signed read URLs.
///
/// The cache TTL must be shorter than the signed URL's own expiry so that a
/// cache hit never hands out a URL that dies in the client's hands. Callers
/// supply that already-margined TTL at construction.
#[derive(Clone)]
pub struct SignedUrlCache {
    shards: Vec<Arc<Mutex<HashMap<String, CacheEntry>>>>,
    shard_count: usize,
    ttl: Duration,
}

impl SignedUrlCache {
    /// Create a new cache (default 16 shards).
    pub fn new(ttl: Duration) -> Self {
        Self::with_shards(ttl, 16)
    }

    /// Create a cache with custom shard count for tuning under high load.
    pub fn with_shards(ttl: Duration, shard_count: usize) -> Self {
        let shards = (0..shard_count)
            .map(|_| Arc::new(Mutex::new(HashMap::new())))
            .collect();
        Self {
            shards,
            shard_count,
            ttl,
        }
    }

    fn shard_index(&self, key: &str) -> usize {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.shard_count
    }

    /// Look up a signed URL, evicting it if its TTL has lapsed.
    pub async fn get(&self, key: &str) -> Option<CachedUrl> {
        let shard = &self.shards[self.shard_index(key)];
        let mut entries = shard.lock().await;

        let entry = entries.get(key)?;
        let now = Instant::now();

        if entry.expires_at <= now {
            entries.remove(key);
            tracing::trace!(key = %key, "Signed URL cache entry expired");
            return None;
        }

        Some(CachedUrl {
            url: entry.url.clone(),
            remaining_ttl: entry.expires_at - now,
        })
    }

    /// Store a signed URL under the given storage key.
    pub async fn insert(&self, key: &str, url: String) {
        let shard = &self.shards[self.shard_index(key)];
        let mut entries = shard.lock().await;
        entries.insert(
            key.to_string(),
            CacheEntry {
                url,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Drop every expired entry. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        for shard in &self.shards {
            let mut entries = shard.lock().await;
            let before = entries.len();
            entries.retain(|_, entry| entry.expires_at > now);
            removed += before - entries.len();
        }
        if removed > 0 {
            tracing::debug!(removed, "Purged expired signed URL cache entries");
        }
        removed
    }

    /// Number of live entries across all shards (expired-but-unswept included).
    pub async fn len(&self) -> usize {
        let mut total = 0;
        for shard in &self.shards {
            total += shard.lock().await.len();
        }
        total
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cache_hit_returns_url_and_remaining_ttl() {
        let cache = SignedUrlCache::new(Duration::from_secs(60));
        cache
            .insert("thumbnails/doc/h1/240.webp", "https://cdn/240".to_string())
            .await;

        let hit = cache.get("thumbnails/doc/h1/240.webp").await.unwrap();
        assert_eq!(hit.url, "https://cdn/240");
        assert!(hit.remaining_ttl > Duration::from_secs(55));
        assert!(hit.remaining_ttl <= Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_cache_miss_for_unknown_key() {
        let cache = SignedUrlCache::new(Duration::from_secs(60));
        assert!(cache.get("thumbnails/doc/h1/96.webp").await.is_none());
    }

    #[tokio::test]
    async fn test_expired_entry_evicted_on_get() {
        let cache = SignedUrlCache::new(Duration::from_millis(20));
        cache
            .insert("thumbnails/doc/h1/96.webp", "https://cdn/96".to_string())
            .await;

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(cache.get("thumbnails/doc/h1/96.webp").await.is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_purge_expired_sweeps_unread_entries() {
        let cache = SignedUrlCache::new(Duration::from_millis(20));
        cache.insert("a", "https://cdn/a".to_string()).await;
        cache.insert("b", "https://cdn/b".to_string()).await;

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(cache.purge_expired().await, 2);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_reinsert_refreshes_expiry() {
        let cache = SignedUrlCache::new(Duration::from_millis(80));
        cache.insert("k", "https://cdn/v1".to_string()).await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        cache.insert("k", "https://cdn/v2".to_string()).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        // The first TTL would have lapsed by now; the reinsert reset it.
        let hit = cache.get("k").await.unwrap();
        assert_eq!(hit.url, "https://cdn/v2");
    }
}
