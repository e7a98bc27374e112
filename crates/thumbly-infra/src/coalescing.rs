//! Render coalescing registry.
//!
//! When many readers discover the same missing thumbnail at once, only the
//! first should enqueue a render; the rest ride along on a "queued" response.
//! The registry holds an in-flight mark per render key, acquired atomically
//! under a single shard lock.
//!
//! Every mark is watched by a spawned task racing the completion signal
//! against a ceiling timer. If the renderer never clears the mark (crash,
//! stuck job), the ceiling fires and frees the key so later requests can
//! enqueue again instead of coalescing onto a ghost.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

struct Mark {
    id: Uuid,
    notify: Arc<Notify>,
    marked_at: Instant,
}

/// Sharded registry of in-flight render keys.
#[derive(Clone)]
pub struct CoalescingRegistry {
    shards: Vec<Arc<Mutex<HashMap<String, Mark>>>>,
    shard_count: usize,
    ceiling: Duration,
}

impl CoalescingRegistry {
    /// Create a new registry (default 16 shards).
    pub fn new(ceiling: Duration) -> Self {
        Self::with_shards(ceiling, 16)
    }

    /// Create a registry with custom shard count for tuning under high load.
    pub fn with_shards(ceiling: Duration, shard_count: usize) -> Self {
        let shards = (0..shard_count)
            .map(|_| Arc::new(Mutex::new(HashMap::new())))
            .collect();
        Self {
            shards,
            shard_count,
            ceiling,
        }
    }

    fn shard_index(&self, key: &str) -> usize {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.shard_count
    }

    /// Atomically mark a render key as in-flight.
    ///
    /// Returns `true` if this caller placed the mark (and therefore owns the
    /// enqueue), `false` if another render is already in flight for the key.
    #[tracing::instrument(skip(self))]
    pub async fn mark_if_free(&self, key: &str) -> bool {
        let shard = Arc::clone(&self.shards[self.shard_index(key)]);
        let mut marks = shard.lock().await;

        if marks.contains_key(key) {
            tracing::debug!(key = %key, "Render already in flight, coalescing");
            return false;
        }

        let notify = Arc::new(Notify::new());
        let mark_id = Uuid::new_v4();
        marks.insert(
            key.to_string(),
            Mark {
                id: mark_id,
                notify: Arc::clone(&notify),
                marked_at: Instant::now(),
            },
        );
        drop(marks);

        let ceiling = self.ceiling;
        let watchdog_key = key.to_string();
        tokio::spawn(async move {
            tokio::select! {
                _ = notify.notified() => {}
                _ = tokio::time::sleep(ceiling) => {
                    let mut marks = shard.lock().await;
                    // Only reap our own mark: the key may have been cleared
                    // and re-marked by a later render in the meantime.
                    if marks.get(&watchdog_key).is_some_and(|m| m.id == mark_id) {
                        marks.remove(&watchdog_key);
                        tracing::warn!(
                            key = %watchdog_key,
                            ceiling_secs = ceiling.as_secs(),
                            "Render mark exceeded ceiling, freeing key"
                        );
                    }
                }
            }
        });

        true
    }

    /// Whether a render is currently marked in-flight for the key.
    pub async fn is_marked(&self, key: &str) -> bool {
        let shard = &self.shards[self.shard_index(key)];
        shard.lock().await.contains_key(key)
    }

    /// Remove every mark older than the ceiling, regardless of watchdog
    /// state.
    ///
    /// The per-mark watchdog normally frees abandoned keys on its own; this
    /// sweep backs it up if a watchdog task was ever lost. Returns how many
    /// marks were reaped.
    pub async fn sweep_stale(&self) -> usize {
        let mut removed = 0;
        for shard in &self.shards {
            let mut marks = shard.lock().await;
            marks.retain(|key, mark| {
                if mark.marked_at.elapsed() >= self.ceiling {
                    mark.notify.notify_one();
                    tracing::warn!(key = %key, "Stale render mark swept");
                    removed += 1;
                    false
                } else {
                    true
                }
            });
        }
        removed
    }

    /// Clear the mark for a finished (or failed) render.
    ///
    /// Idempotent: clearing an already-free key is a no-op. Returns `true`
    /// if a mark was actually removed.
    #[tracing::instrument(skip(self))]
    pub async fn clear(&self, key: &str) -> bool {
        let shard = &self.shards[self.shard_index(key)];
        let mut marks = shard.lock().await;

        match marks.remove(key) {
            Some(mark) => {
                mark.notify.notify_one();
                tracing::debug!(
                    key = %key,
                    held_ms = mark.marked_at.elapsed().as_secs_f64() * 1000.0,
                    "Render mark cleared"
                );
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mark_if_free_is_exclusive() {
        let registry = CoalescingRegistry::new(Duration::from_secs(60));

        assert!(registry.mark_if_free("thumbnails/doc/h1").await);
        assert!(!registry.mark_if_free("thumbnails/doc/h1").await);
        assert!(registry.is_marked("thumbnails/doc/h1").await);

        // Different keys are independent.
        assert!(registry.mark_if_free("thumbnails/doc/h2").await);
    }

    #[tokio::test]
    async fn test_clear_frees_the_key() {
        let registry = CoalescingRegistry::new(Duration::from_secs(60));

        assert!(registry.mark_if_free("k").await);
        assert!(registry.clear("k").await);
        assert!(!registry.is_marked("k").await);
        assert!(registry.mark_if_free("k").await);
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let registry = CoalescingRegistry::new(Duration::from_secs(60));

        assert!(registry.mark_if_free("k").await);
        assert!(registry.clear("k").await);
        assert!(!registry.clear("k").await);
    }

    #[tokio::test]
    async fn test_ceiling_frees_abandoned_mark() {
        let registry = CoalescingRegistry::new(Duration::from_millis(50));

        assert!(registry.mark_if_free("k").await);
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(!registry.is_marked("k").await);
        assert!(registry.mark_if_free("k").await);
    }

    #[tokio::test]
    async fn test_stale_watchdog_does_not_reap_new_mark() {
        let registry = CoalescingRegistry::new(Duration::from_millis(200));

        assert!(registry.mark_if_free("k").await);
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(registry.clear("k").await);

        // Re-mark: the first watchdog's deadline passes while this mark is live.
        assert!(registry.mark_if_free("k").await);
        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(registry.is_marked("k").await);
    }

    #[tokio::test]
    async fn test_sweep_stale_spares_fresh_marks() {
        let registry = CoalescingRegistry::new(Duration::from_secs(60));

        assert!(registry.mark_if_free("k").await);
        assert_eq!(registry.sweep_stale().await, 0);
        assert!(registry.is_marked("k").await);
    }

    #[tokio::test]
    async fn test_key_freed_past_ceiling_under_sweep() {
        let registry = CoalescingRegistry::new(Duration::from_millis(50));

        assert!(registry.mark_if_free("k").await);
        tokio::time::sleep(Duration::from_millis(120)).await;

        // The watchdog and the sweep race past the ceiling; either way the
        // key must be free afterwards.
        registry.sweep_stale().await;
        assert!(!registry.is_marked("k").await);
        assert!(registry.mark_if_free("k").await);
    }

    #[tokio::test]
    async fn test_concurrent_markers_elect_single_owner() {
        let registry = CoalescingRegistry::new(Duration::from_secs(60));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.mark_if_free("thumbnails/doc/h1").await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
