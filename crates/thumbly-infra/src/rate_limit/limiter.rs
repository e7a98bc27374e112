use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_rate: f64, // tokens per second
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, refill_rate: f64) -> Self {
        Self {
            tokens: capacity,
            capacity,
            refill_rate,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        let tokens_to_add = elapsed * self.refill_rate;

        self.tokens = (self.tokens + tokens_to_add).min(self.capacity);
        self.last_refill = now;
    }

    fn try_acquire(&mut self) -> bool {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn time_until_next_token(&self) -> Duration {
        if self.tokens >= 1.0 {
            Duration::from_secs(0)
        } else {
            let tokens_needed = 1.0 - self.tokens;
            let seconds = tokens_needed / self.refill_rate;
            Duration::from_secs_f64(seconds.max(0.0))
        }
    }
}

/// Sharded per-user rate limiter.
///
/// Each user gets a continuous-refill token bucket. Requests are never
/// blocked here: callers probe with [`try_acquire`](RateLimiter::try_acquire)
/// and, on denial, turn [`retry_after`](RateLimiter::retry_after) into a
/// soft "come back later" response instead of an error.
///
/// Uses multiple shards (separate HashMaps) so that different users typically
/// lock different shards under concurrent request load.
#[derive(Clone)]
pub struct RateLimiter {
    shards: Vec<Arc<Mutex<HashMap<Uuid, TokenBucket>>>>,
    shard_count: usize,
    capacity: f64,
    refill_rate: f64,
}

impl RateLimiter {
    /// Create a new rate limiter (default 16 shards).
    pub fn new(capacity: f64, refill_rate: f64) -> Self {
        Self::with_shards(capacity, refill_rate, 16)
    }

    /// Create a rate limiter with custom shard count for tuning under high load.
    pub fn with_shards(capacity: f64, refill_rate: f64, shard_count: usize) -> Self {
        let shards = (0..shard_count)
            .map(|_| Arc::new(Mutex::new(HashMap::new())))
            .collect();
        Self {
            shards,
            shard_count,
            capacity,
            refill_rate,
        }
    }

    fn shard_index(&self, user_id: &Uuid) -> usize {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        user_id.hash(&mut hasher);
        (hasher.finish() as usize) % self.shard_count
    }

    /// Try to acquire a token for the given user without blocking
    #[tracing::instrument(skip(self))]
    pub async fn try_acquire(&self, user_id: Uuid) -> bool {
        let shard = &self.shards[self.shard_index(&user_id)];
        let mut buckets = shard.lock().await;
        let bucket = buckets
            .entry(user_id)
            .or_insert_with(|| TokenBucket::new(self.capacity, self.refill_rate));

        let acquired = bucket.try_acquire();

        if acquired {
            tracing::trace!(
                user_id = %user_id,
                tokens_remaining = bucket.tokens,
                "Rate limit token acquired"
            );
        } else {
            tracing::debug!(
                user_id = %user_id,
                tokens_remaining = bucket.tokens,
                "Rate limit token not available"
            );
        }

        acquired
    }

    /// How long until the given user's bucket holds a whole token again
    #[tracing::instrument(skip(self))]
    pub async fn retry_after(&self, user_id: Uuid) -> Duration {
        let shard = &self.shards[self.shard_index(&user_id)];
        let mut buckets = shard.lock().await;
        let bucket = buckets
            .entry(user_id)
            .or_insert_with(|| TokenBucket::new(self.capacity, self.refill_rate));

        bucket.refill();
        bucket.time_until_next_token()
    }

    /// Get the current number of available tokens for a user
    #[tracing::instrument(skip(self))]
    pub async fn available_tokens(&self, user_id: Uuid) -> f64 {
        let shard = &self.shards[self.shard_index(&user_id)];
        let mut buckets = shard.lock().await;
        let bucket = buckets
            .entry(user_id)
            .or_insert_with(|| TokenBucket::new(self.capacity, self.refill_rate));

        bucket.refill();
        bucket.tokens
    }

    /// Drop buckets that have refilled back to capacity.
    ///
    /// A full bucket carries no state a fresh one would not, so idle users
    /// can be evicted by a periodic sweep to keep the maps bounded.
    pub async fn prune_idle(&self) -> usize {
        let mut removed = 0;
        for shard in &self.shards {
            let mut buckets = shard.lock().await;
            buckets.retain(|_, bucket| {
                bucket.refill();
                if bucket.tokens >= bucket.capacity {
                    removed += 1;
                    false
                } else {
                    true
                }
            });
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rate_limiter_basic() {
        let limiter = RateLimiter::new(4.0, 2.0);
        let user = Uuid::new_v4();

        assert!(limiter.try_acquire(user).await);
        assert!(limiter.try_acquire(user).await);

        let tokens = limiter.available_tokens(user).await;
        assert!(tokens < 4.0);
    }

    #[tokio::test]
    async fn test_rate_limiter_refill() {
        let limiter = RateLimiter::new(10.0, 10.0);
        let user = Uuid::new_v4();

        for _ in 0..5 {
            assert!(limiter.try_acquire(user).await);
        }

        let tokens_before = limiter.available_tokens(user).await;

        tokio::time::sleep(Duration::from_millis(500)).await;

        let tokens_after = limiter.available_tokens(user).await;
        assert!(tokens_after > tokens_before);
    }

    #[tokio::test]
    async fn test_drained_bucket_denies_and_reports_retry_after() {
        let limiter = RateLimiter::new(2.0, 1.0);
        let user = Uuid::new_v4();

        while limiter.try_acquire(user).await {}

        assert!(!limiter.try_acquire(user).await);

        let wait = limiter.retry_after(user).await;
        assert!(wait > Duration::from_secs(0));
        assert!(wait <= Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_users_have_independent_buckets() {
        let limiter = RateLimiter::new(1.0, 0.1);
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        assert!(limiter.try_acquire(first).await);
        assert!(!limiter.try_acquire(first).await);

        // The first user being drained does not affect the second.
        assert!(limiter.try_acquire(second).await);
    }

    #[tokio::test]
    async fn test_rate_limiter_single_shard() {
        let limiter = RateLimiter::with_shards(2.0, 1.0, 1);
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        assert!(limiter.try_acquire(first).await);
        assert!(limiter.try_acquire(second).await);

        assert!(limiter.available_tokens(first).await < 2.0);
        assert!(limiter.available_tokens(second).await < 2.0);
    }

    #[tokio::test]
    async fn test_prune_idle_drops_full_buckets() {
        let limiter = RateLimiter::new(2.0, 100.0);
        let user = Uuid::new_v4();

        assert!(limiter.try_acquire(user).await);

        // Refill rate is fast enough that the bucket is full again shortly.
        tokio::time::sleep(Duration::from_millis(100)).await;

        let removed = limiter.prune_idle().await;
        assert_eq!(removed, 1);
    }
}
