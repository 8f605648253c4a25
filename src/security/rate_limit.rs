//! Per-user rate limiting in front of the security stages

use crate::orchestrator::TokenBucket;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 100;

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Whether `user_id` may make another request now; consumes one slot
    async fn allowed(&self, user_id: &str) -> bool;
}

/// One token bucket per user, refilled at `limit / 60` tokens per second
pub struct TokenBucketRateLimiter {
    requests_per_minute: u32,
    buckets: Mutex<HashMap<String, Arc<TokenBucket>>>,
}

impl Default for TokenBucketRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_REQUESTS_PER_MINUTE)
    }
}

impl TokenBucketRateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            requests_per_minute: requests_per_minute.max(1),
            buckets: Mutex::new(HashMap::new()),
        }
    }

    pub fn requests_per_minute(&self) -> u32 {
        self.requests_per_minute
    }

    async fn bucket(&self, user_id: &str) -> Arc<TokenBucket> {
        let mut buckets = self.buckets.lock().await;
        buckets
            .entry(format!("user:{}", user_id))
            .or_insert_with(|| {
                Arc::new(TokenBucket::new(
                    f64::from(self.requests_per_minute) / 60.0,
                    self.requests_per_minute,
                ))
            })
            .clone()
    }
}

#[async_trait]
impl RateLimiter for TokenBucketRateLimiter {
    async fn allowed(&self, user_id: &str) -> bool {
        self.bucket(user_id).await.try_acquire(1).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_limit_is_per_user() {
        let limiter = TokenBucketRateLimiter::new(2);
        assert!(limiter.allowed("alice").await);
        assert!(limiter.allowed("alice").await);
        assert!(!limiter.allowed("alice").await);
        assert!(limiter.allowed("bob").await);
    }
}
