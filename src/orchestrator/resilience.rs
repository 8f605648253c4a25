//! Resilience wrappers for executors
//!
//! `ResilientExecutor` wraps any `Executor` with:
//! - a circuit breaker (closed → open after repeated failures, half-open
//!   after the reset timeout, closed again after enough successes)
//! - an optional token-bucket limiter
//! - an optional TTL + LRU response cache
//!
//! The orchestrator never sees any of this; it only sees an `Executor`.

use super::executor::Executor;
use crate::error::ExecutionError;
use crate::planner::canonical_json;
use async_trait::async_trait;
use floatchat_types::{ExecutorMetadata, ExecutorRequest, ExecutorResponse};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

// ============================================================================
// CIRCUIT BREAKER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub reset_timeout: Duration,
    /// Successes needed in half-open before closing
    pub half_open_successes: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(60),
            half_open_successes: 3,
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failures: u32,
    last_failure: Option<Instant>,
    half_open_successes: u32,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failures: 0,
                last_failure: None,
                half_open_successes: 0,
            }),
        }
    }

    pub async fn state(&self) -> CircuitState {
        self.inner.lock().await.state
    }

    /// Whether a call may go through; moves open → half-open once the
    /// reset timeout has passed since the last failure
    pub async fn can_attempt(&self) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = inner
                    .last_failure
                    .map(|t| t.elapsed() >= self.config.reset_timeout)
                    .unwrap_or(true);
                if elapsed {
                    inner.state = CircuitState::HalfOpen;
                    inner.half_open_successes = 0;
                    tracing::info!(executor = %self.name, "Circuit half-open, testing recovery");
                }
                elapsed
            }
        }
    }

    pub async fn record_success(&self) {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::HalfOpen => {
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.config.half_open_successes {
                    inner.state = CircuitState::Closed;
                    inner.failures = 0;
                    inner.half_open_successes = 0;
                    tracing::info!(executor = %self.name, "Circuit closed, executor recovered");
                }
            }
            CircuitState::Closed => {
                inner.failures = inner.failures.saturating_sub(1);
            }
            CircuitState::Open => {}
        }
    }

    pub async fn record_failure(&self) {
        let mut inner = self.inner.lock().await;
        inner.failures += 1;
        inner.last_failure = Some(Instant::now());
        let reopen = inner.state == CircuitState::HalfOpen;
        if (reopen || inner.failures >= self.config.failure_threshold)
            && inner.state != CircuitState::Open
        {
            inner.state = CircuitState::Open;
            tracing::warn!(
                executor = %self.name,
                failures = inner.failures,
                "Circuit opened"
            );
        }
    }
}

// ============================================================================
// TOKEN BUCKET
// ============================================================================

/// Token bucket refilled continuously at `rate` tokens per second
#[derive(Debug)]
pub struct TokenBucket {
    rate: f64,
    capacity: f64,
    state: Mutex<(f64, Instant)>,
}

impl TokenBucket {
    pub fn new(rate: f64, capacity: u32) -> Self {
        let capacity = f64::from(capacity);
        Self {
            rate,
            capacity,
            state: Mutex::new((capacity, Instant::now())),
        }
    }

    /// Take `tokens` if available, without waiting
    pub async fn try_acquire(&self, tokens: u32) -> bool {
        let mut state = self.state.lock().await;
        let (available, last) = *state;
        let now = Instant::now();
        let refilled =
            (available + now.duration_since(last).as_secs_f64() * self.rate).min(self.capacity);

        let wanted = f64::from(tokens);
        if refilled >= wanted {
            *state = (refilled - wanted, now);
            true
        } else {
            *state = (refilled, now);
            false
        }
    }
}

// ============================================================================
// RESPONSE CACHE
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStats {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<String, (ExecutorResponse, Instant)>,
    /// Least recently used first
    order: VecDeque<String>,
    hits: u64,
    misses: u64,
}

impl CacheInner {
    fn touch(&mut self, key: &str) {
        self.order.retain(|k| k != key);
        self.order.push_back(key.to_string());
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
        self.order.retain(|k| k != key);
    }
}

/// TTL + LRU cache of successful executor responses
#[derive(Debug)]
pub struct ResponseCache {
    max_size: usize,
    ttl: Duration,
    inner: Mutex<CacheInner>,
}

impl ResponseCache {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            max_size: max_size.max(1),
            ttl,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    /// Operation plus canonical params, hashed
    pub fn key_for(request: &ExecutorRequest) -> String {
        let params = canonical_json(&Value::Object(request.params.clone()));
        let hash = Sha256::digest(format!("{}:{}", request.operation, params).as_bytes());
        hex::encode(hash)
    }

    pub async fn get(&self, key: &str) -> Option<ExecutorResponse> {
        let mut inner = self.inner.lock().await;
        let fresh = match inner.entries.get(key) {
            None => None,
            Some((_, stored)) => Some(stored.elapsed() <= self.ttl),
        };
        match fresh {
            Some(true) => {
                inner.hits += 1;
                inner.touch(key);
                inner.entries.get(key).map(|(r, _)| r.clone())
            }
            Some(false) => {
                inner.remove(key);
                inner.misses += 1;
                None
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    pub async fn set(&self, key: &str, response: ExecutorResponse) {
        let mut inner = self.inner.lock().await;
        if inner.entries.len() >= self.max_size && !inner.entries.contains_key(key) {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
            }
        }
        inner
            .entries
            .insert(key.to_string(), (response, Instant::now()));
        inner.touch(key);
    }

    pub async fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().await;
        CacheStats {
            size: inner.entries.len(),
            hits: inner.hits,
            misses: inner.misses,
        }
    }

    pub async fn clear(&self) {
        *self.inner.lock().await = CacheInner::default();
    }
}

// ============================================================================
// RESILIENT EXECUTOR
// ============================================================================

pub struct ResilientExecutor {
    inner: Arc<dyn Executor>,
    breaker: CircuitBreaker,
    limiter: Option<TokenBucket>,
    cache: Option<ResponseCache>,
}

impl ResilientExecutor {
    pub fn new(inner: Arc<dyn Executor>) -> Self {
        let breaker = CircuitBreaker::new(inner.name(), CircuitBreakerConfig::default());
        Self {
            inner,
            breaker,
            limiter: None,
            cache: None,
        }
    }

    pub fn with_breaker_config(mut self, config: CircuitBreakerConfig) -> Self {
        self.breaker = CircuitBreaker::new(self.inner.name(), config);
        self
    }

    pub fn with_rate_limit(mut self, rate_per_sec: f64, capacity: u32) -> Self {
        self.limiter = Some(TokenBucket::new(rate_per_sec, capacity));
        self
    }

    pub fn with_response_cache(mut self, max_size: usize, ttl: Duration) -> Self {
        self.cache = Some(ResponseCache::new(max_size, ttl));
        self
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub async fn cache_stats(&self) -> Option<CacheStats> {
        match &self.cache {
            Some(cache) => Some(cache.stats().await),
            None => None,
        }
    }
}

#[async_trait]
impl Executor for ResilientExecutor {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn execute(&self, request: ExecutorRequest) -> Result<ExecutorResponse, ExecutionError> {
        let key = self.cache.as_ref().map(|_| ResponseCache::key_for(&request));

        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if let Some(mut hit) = cache.get(key).await {
                let rows_count = hit.metadata.as_ref().and_then(|m| m.rows_count);
                hit.metadata = Some(ExecutorMetadata {
                    rows_count,
                    from_cache: Some(true),
                });
                return Ok(hit);
            }
        }

        if !self.breaker.can_attempt().await {
            return Err(ExecutionError::CircuitOpen {
                executor: self.name().to_string(),
            });
        }

        if let Some(limiter) = &self.limiter {
            if !limiter.try_acquire(1).await {
                return Err(ExecutionError::RateLimited {
                    executor: self.name().to_string(),
                });
            }
        }

        // Enforced here so a slow executor counts against the breaker
        let operation = request.operation.clone();
        let timeout_ms = request.timeout_ms;
        let limit = Duration::from_millis(timeout_ms);
        let result = match tokio::time::timeout(limit, self.inner.execute(request)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    executor = self.name(),
                    %operation,
                    timeout_ms,
                    "Executor timed out"
                );
                Err(ExecutionError::Timeout {
                    step: operation,
                    timeout_ms,
                })
            }
        };

        match result {
            Ok(response) if response.success => {
                self.breaker.record_success().await;
                if let (Some(cache), Some(key)) = (&self.cache, &key) {
                    cache.set(key, response.clone()).await;
                }
                Ok(response)
            }
            Ok(response) => {
                self.breaker.record_failure().await;
                Ok(response)
            }
            Err(e) => {
                self.breaker.record_failure().await;
                Err(e)
            }
        }
    }
}
