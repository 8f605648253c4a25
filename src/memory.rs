//! Advisory feedback sources for the planner
//!
//! The planner consults a cache store (is this operator's result already
//! cached?) and an optional cost history (how long did this kind of
//! operator actually take?). Both are advisory: when they have nothing to
//! say, planning falls back to the static cost table.

use async_trait::async_trait;
use floatchat_types::{Operator, OperatorKind, StepMetric};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Key-value cache shared with the caching executor
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<Value>;

    async fn set(&self, key: &str, value: Value, ttl: Duration);
}

/// Source of observed operator costs
#[async_trait]
pub trait HistoricalCostSource: Send + Sync {
    /// Recency-weighted cost in milliseconds, `None` when never observed
    async fn historical_cost(&self, operator: &Operator) -> Option<f64>;

    async fn record(&self, kind: OperatorKind, elapsed_ms: f64);

    /// Record every successful step of an execution
    async fn record_metrics(&self, metrics: &[StepMetric]) {
        for metric in metrics.iter().filter(|m| m.success) {
            self.record(metric.kind, metric.elapsed_ms).await;
        }
    }
}

// ============================================================================
// IN-MEMORY CACHE
// ============================================================================

/// Process-local cache with per-entry TTL
#[derive(Default)]
pub struct InMemoryCacheStore {
    entries: RwLock<HashMap<String, (Value, Instant)>>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired entries
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, (_, expires)| *expires > now);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> Option<Value> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|(_, expires)| *expires > Instant::now())
            .map(|(value, _)| value.clone())
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) {
        let expires = Instant::now() + ttl;
        self.entries
            .write()
            .await
            .insert(key.to_string(), (value, expires));
    }
}

// ============================================================================
// COST HISTORY
// ============================================================================

const DEFAULT_HISTORY_WINDOW: usize = 100;

/// Per-kind cost samples, most recent first, weighted by `0.5^i`
pub struct InMemoryCostHistory {
    samples: RwLock<HashMap<OperatorKind, VecDeque<f64>>>,
    window: usize,
}

impl Default for InMemoryCostHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_WINDOW)
    }
}

impl InMemoryCostHistory {
    pub fn new(window: usize) -> Self {
        Self {
            samples: RwLock::new(HashMap::new()),
            window: window.max(1),
        }
    }

    fn weighted_average(samples: &VecDeque<f64>) -> Option<f64> {
        if samples.is_empty() {
            return None;
        }
        let mut weight = 1.0;
        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;
        for cost in samples {
            weighted_sum += cost * weight;
            weight_total += weight;
            weight *= 0.5;
        }
        Some(weighted_sum / weight_total)
    }
}

#[async_trait]
impl HistoricalCostSource for InMemoryCostHistory {
    async fn historical_cost(&self, operator: &Operator) -> Option<f64> {
        let samples = self.samples.read().await;
        samples.get(&operator.kind).and_then(Self::weighted_average)
    }

    async fn record(&self, kind: OperatorKind, elapsed_ms: f64) {
        let mut samples = self.samples.write().await;
        let history = samples.entry(kind).or_default();
        history.push_front(elapsed_ms);
        history.truncate(self.window);
    }
}
