//! Operator cost estimation and cache keys
//!
//! Cost pipeline per operator:
//!
//! ```text
//! base (catalog) × selectivity → × 0.05 if cached → 0.7·current + 0.3·historical
//! ```
//!
//! Cache keys are content-addressed: the same kind with the same params
//! always maps to the same key, regardless of param insertion order.

use crate::catalog;
use crate::memory::{CacheStore, HistoricalCostSource};
use floatchat_types::{BoundingBox, Operator, OperatorKind};
use futures::future::join_all;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Multiplier applied when an operator's result is already cached
pub const CACHE_DISCOUNT: f64 = 0.05;

/// Weight of the current estimate when blending with history
pub const CURRENT_WEIGHT: f64 = 0.7;
pub const HISTORICAL_WEIGHT: f64 = 0.3;

const TEMPORAL_SELECTIVITY: f64 = 1.5;

// ---------------------------------------------------------------------------
// Cache keys
// ---------------------------------------------------------------------------

/// Re-emit a JSON value with object keys sorted at every level
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, Value> =
                map.iter().map(|(k, v)| (k, canonicalize(v))).collect();
            let mut out = serde_json::Map::new();
            for (k, v) in sorted {
                out.insert(k.clone(), v);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Canonical JSON text of a value (sorted keys, compact)
pub fn canonical_json(value: &Value) -> String {
    canonicalize(value).to_string()
}

/// `op:` + first 16 hex chars of `SHA-256("KIND:" + canonical params)`
pub fn cache_key(operator: &Operator) -> String {
    let params = canonical_json(&Value::Object(operator.params.clone()));
    let material = format!("{}:{}", operator.kind.as_str(), params);
    let hash = Sha256::digest(material.as_bytes());
    format!("op:{}", &hex::encode(hash)[..16])
}

// ---------------------------------------------------------------------------
// Estimation
// ---------------------------------------------------------------------------

/// Base cost scaled by how much data the operator is expected to touch
pub fn selectivity_cost(operator: &Operator) -> f64 {
    let base = catalog::base_cost(operator.kind);
    match operator.kind {
        OperatorKind::SpatialFilter => {
            let area = operator
                .params
                .get("bbox")
                .and_then(|v| serde_json::from_value::<BoundingBox>(v.clone()).ok())
                .map(|bbox| bbox.area())
                .unwrap_or(0.0);
            base * (1.0 + area / 1000.0)
        }
        OperatorKind::TemporalFilter => base * TEMPORAL_SELECTIVITY,
        _ => base,
    }
}

/// Breakdown of one operator's estimate
#[derive(Debug, Clone, PartialEq)]
pub struct CostEstimate {
    pub cache_key: String,
    pub selectivity_cost: f64,
    pub cached: bool,
    pub historical_cost: Option<f64>,
    /// Final estimate in milliseconds
    pub cost: f64,
}

/// Cost estimator backed by optional advisory sources
#[derive(Clone, Default)]
pub struct CostEstimator {
    cache: Option<Arc<dyn CacheStore>>,
    history: Option<Arc<dyn HistoricalCostSource>>,
}

impl CostEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache_store(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_cost_history(mut self, history: Arc<dyn HistoricalCostSource>) -> Self {
        self.history = Some(history);
        self
    }

    pub async fn estimate(&self, operator: &Operator) -> CostEstimate {
        let key = cache_key(operator);
        let selectivity = selectivity_cost(operator);

        let cached = match &self.cache {
            Some(cache) => cache.get(&key).await.is_some(),
            None => false,
        };
        let mut cost = if cached {
            selectivity * CACHE_DISCOUNT
        } else {
            selectivity
        };

        let historical_cost = match &self.history {
            Some(history) => history.historical_cost(operator).await,
            None => None,
        };
        if let Some(historical) = historical_cost {
            cost = CURRENT_WEIGHT * cost + HISTORICAL_WEIGHT * historical;
        }

        CostEstimate {
            cache_key: key,
            selectivity_cost: selectivity,
            cached,
            historical_cost,
            cost,
        }
    }

    /// Estimate every operator; lookups run concurrently, results keep input order
    pub async fn estimate_all(&self, operators: &[Operator]) -> Vec<CostEstimate> {
        join_all(operators.iter().map(|op| self.estimate(op))).await
    }
}
