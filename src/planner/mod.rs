//! Query Planner
//!
//! Turns a `SemanticOperatorDAG` into an `ExecutionPlan`:
//!
//! 1. Topological order (Kahn, stable) - a cycle or dangling edge is fatal
//! 2. Per-operator cost estimation (cache and history aware)
//! 3. Deadline degradation when the total exceeds the budget
//! 4. Cache keys, timeouts and cache strategy over the surviving steps
//! 5. Parallel groups

pub mod cost;
pub mod dag;
pub mod degrade;

pub use cost::{cache_key, canonical_json, CostEstimate, CostEstimator};
pub use dag::{parallel_groups, topological_sort};
pub use degrade::{optimize_for_deadline, DegradationPhase};

use crate::error::DagError;
use crate::memory::{CacheStore, HistoricalCostSource};
use floatchat_types::{
    CacheStrategy, ExecutionPlan, ExecutionStep, Operator, OperatorKind, SemanticOperatorDAG,
};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Lower bound for any step timeout
pub const MIN_STEP_TIMEOUT_MS: u64 = 1000;
/// Step timeout as a multiple of its estimated cost
pub const TIMEOUT_COST_MULTIPLIER: f64 = 3.0;

/// Cache TTLs in seconds
pub const FILTER_TTL_SECS: u64 = 3600;
pub const VISUALIZATION_TTL_SECS: u64 = 300;
pub const DEFAULT_TTL_SECS: u64 = 1800;

pub fn step_timeout_ms(estimated_cost: f64) -> u64 {
    let scaled = (TIMEOUT_COST_MULTIPLIER * estimated_cost).ceil();
    if scaled.is_finite() && scaled > MIN_STEP_TIMEOUT_MS as f64 {
        scaled as u64
    } else {
        MIN_STEP_TIMEOUT_MS
    }
}

pub fn ttl_secs(kind: OperatorKind) -> u64 {
    match kind {
        OperatorKind::SpatialFilter | OperatorKind::TemporalFilter => FILTER_TTL_SECS,
        OperatorKind::Visualize => VISUALIZATION_TTL_SECS,
        _ => DEFAULT_TTL_SECS,
    }
}

#[derive(Clone, Default)]
pub struct QueryPlanner {
    estimator: CostEstimator,
}

impl QueryPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache_store(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.estimator = self.estimator.with_cache_store(cache);
        self
    }

    pub fn with_cost_history(mut self, history: Arc<dyn HistoricalCostSource>) -> Self {
        self.estimator = self.estimator.with_cost_history(history);
        self
    }

    /// Build an execution plan, degrading it when `deadline_ms` is exceeded
    pub async fn plan(
        &self,
        dag: &SemanticOperatorDAG,
        deadline_ms: Option<u64>,
    ) -> Result<ExecutionPlan, DagError> {
        let order = topological_sort(dag)?;
        let estimates = self.estimator.estimate_all(&dag.operators).await;

        let mut steps: Vec<ExecutionStep> = order
            .iter()
            .map(|&idx| {
                let mut operator = dag.operators[idx].clone();
                operator.estimated_cost = estimates[idx].cost;
                let mut depends_on: Vec<String> = Vec::new();
                for dep in dag.dependencies_of(&operator.id) {
                    if !depends_on.iter().any(|d| d == dep) {
                        depends_on.push(dep.to_string());
                    }
                }
                ExecutionStep {
                    target_executor: operator.target_executor.clone(),
                    operator,
                    cache_key: None,
                    timeout_ms: MIN_STEP_TIMEOUT_MS,
                    depends_on,
                }
            })
            .collect();

        let mut initial: HashMap<String, CostEstimate> = dag
            .operators
            .iter()
            .map(|op| op.id.clone())
            .zip(estimates)
            .collect();

        if let Some(deadline) = deadline_ms {
            let applied = optimize_for_deadline(&mut steps, deadline as f64);
            if !applied.is_empty() {
                let phases: Vec<String> = applied.iter().map(|p| p.to_string()).collect();
                tracing::debug!(phases = ?phases, "Applied degradation phases");
            }
        }

        // Keys, cache discounts and timeouts reflect the final (possibly
        // degraded) params and costs
        let mut cache_strategy = CacheStrategy {
            enable_cache: true,
            ..Default::default()
        };
        let mut cached = 0usize;
        for (i, step) in steps.iter_mut().enumerate() {
            let Some(estimate) = initial.remove(step.id()) else {
                continue;
            };
            let key = cache_key(&step.operator);
            let estimate = if key == estimate.cache_key {
                estimate
            } else {
                self.reestimate(&mut step.operator, &estimate).await
            };
            if estimate.cached {
                cached += 1;
            }
            step.timeout_ms = step_timeout_ms(step.operator.estimated_cost);
            cache_strategy.cacheable_steps.push(i);
            cache_strategy
                .ttl_policy
                .insert(key.clone(), ttl_secs(step.operator.kind));
            step.cache_key = Some(key);
        }

        let position: HashMap<&str, usize> = steps
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id(), i))
            .collect();
        let step_deps: Vec<Vec<usize>> = steps
            .iter()
            .map(|s| {
                s.depends_on
                    .iter()
                    .filter_map(|d| position.get(d.as_str()).copied())
                    .collect()
            })
            .collect();
        let groups = parallel_groups(&step_deps);

        let estimated_cost = steps.iter().map(|s| s.operator.estimated_cost).sum();

        let plan = ExecutionPlan {
            plan_id: Uuid::new_v4(),
            steps,
            estimated_cost,
            cache_strategy,
            parallel_groups: groups,
            deadline_ms,
        };

        tracing::info!(
            plan_id = %plan.plan_id,
            steps = plan.steps.len(),
            groups = plan.parallel_groups.len(),
            cached,
            estimated_cost_ms = plan.estimated_cost,
            "Built execution plan"
        );

        Ok(plan)
    }

    /// Degradation rewrote the operator's params, so its cache key moved.
    /// Look up the new key and keep the degradation factor already applied.
    async fn reestimate(&self, operator: &mut Operator, before: &CostEstimate) -> CostEstimate {
        let factor = if before.cost > 0.0 {
            operator.estimated_cost / before.cost
        } else {
            1.0
        };
        let fresh = self.estimator.estimate(operator).await;
        operator.estimated_cost = fresh.cost * factor;
        fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DomainKnowledge;
    use crate::memory::InMemoryCacheStore;
    use crate::nl2op::{ParseContext, SemanticParser};
    use floatchat_types::ParseMode;
    use serde_json::json;
    use std::time::Duration;

    fn parse(query: &str) -> SemanticOperatorDAG {
        let parser = SemanticParser::new(Arc::new(DomainKnowledge::builtin().unwrap())).unwrap();
        parser.parse(query, &ParseContext::new(), ParseMode::Explorer)
    }

    fn unlinked(operators: Vec<Operator>) -> SemanticOperatorDAG {
        SemanticOperatorDAG {
            operators,
            edges: Vec::new(),
            confidence: 0.9,
            intent: floatchat_types::QueryIntent::GeneralQuery,
            entities: floatchat_types::ExtractedEntities::new(),
            alternatives: Vec::new(),
            mode: ParseMode::Explorer,
        }
    }

    fn year_2020() -> Operator {
        let params = json!({"start": "2020-01-01T00:00:00", "end": "2020-12-31T00:00:00"});
        let serde_json::Value::Object(params) = params else {
            unreachable!()
        };
        crate::nl2op::operator_generator::new_operator(OperatorKind::TemporalFilter, params)
    }

    fn mld() -> Operator {
        crate::nl2op::operator_generator::new_operator(
            OperatorKind::ComputeMld,
            floatchat_types::Params::new(),
        )
    }

    #[test]
    fn test_step_timeout() {
        assert_eq!(step_timeout_ms(10.0), 1000);
        assert_eq!(step_timeout_ms(400.0), 1200);
        assert_eq!(step_timeout_ms(f64::NAN), 1000);
    }

    #[tokio::test]
    async fn test_plan_for_chain() {
        let dag = parse("Show temperature in the Arabian Sea for 2020");
        let plan = QueryPlanner::new().plan(&dag, None).await.unwrap();

        assert_eq!(plan.steps.len(), dag.operators.len());
        assert_eq!(plan.parallel_groups.len(), plan.steps.len());
        assert_eq!(
            plan.steps.last().map(|s| s.operator.kind),
            Some(OperatorKind::Visualize)
        );
        assert_eq!(plan.cache_strategy.cacheable_steps.len(), plan.steps.len());
        for step in &plan.steps {
            assert!(step.timeout_ms >= MIN_STEP_TIMEOUT_MS);
            let key = step.cache_key.as_ref().unwrap();
            assert_eq!(
                plan.cache_strategy.ttl_policy[key],
                ttl_secs(step.operator.kind)
            );
        }
        assert!((plan.estimated_cost - plan.total_step_cost()).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_cached_steps_are_cheaper() {
        let dag = parse("Show temperature in the Arabian Sea for 2020");
        let cold = QueryPlanner::new().plan(&dag, None).await.unwrap();

        let cache = Arc::new(InMemoryCacheStore::new());
        for step in &cold.steps {
            let key = step.cache_key.as_ref().unwrap();
            cache.set(key, json!([]), Duration::from_secs(60)).await;
        }
        let warm = QueryPlanner::new()
            .with_cache_store(cache)
            .plan(&dag, None)
            .await
            .unwrap();
        assert!(warm.estimated_cost < cold.estimated_cost * 0.1);
    }

    #[tokio::test]
    async fn test_tight_deadline_drops_visualization() {
        let dag = parse("Show temperature in the Arabian Sea for 2020");
        let plan = QueryPlanner::new().plan(&dag, Some(50)).await.unwrap();
        assert!(plan
            .steps
            .iter()
            .all(|s| s.operator.kind != OperatorKind::Visualize));
        assert_eq!(plan.deadline_ms, Some(50));
        // Groups cover exactly the surviving steps
        let covered: usize = plan.parallel_groups.iter().map(Vec::len).sum();
        assert_eq!(covered, plan.steps.len());
    }

    #[tokio::test]
    async fn test_sampled_step_loses_stale_cache_discount() {
        // Cached under its full-data key, but sampling changes the key
        let temporal = year_2020();
        let cache = Arc::new(InMemoryCacheStore::new());
        cache
            .set(&cache_key(&temporal), json!([]), Duration::from_secs(60))
            .await;

        // 2.25 + 200 over 90: fast mode, then sampling
        let plan = QueryPlanner::new()
            .with_cache_store(cache)
            .plan(&unlinked(vec![temporal, mld()]), Some(90))
            .await
            .unwrap();

        let step = plan
            .steps
            .iter()
            .find(|s| s.operator.kind == OperatorKind::TemporalFilter)
            .unwrap();
        assert_eq!(step.operator.params["sample_rate"], json!(0.5));
        assert_eq!(step.cache_key.as_deref(), Some(cache_key(&step.operator).as_str()));
        // Full selectivity cost (30 x 1.5) with only the sampling factor
        assert!((step.operator.estimated_cost - 27.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_sampled_step_uses_cache_under_its_final_key() {
        let temporal = year_2020();
        let mut sampled = temporal.clone();
        sampled.params.insert("sample_rate".into(), json!(0.5));
        let cache = Arc::new(InMemoryCacheStore::new());
        cache
            .set(&cache_key(&sampled), json!([]), Duration::from_secs(60))
            .await;

        let plan = QueryPlanner::new()
            .with_cache_store(cache)
            .plan(&unlinked(vec![temporal, mld()]), Some(90))
            .await
            .unwrap();

        let step = plan
            .steps
            .iter()
            .find(|s| s.operator.kind == OperatorKind::TemporalFilter)
            .unwrap();
        assert_eq!(step.cache_key.as_deref(), Some(cache_key(&sampled).as_str()));
        // 45 x 0.05 discount x 0.6 sampling
        assert!((step.operator.estimated_cost - 1.35).abs() < 1e-9);
        let compute = plan
            .steps
            .iter()
            .find(|s| s.operator.kind == OperatorKind::ComputeMld)
            .unwrap();
        assert!((compute.operator.estimated_cost - 100.0).abs() < 1e-9);
    }
}
