//! Execution Orchestrator
//!
//! Runs an `ExecutionPlan` group by group:
//!
//! ```text
//! group 0: [s0, s1] ──join_all──▶ group 1: [s2] ──join_all──▶ group 2: [s3]
//! ```
//!
//! Steps inside a group are dispatched concurrently and the orchestrator
//! waits for all of them before starting the next group. A failed or timed
//! out step is recorded and never stops its siblings or later groups.

pub mod executor;
pub mod http_executor;
pub mod resilience;

pub use executor::{Executor, ExecutorRegistry};
pub use http_executor::HttpExecutor;
pub use resilience::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, ResilientExecutor, ResponseCache,
    TokenBucket,
};

use crate::error::ExecutionError;
use floatchat_types::{
    ExecutionPlan, ExecutionResult, ExecutionStep, ExecutorRequest, ExecutorResponse, StepError,
    StepMetric,
};
use futures::future::join_all;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Slack on top of a step's own timeout, so executors that enforce
/// `timeout_ms` themselves report first
pub const TIMEOUT_GRACE_MS: u64 = 50;

/// Outcome of a single step
struct StepOutcome {
    index: usize,
    elapsed_ms: f64,
    result: Result<ExecutorResponse, ExecutionError>,
}

pub struct Orchestrator {
    registry: Arc<RwLock<ExecutorRegistry>>,
}

impl Orchestrator {
    pub fn new(registry: ExecutorRegistry) -> Self {
        Self {
            registry: Arc::new(RwLock::new(registry)),
        }
    }

    pub async fn register_executor(&self, name: impl Into<String>, executor: Arc<dyn Executor>) {
        self.registry.write().await.register(name, executor);
    }

    pub async fn executor_names(&self) -> Vec<String> {
        self.registry.read().await.names()
    }

    /// Execute every step of `plan`; never fails, errors are reported per step
    pub async fn execute(&self, plan: &ExecutionPlan) -> ExecutionResult {
        let start = Instant::now();
        let registry = self.registry.read().await.clone();
        let trace_id = plan.plan_id.to_string();

        // Written once per step id, read only by later groups
        let mut outputs: HashMap<String, Value> = HashMap::new();
        let mut errors: Vec<StepError> = Vec::new();
        let mut step_metrics: Vec<StepMetric> = Vec::new();
        let mut cache_hits = 0u64;
        let mut rows_processed = 0u64;

        tracing::info!(
            plan_id = %plan.plan_id,
            steps = plan.steps.len(),
            groups = plan.parallel_groups.len(),
            "Executing plan"
        );

        for (group_index, group) in plan.parallel_groups.iter().enumerate() {
            let dispatches = group
                .iter()
                .filter_map(|&index| plan.steps.get(index).map(|step| (index, step)))
                .map(|(index, step)| {
                    let request = build_request(step, &outputs, &trace_id);
                    let executor = registry.get(&step.target_executor);
                    run_step(index, step, executor, request)
                });

            let outcomes = join_all(dispatches).await;
            tracing::debug!(group = group_index, steps = outcomes.len(), "Group complete");

            for outcome in outcomes {
                let step = &plan.steps[outcome.index];
                let step_id = step.id().to_string();

                let failure = match outcome.result {
                    Ok(response) if response.success => {
                        if response.from_cache() {
                            cache_hits += 1;
                        }
                        rows_processed += response.rows_count();
                        outputs.insert(step_id.clone(), response.data);
                        None
                    }
                    Ok(response) => {
                        let (code, message) = match response.error {
                            Some(e) => (e.code, e.message),
                            None => ("EXECUTOR_ERROR".to_string(), "Unknown error".to_string()),
                        };
                        Some(ExecutionError::Executor {
                            step: step_id.clone(),
                            code,
                            message,
                        })
                    }
                    Err(e) => Some(e),
                };

                let success = failure.is_none();
                if let Some(err) = failure {
                    tracing::error!(step = %step_id, error = %err, "Step failed");
                    errors.push(err.into_step_error(&step_id));
                }
                step_metrics.push(StepMetric {
                    operator_id: step_id,
                    kind: step.operator.kind,
                    elapsed_ms: outcome.elapsed_ms,
                    success,
                });
            }
        }

        let data = aggregate_data(plan, &outputs);
        let total = plan.steps.len();
        let confidence = if total == 0 {
            0.0
        } else {
            1.0 - errors.len() as f64 / total as f64
        };
        let execution_time_ms = start.elapsed().as_secs_f64() * 1000.0;

        tracing::info!(
            plan_id = %plan.plan_id,
            failed = errors.len(),
            cache_hits,
            rows_processed,
            execution_time_ms,
            "Plan executed"
        );

        ExecutionResult {
            success: errors.is_empty(),
            data,
            confidence,
            cache_hits,
            rows_processed,
            execution_time_ms,
            errors,
            step_metrics,
        }
    }
}

/// Operator params plus the outputs of completed dependencies
fn build_request(
    step: &ExecutionStep,
    outputs: &HashMap<String, Value>,
    trace_id: &str,
) -> ExecutorRequest {
    let mut params = step.operator.params.clone();

    // Single slot: the last available dependency wins
    for dep in &step.depends_on {
        if let Some(output) = outputs.get(dep) {
            params.insert("input_data".into(), output.clone());
        }
    }

    if step.depends_on.len() > 1 {
        let inputs: Map<String, Value> = step
            .depends_on
            .iter()
            .filter_map(|dep| outputs.get(dep).map(|v| (dep.clone(), v.clone())))
            .collect();
        params.insert("inputs".into(), Value::Object(inputs));
    }

    ExecutorRequest::new(step.operator.kind.as_str(), params, step.timeout_ms)
        .with_trace_id(trace_id)
}

async fn run_step(
    index: usize,
    step: &ExecutionStep,
    executor: Option<Arc<dyn Executor>>,
    request: ExecutorRequest,
) -> StepOutcome {
    let started = Instant::now();
    let step_id = step.id().to_string();

    let result = match executor {
        None => Err(ExecutionError::UnknownExecutor {
            step: step_id,
            executor: step.target_executor.clone(),
        }),
        Some(executor) => {
            tracing::debug!(step = %step_id, executor = executor.name(), "Dispatching step");
            let limit = Duration::from_millis(step.timeout_ms.saturating_add(TIMEOUT_GRACE_MS));
            match tokio::time::timeout(limit, executor.execute(request)).await {
                Ok(result) => result,
                Err(_) => Err(ExecutionError::Timeout {
                    step: step_id,
                    timeout_ms: step.timeout_ms,
                }),
            }
        }
    };

    StepOutcome {
        index,
        elapsed_ms: started.elapsed().as_secs_f64() * 1000.0,
        result,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Profile-like payload of a step output, if any
fn profile_payload(data: &Value) -> Option<Value> {
    match data {
        Value::Array(items) if !items.is_empty() => Some(data.clone()),
        Value::Object(map) if map.contains_key("profiles") => map.get("profiles").cloned(),
        Value::Object(map) => map.get("data").filter(|d| is_truthy(d)).cloned(),
        _ => None,
    }
}

/// Primary payload: the last profile-like output, overlaid with the
/// terminal step's object; otherwise the terminal step's output.
fn aggregate_data(plan: &ExecutionPlan, outputs: &HashMap<String, Value>) -> Value {
    let Some(last) = plan.steps.last() else {
        return Value::Null;
    };

    let mut profiles: Option<Value> = None;
    for step in &plan.steps {
        if let Some(data) = outputs.get(step.id()).filter(|d| is_truthy(d)) {
            if let Some(payload) = profile_payload(data) {
                profiles = Some(payload);
            }
        }
    }

    let last_data = outputs.get(last.id()).cloned().unwrap_or(Value::Null);

    match profiles.filter(is_truthy) {
        Some(profiles) => {
            let count = profiles.as_array().map(Vec::len).unwrap_or(0);
            let mut combined = Map::new();
            combined.insert("profiles".into(), profiles);
            combined.insert("count".into(), Value::from(count));
            if let Value::Object(overlay) = last_data {
                combined.extend(overlay);
            }
            Value::Object(combined)
        }
        None => last_data,
    }
}
