//! Execution plans produced by the query planner

use crate::operator::Operator;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// One operator bound to an executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStep {
    pub operator: Operator,
    pub target_executor: String,
    pub cache_key: Option<String>,
    pub timeout_ms: u64,
    /// Operator ids this step waits for
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl ExecutionStep {
    pub fn id(&self) -> &str {
        &self.operator.id
    }
}

/// Caching hints handed to the executors
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStrategy {
    /// Indices into `ExecutionPlan::steps`
    pub cacheable_steps: Vec<usize>,
    /// cache key -> TTL in seconds
    pub ttl_policy: BTreeMap<String, u64>,
    pub enable_cache: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub plan_id: Uuid,
    /// Steps in topological order
    pub steps: Vec<ExecutionStep>,
    /// Sum of step costs in milliseconds
    pub estimated_cost: f64,
    pub cache_strategy: CacheStrategy,
    /// Ordered partition of step indices; groups run one after another,
    /// steps inside a group run concurrently
    pub parallel_groups: Vec<Vec<usize>>,
    pub deadline_ms: Option<u64>,
}

impl ExecutionPlan {
    pub fn step_index(&self, operator_id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.operator.id == operator_id)
    }

    /// Group position of a step index
    pub fn group_of(&self, step_index: usize) -> Option<usize> {
        self.parallel_groups
            .iter()
            .position(|g| g.contains(&step_index))
    }

    pub fn total_step_cost(&self) -> f64 {
        self.steps.iter().map(|s| s.operator.estimated_cost).sum()
    }
}
