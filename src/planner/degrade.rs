//! Deadline-aware plan degradation
//!
//! Best effort: phases run in a fixed order and stop as soon as the plan
//! fits. A plan that already fits is returned untouched.

use floatchat_types::{ExecutionStep, OperatorKind};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

/// Cost ratio above which VISUALIZE steps are dropped
pub const DROP_VISUALIZATION_RATIO: f64 = 1.5;
pub const FAST_MODE_FACTOR: f64 = 0.5;
pub const SAMPLE_RATE: f64 = 0.5;
pub const SAMPLING_FACTOR: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradationPhase {
    DropVisualization,
    FastMode,
    Sampling,
}

impl fmt::Display for DegradationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DegradationPhase::DropVisualization => "drop_visualization",
            DegradationPhase::FastMode => "fast_mode",
            DegradationPhase::Sampling => "sampling",
        };
        write!(f, "{}", name)
    }
}

fn total_cost(steps: &[ExecutionStep]) -> f64 {
    steps.iter().map(|s| s.operator.estimated_cost).sum()
}

/// Shrink `steps` toward `deadline_ms`, returning the phases that changed
/// something.
///
/// Dropped steps are also removed from every surviving step's `depends_on`.
pub fn optimize_for_deadline(
    steps: &mut Vec<ExecutionStep>,
    deadline_ms: f64,
) -> Vec<DegradationPhase> {
    let mut applied = Vec::new();
    let before = total_cost(steps);
    if before <= deadline_ms {
        return applied;
    }

    // Phase 1: visualization is the most expensive and least essential step
    if before > DROP_VISUALIZATION_RATIO * deadline_ms {
        let dropped: HashSet<String> = steps
            .iter()
            .filter(|s| s.operator.kind == OperatorKind::Visualize)
            .map(|s| s.operator.id.clone())
            .collect();
        if !dropped.is_empty() {
            steps.retain(|s| !dropped.contains(&s.operator.id));
            for step in steps.iter_mut() {
                step.depends_on.retain(|d| !dropped.contains(d));
            }
            applied.push(DegradationPhase::DropVisualization);
        }
    }

    // Phase 2: reduced-precision profile computations
    if total_cost(steps) > deadline_ms {
        let mut changed = false;
        for step in steps
            .iter_mut()
            .filter(|s| s.operator.kind.supports_fast_mode())
        {
            step.operator
                .params
                .insert("fast_mode".into(), Value::Bool(true));
            step.operator.estimated_cost *= FAST_MODE_FACTOR;
            changed = true;
        }
        if changed {
            applied.push(DegradationPhase::FastMode);
        }
    }

    // Phase 3: sample the row-scanning filters
    if total_cost(steps) > deadline_ms {
        let mut changed = false;
        for step in steps
            .iter_mut()
            .filter(|s| s.operator.kind.supports_sampling())
        {
            step.operator
                .params
                .insert("sample_rate".into(), Value::from(SAMPLE_RATE));
            step.operator.estimated_cost *= SAMPLING_FACTOR;
            changed = true;
        }
        if changed {
            applied.push(DegradationPhase::Sampling);
        }
    }

    let after = total_cost(steps);
    if after > deadline_ms {
        tracing::warn!(
            before_ms = before,
            after_ms = after,
            deadline_ms,
            "Plan still exceeds deadline after degradation"
        );
    } else {
        tracing::info!(
            before_ms = before,
            after_ms = after,
            deadline_ms,
            phases = applied.len(),
            "Plan degraded to meet deadline"
        );
    }

    applied
}
