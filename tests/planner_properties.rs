//! Planner properties over generated operator graphs

use floatchat::catalog::base_cost;
use floatchat::memory::{CacheStore, InMemoryCacheStore};
use floatchat::nl2op::operator_generator::new_operator;
use floatchat::planner::{
    cache_key, optimize_for_deadline, topological_sort, CostEstimator, QueryPlanner,
};
use floatchat::types::{
    Edge, ExecutionStep, ExtractedEntities, OperatorKind, Params, ParseMode, QueryIntent,
    SemanticOperatorDAG,
};
use proptest::prelude::*;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Operators `op0..opN` with edges only from lower to higher rank, listed
/// in a shuffled order so the sort has real work to do
fn build_dag(kinds: Vec<usize>, flags: Vec<bool>, order: Vec<usize>) -> SemanticOperatorDAG {
    let n = kinds.len();
    let mut operators = Vec::with_capacity(n);
    for &rank in &order {
        let mut op = new_operator(OperatorKind::ALL[kinds[rank]], Params::new());
        op.id = format!("op{}", rank);
        operators.push(op);
    }

    let mut edges = Vec::new();
    for from in 0..n {
        for to in (from + 1)..n {
            if flags[from * n + to] {
                edges.push(Edge::new(format!("op{}", from), format!("op{}", to)));
            }
        }
    }

    SemanticOperatorDAG {
        operators,
        edges,
        confidence: 0.9,
        intent: QueryIntent::GeneralQuery,
        entities: ExtractedEntities::new(),
        alternatives: Vec::new(),
        mode: ParseMode::Explorer,
    }
}

fn arb_dag() -> impl Strategy<Value = SemanticOperatorDAG> {
    (1usize..10)
        .prop_flat_map(|n| {
            (
                prop::collection::vec(0..OperatorKind::ALL.len(), n),
                prop::collection::vec(any::<bool>(), n * n),
                Just((0..n).collect::<Vec<usize>>()).prop_shuffle(),
            )
        })
        .prop_map(|(kinds, flags, order)| build_dag(kinds, flags, order))
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn topological_order_respects_every_edge(dag in arb_dag()) {
        let order = topological_sort(&dag).unwrap();
        prop_assert_eq!(order.len(), dag.operators.len());

        let mut position = HashMap::new();
        for (pos, &idx) in order.iter().enumerate() {
            prop_assert!(position.insert(dag.operators[idx].id.clone(), pos).is_none());
        }
        for edge in &dag.edges {
            prop_assert!(position[&edge.from_id] < position[&edge.to_id]);
        }
    }

    #[test]
    fn every_step_runs_after_its_dependencies(dag in arb_dag()) {
        let plan = runtime().block_on(QueryPlanner::new().plan(&dag, None)).unwrap();

        let mut group_of = HashMap::new();
        for (g, group) in plan.parallel_groups.iter().enumerate() {
            for &idx in group {
                prop_assert!(group_of.insert(plan.steps[idx].id().to_string(), g).is_none());
            }
        }
        prop_assert_eq!(group_of.len(), plan.steps.len());

        for step in &plan.steps {
            for dep in &step.depends_on {
                prop_assert!(group_of[step.id()] > group_of[dep.as_str()]);
            }
        }
    }

    #[test]
    fn compliant_plans_are_left_alone(dag in arb_dag(), slack in 0.0f64..500.0) {
        let plan = runtime().block_on(QueryPlanner::new().plan(&dag, None)).unwrap();
        let mut steps: Vec<ExecutionStep> = plan.steps.clone();
        let deadline = plan.estimated_cost + slack;

        let applied = optimize_for_deadline(&mut steps, deadline);
        prop_assert!(applied.is_empty());
        prop_assert_eq!(steps, plan.steps);
    }
}

#[tokio::test]
async fn cached_operators_cost_at_most_a_tenth() {
    let cache = Arc::new(InMemoryCacheStore::new());
    let estimator = CostEstimator::new().with_cache_store(cache.clone());

    for kind in OperatorKind::ALL {
        let params = match kind {
            OperatorKind::SpatialFilter => json!({"bbox": [50.0, -10.0, 75.0, 25.0]}),
            _ => json!({}),
        };
        let Some(params) = params.as_object().cloned() else {
            unreachable!()
        };
        let op = new_operator(kind, params);

        let uncached = estimator.estimate(&op).await;
        assert!(!uncached.cached);
        if kind == OperatorKind::SpatialFilter {
            // 25 x 35 degrees scales the base cost by 1.875
            assert!((uncached.cost - base_cost(kind) * 1.875).abs() < 1e-9);
        }

        cache
            .set(&cache_key(&op), json!({"rows": 1}), Duration::from_secs(60))
            .await;
        let cached = estimator.estimate(&op).await;
        assert!(cached.cached);
        assert!(
            cached.cost <= uncached.cost * 0.1,
            "{}: {} vs {}",
            kind,
            cached.cost,
            uncached.cost
        );
    }
}
