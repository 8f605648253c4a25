//! End-to-end behaviour across parser, planner, security and orchestrator

use async_trait::async_trait;
use floatchat::domain::DomainKnowledge;
use floatchat::nl2op::operator_generator::new_operator;
use floatchat::orchestrator::{Executor, ExecutorRegistry, Orchestrator};
use floatchat::planner::QueryPlanner;
use floatchat::security::SecurityBridge;
use floatchat::types::{
    Edge, ExecutorRequest, ExecutorResponse, ExtractedEntities, OperatorKind, Params, ParseMode,
    QueryIntent, SemanticOperatorDAG, TemporalKind, ThreatLevel,
};
use floatchat::{ExecutionError, ParseContext, SemanticParser};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

fn parser() -> SemanticParser {
    SemanticParser::new(Arc::new(DomainKnowledge::builtin().unwrap())).unwrap()
}

fn dag(operators: Vec<floatchat::types::Operator>, edges: Vec<Edge>) -> SemanticOperatorDAG {
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

/// Records `start:`/`end:` events per operation, failing the listed ones
struct Recorder {
    name: &'static str,
    events: Arc<Mutex<Vec<String>>>,
    delay: Duration,
    fail: Vec<&'static str>,
}

#[async_trait]
impl Executor for Recorder {
    fn name(&self) -> &str {
        self.name
    }

    async fn execute(&self, request: ExecutorRequest) -> Result<ExecutorResponse, ExecutionError> {
        self.events
            .lock()
            .await
            .push(format!("start:{}", request.operation));
        tokio::time::sleep(self.delay).await;
        self.events
            .lock()
            .await
            .push(format!("end:{}", request.operation));

        if self.fail.contains(&request.operation.as_str()) {
            Ok(ExecutorResponse::failed("QUERY_FAILED", "no such table"))
        } else {
            Ok(ExecutorResponse::ok(json!({"op": request.operation})))
        }
    }
}

// ============================================================================
// PARSING
// ============================================================================

#[test]
fn arabian_sea_2020() {
    let dag = parser().parse(
        "Show temperature in the Arabian Sea for 2020",
        &ParseContext::new(),
        ParseMode::Explorer,
    );

    assert_eq!(dag.entities.spatial.len(), 1);
    let region = &dag.entities.spatial[0];
    assert_eq!(region.name, "Arabian Sea");
    assert!(region.bbox.is_some());

    assert_eq!(dag.entities.temporal.len(), 1);
    let year = &dag.entities.temporal[0];
    assert_eq!(year.kind, TemporalKind::Year);
    assert_eq!(year.start.date().to_string(), "2020-01-01");
    assert_eq!(year.end.date().to_string(), "2020-12-31");

    assert!(dag.operators.iter().filter(|o| o.kind.is_filter()).count() >= 2);
    assert_eq!(
        dag.operators.last().map(|o| o.kind),
        Some(OperatorKind::Visualize)
    );
}

#[test]
fn greeting_is_not_understood() {
    let dag = parser().parse("hello", &ParseContext::new(), ParseMode::Explorer);
    assert!(dag.confidence < 0.5);
}

// ============================================================================
// SECURITY
// ============================================================================

#[tokio::test]
async fn sql_injection_blocked_at_first_stage() {
    let v = SecurityBridge::new()
        .validate("'; DROP TABLE profiles; --", None, None)
        .await;
    assert!(!v.passed);
    assert_eq!(v.threat_level, ThreatLevel::Blocked);
    assert_eq!(v.stage_reached, 1);
    assert!(v.latency_ms < 10.0, "took {}ms", v.latency_ms);
}

#[tokio::test]
async fn plain_question_passes_at_first_stage() {
    let v = SecurityBridge::new()
        .validate("show temperature in the Arabian Sea", None, None)
        .await;
    assert!(v.passed);
    assert_eq!(v.threat_level, ThreatLevel::Safe);
    assert_eq!(v.stage_reached, 1);
}

// ============================================================================
// EXECUTION
// ============================================================================

#[tokio::test]
async fn failed_step_is_reported_not_raised() {
    let filter = new_operator(OperatorKind::SpatialFilter, Params::new());
    let stats = new_operator(OperatorKind::ComputeStats, Params::new());
    let filter_id = filter.id.clone();
    let edges = vec![Edge::new(filter.id.clone(), stats.id.clone())];
    let plan = QueryPlanner::new()
        .plan(&dag(vec![filter, stats], edges), None)
        .await
        .unwrap();

    let events = Arc::new(Mutex::new(Vec::new()));
    let mut registry = ExecutorRegistry::new();
    registry.register_named(Arc::new(Recorder {
        name: "structured",
        events: events.clone(),
        delay: Duration::ZERO,
        fail: vec!["SPATIAL_FILTER"],
    }));
    registry.register_named(Arc::new(Recorder {
        name: "profile",
        events,
        delay: Duration::ZERO,
        fail: Vec::new(),
    }));

    let result = Orchestrator::new(registry).execute(&plan).await;
    assert!(!result.success);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].step, filter_id);
}

#[tokio::test]
async fn group_is_fully_dispatched_before_the_next() {
    let spatial = new_operator(OperatorKind::SpatialFilter, Params::new());
    let temporal = new_operator(OperatorKind::TemporalFilter, Params::new());
    let join = new_operator(OperatorKind::Join, Params::new());
    let edges = vec![
        Edge::new(spatial.id.clone(), join.id.clone()),
        Edge::new(temporal.id.clone(), join.id.clone()),
    ];
    let plan = QueryPlanner::new()
        .plan(&dag(vec![spatial, temporal, join], edges), None)
        .await
        .unwrap();
    assert_eq!(plan.parallel_groups.len(), 2);
    assert_eq!(plan.parallel_groups[0].len(), 2);

    let events = Arc::new(Mutex::new(Vec::new()));
    let mut registry = ExecutorRegistry::new();
    registry.register_named(Arc::new(Recorder {
        name: "structured",
        events: events.clone(),
        delay: Duration::from_millis(30),
        fail: Vec::new(),
    }));

    let result = Orchestrator::new(registry).execute(&plan).await;
    assert!(result.success, "errors: {:?}", result.errors);

    let events = events.lock().await;
    let at = |event: &str| events.iter().position(|e| e == event).unwrap();
    let join_start = at("start:JOIN");
    for first in ["SPATIAL_FILTER", "TEMPORAL_FILTER"] {
        assert!(at(&format!("start:{}", first)) < join_start);
        assert!(at(&format!("end:{}", first)) < join_start);
    }
    // Siblings overlap: both started before either finished
    let first_end = at("end:SPATIAL_FILTER").min(at("end:TEMPORAL_FILTER"));
    assert!(at("start:SPATIAL_FILTER") < first_end);
    assert!(at("start:TEMPORAL_FILTER") < first_end);
}
