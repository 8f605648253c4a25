//! Query engine facade
//!
//! Wires the stages into one request path:
//!
//! ```text
//! query ─▶ parse ─▶ screen ─▶ (clarify?) ─▶ plan ─▶ execute ─▶ record timings
//! ```
//!
//! Screening runs before the clarification check so that a hostile query
//! never gets alternatives back.

use crate::config::EngineConfig;
use crate::domain::DomainKnowledge;
use crate::error::{EngineError, Result, ValidationError};
use crate::llm::OpenAiCompatClient;
use crate::memory::{CacheStore, HistoricalCostSource, InMemoryCostHistory};
use crate::nl2op::{ParseContext, SemanticParser};
use crate::orchestrator::{ExecutorRegistry, HttpExecutor, Orchestrator, ResilientExecutor};
use crate::planner::QueryPlanner;
use crate::security::{LlmEscalation, SecurityBridge, TokenBucketRateLimiter};
use floatchat_types::{
    ExecutionPlan, ExecutionResult, OperatorKind, ParseMode, SecurityValidation,
    SemanticOperatorDAG,
};
use serde_json::Value;
use std::sync::Arc;

/// What a request produced
#[derive(Debug)]
pub enum QueryOutcome {
    Executed {
        dag: SemanticOperatorDAG,
        plan: ExecutionPlan,
        validation: SecurityValidation,
        result: ExecutionResult,
    },
    /// Parse confidence was too low to act on
    ClarificationNeeded {
        dag: SemanticOperatorDAG,
        alternatives: Vec<SemanticOperatorDAG>,
    },
}

impl QueryOutcome {
    pub fn is_executed(&self) -> bool {
        matches!(self, QueryOutcome::Executed { .. })
    }
}

pub struct QueryEngine {
    parser: SemanticParser,
    planner: QueryPlanner,
    bridge: SecurityBridge,
    orchestrator: Orchestrator,
    history: Option<Arc<dyn HistoricalCostSource>>,
    default_deadline_ms: Option<u64>,
}

impl QueryEngine {
    pub fn new(
        parser: SemanticParser,
        planner: QueryPlanner,
        bridge: SecurityBridge,
        orchestrator: Orchestrator,
    ) -> Self {
        Self {
            parser,
            planner,
            bridge,
            orchestrator,
            history: None,
            default_deadline_ms: None,
        }
    }

    /// Feed observed step timings back into planning
    pub fn with_cost_history(mut self, history: Arc<dyn HistoricalCostSource>) -> Self {
        self.planner = self.planner.with_cost_history(history.clone());
        self.history = Some(history);
        self
    }

    pub fn with_cache_store(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.planner = self.planner.with_cache_store(cache);
        self
    }

    /// Deadline applied when a request brings none
    pub fn with_default_deadline(mut self, deadline_ms: Option<u64>) -> Self {
        self.default_deadline_ms = deadline_ms;
        self
    }

    /// Build the full engine: domain tables, HTTP executors behind the
    /// resilience wrapper, per-user rate limiting and, when a key is
    /// configured, LLM escalation.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let domain = DomainKnowledge::load(config.domain_dir.as_deref())?;
        let parser = SemanticParser::new(Arc::new(domain))?
            .with_clarification_threshold(config.clarification_threshold);

        let mut registry = ExecutorRegistry::new();
        for (name, url) in &config.executor_urls {
            let http = Arc::new(HttpExecutor::new(name.as_str(), url.as_str()));
            registry.register(name.as_str(), Arc::new(ResilientExecutor::new(http)));
        }

        let mut bridge = SecurityBridge::new()
            .with_rate_limiter(Arc::new(TokenBucketRateLimiter::new(
                config.rate_limit_per_minute,
            )))
            .with_always_classify(config.enable_neural_security);
        if config.llm_escalation_available() {
            if let Some(key) = &config.groq_api_key {
                let mut client = OpenAiCompatClient::new(key.clone());
                if let Some(model) = &config.llm_model {
                    client = client.with_model(model);
                }
                if let Some(base_url) = &config.llm_base_url {
                    client = client.with_base_url(base_url, "OpenAI-compatible");
                }
                bridge = bridge.with_escalation(Arc::new(LlmEscalation::new(Arc::new(client))));
            }
        } else if config.enable_llm_arbitration {
            tracing::warn!("LLM arbitration enabled but GROQ_API_KEY is not set");
        }

        let mut engine = Self::new(
            parser,
            QueryPlanner::new(),
            bridge,
            Orchestrator::new(registry),
        )
        .with_default_deadline(config.default_deadline_ms);
        if config.enable_memory_systems {
            engine = engine.with_cost_history(Arc::new(InMemoryCostHistory::default()));
        }

        tracing::info!(
            executors = config.executor_urls.len(),
            escalation = engine.bridge.escalation_enabled(),
            memory = config.enable_memory_systems,
            "Query engine ready"
        );
        Ok(engine)
    }

    pub fn parser(&self) -> &SemanticParser {
        &self.parser
    }

    pub fn planner(&self) -> &QueryPlanner {
        &self.planner
    }

    pub fn bridge(&self) -> &SecurityBridge {
        &self.bridge
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub async fn handle(
        &self,
        query: &str,
        context: &ParseContext,
        user_id: Option<&str>,
        deadline_ms: Option<u64>,
    ) -> Result<QueryOutcome> {
        self.handle_in_mode(query, context, ParseMode::default(), user_id, deadline_ms)
            .await
    }

    pub async fn handle_in_mode(
        &self,
        query: &str,
        context: &ParseContext,
        mode: ParseMode,
        user_id: Option<&str>,
        deadline_ms: Option<u64>,
    ) -> Result<QueryOutcome> {
        if query.trim().is_empty() {
            return Err(ValidationError::EmptyQuery.into());
        }

        let dag = self.parser.parse(query, context, mode);

        let validation = self.bridge.validate(query, Some(&dag), user_id).await;
        if !validation.passed {
            return Err(EngineError::SecurityBlocked {
                threat_level: validation.threat_level,
                stage: validation.stage_reached,
                issues: validation.issues,
            });
        }

        if dag.confidence < self.parser.clarification_threshold() {
            tracing::info!(
                confidence = dag.confidence,
                alternatives = dag.alternatives.len(),
                "Clarification needed"
            );
            let alternatives = dag.alternatives.clone();
            return Ok(QueryOutcome::ClarificationNeeded { dag, alternatives });
        }

        let plan = self
            .planner
            .plan(&dag, deadline_ms.or(self.default_deadline_ms))
            .await?;
        let result = self.orchestrator.execute(&plan).await;

        if let Some(history) = &self.history {
            history.record_metrics(&result.step_metrics).await;
        }

        Ok(QueryOutcome::Executed {
            dag,
            plan,
            validation,
            result,
        })
    }
    /// Plan an operator graph supplied by the caller instead of the parser,
    /// e.g. one saved with `floatchat_cli -o json parse` and edited by hand.
    /// The graph gets the same parameter screening as a parsed one.
    pub async fn plan_submitted(
        &self,
        dag_json: &str,
        deadline_ms: Option<u64>,
    ) -> Result<ExecutionPlan> {
        let dag = decode_dag(dag_json)?;

        let validation = self.bridge.validate_dag(&dag);
        if !validation.passed {
            return Err(EngineError::SecurityBlocked {
                threat_level: validation.threat_level,
                stage: validation.stage_reached,
                issues: validation.issues,
            });
        }

        Ok(self
            .planner
            .plan(&dag, deadline_ms.or(self.default_deadline_ms))
            .await?)
    }
}

/// Decode a submitted graph. Operator kinds are checked by name first so an
/// unsupported operation is reported as such rather than as bad JSON.
pub fn decode_dag(dag_json: &str) -> Result<SemanticOperatorDAG> {
    let malformed = |e: serde_json::Error| ValidationError::MalformedRequest {
        message: e.to_string(),
    };
    let value: Value = serde_json::from_str(dag_json).map_err(malformed)?;

    let operators = value.get("operators").and_then(Value::as_array);
    for op in operators.into_iter().flatten() {
        let Some(kind) = op.get("kind").and_then(Value::as_str) else {
            continue;
        };
        if !OperatorKind::ALL.iter().any(|k| k.as_str() == kind) {
            return Err(ValidationError::UnknownOperation {
                operation: kind.to_string(),
            }
            .into());
        }
    }

    Ok(serde_json::from_value(value).map_err(malformed)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::executors;
    use crate::error::ExecutionError;
    use crate::orchestrator::Executor;
    use async_trait::async_trait;
    use floatchat_types::{ExecutorRequest, ExecutorResponse, OperatorKind, ThreatLevel};
    use serde_json::json;

    struct Echo(&'static str);

    #[async_trait]
    impl Executor for Echo {
        fn name(&self) -> &str {
            self.0
        }

        async fn execute(
            &self,
            request: ExecutorRequest,
        ) -> std::result::Result<ExecutorResponse, ExecutionError> {
            Ok(ExecutorResponse::ok(json!({"operation": request.operation})))
        }
    }

    fn engine() -> QueryEngine {
        let domain = Arc::new(DomainKnowledge::builtin().unwrap());
        let mut registry = ExecutorRegistry::new();
        for name in executors::ALL {
            registry.register(name, Arc::new(Echo(name)));
        }
        QueryEngine::new(
            SemanticParser::new(domain).unwrap(),
            QueryPlanner::new(),
            SecurityBridge::new(),
            Orchestrator::new(registry),
        )
    }

    #[tokio::test]
    async fn test_empty_query_is_rejected() {
        let err = engine()
            .handle("   ", &ParseContext::new(), None, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::EmptyQuery)
        ));
    }

    #[tokio::test]
    async fn test_low_confidence_asks_for_clarification() {
        let outcome = engine()
            .handle("hello", &ParseContext::new(), None, None)
            .await
            .unwrap();
        match outcome {
            QueryOutcome::ClarificationNeeded { dag, .. } => assert!(dag.confidence < 0.5),
            other => panic!("expected clarification, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_injection_is_blocked_before_planning() {
        let err = engine()
            .handle("'; DROP TABLE profiles; --", &ParseContext::new(), None, None)
            .await
            .unwrap_err();
        match err {
            EngineError::SecurityBlocked {
                threat_level,
                stage,
                ..
            } => {
                assert_eq!(threat_level, ThreatLevel::Blocked);
                assert_eq!(stage, 1);
            }
            other => panic!("expected security block, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_executes_and_records_history() {
        let history = Arc::new(InMemoryCostHistory::default());
        let engine = engine().with_cost_history(history.clone());

        let outcome = engine
            .handle(
                "Show temperature in the Arabian Sea for 2020",
                &ParseContext::new(),
                Some("analyst"),
                None,
            )
            .await
            .unwrap();

        let QueryOutcome::Executed {
            dag, plan, result, ..
        } = outcome
        else {
            panic!("expected execution");
        };
        assert!(result.success, "errors: {:?}", result.errors);
        assert_eq!(plan.steps.len(), dag.operators.len());
        assert_eq!(result.step_metrics.len(), plan.steps.len());

        let visualize = dag
            .operators
            .iter()
            .find(|o| o.kind == OperatorKind::Visualize)
            .unwrap();
        assert!(history.historical_cost(visualize).await.is_some());
    }

    #[tokio::test]
    async fn test_default_deadline_degrades_plan() {
        let engine = engine().with_default_deadline(Some(50));
        let outcome = engine
            .handle(
                "Show temperature in the Arabian Sea for 2020",
                &ParseContext::new(),
                None,
                None,
            )
            .await
            .unwrap();
        let QueryOutcome::Executed { plan, .. } = outcome else {
            panic!("expected execution");
        };
        assert!(plan
            .steps
            .iter()
            .all(|s| s.operator.kind != OperatorKind::Visualize));
    }

    #[tokio::test]
    async fn test_submitted_dag_is_planned() {
        let engine = engine();
        let dag = engine.parser().parse(
            "Show temperature in the Arabian Sea for 2020",
            &ParseContext::new(),
            ParseMode::Power,
        );
        let json = serde_json::to_string(&dag).unwrap();

        let plan = engine.plan_submitted(&json, None).await.unwrap();
        assert_eq!(plan.steps.len(), dag.operators.len());
    }

    #[tokio::test]
    async fn test_submitted_dag_rejections() {
        let engine = engine();
        let teleport = json!({
            "operators": [{
                "id": "teleport_1",
                "kind": "TELEPORT",
                "params": {},
                "estimated_cost": 1.0,
                "target_executor": "structured"
            }],
            "edges": []
        });
        let err = engine
            .plan_submitted(&teleport.to_string(), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::UnknownOperation { ref operation })
                if operation == "TELEPORT"
        ));

        let err = engine.plan_submitted("{\"operators\": [", None).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::MalformedRequest { .. })
        ));

        // Known kinds, but the graph itself is incomplete
        let err = engine
            .plan_submitted(&json!({"operators": []}).to_string(), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::MalformedRequest { .. })
        ));

        let mut dag = engine.parser().parse(
            "salinity in the Bay of Bengal",
            &ParseContext::new(),
            ParseMode::Explorer,
        );
        dag.operators[0]
            .params
            .insert("region_name".into(), json!("x' UNION SELECT * FROM users --"));
        let err = engine
            .plan_submitted(&serde_json::to_string(&dag).unwrap(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::SecurityBlocked { stage: 1, .. }));
    }

    #[test]
    fn test_from_default_config() {
        let engine = QueryEngine::from_config(&EngineConfig::default()).unwrap();
        assert!(!engine.bridge().escalation_enabled());
        assert_eq!(engine.default_deadline_ms, None);
    }
}
