//! Operator Generator
//!
//! Builds a linear operator chain from extracted entities:
//! filters (spatial -> temporal -> parameter -> float -> quality), then at
//! most one computation chosen by intent, then a terminal VISUALIZE.

use crate::catalog;
use crate::domain::DomainKnowledge;
use chrono::NaiveDateTime;
use floatchat_types::{
    Edge, ExtractedEntities, Operator, OperatorKind, Params, QueryIntent, TemporalEntity,
};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

const DEFAULT_PARAMETER: &str = "temperature";

/// Create an operator with a fresh id and catalog defaults for cost and
/// executor
pub fn new_operator(kind: OperatorKind, params: Params) -> Operator {
    let suffix = Uuid::new_v4().simple().to_string();
    Operator {
        id: format!("{}_{}", kind.id_prefix(), &suffix[..8]),
        kind,
        params,
        estimated_cost: catalog::base_cost(kind),
        target_executor: catalog::executor_for(kind).to_string(),
    }
}

fn params(value: Value) -> Params {
    match value {
        Value::Object(map) => map,
        _ => Params::new(),
    }
}

fn timestamp(t: &NaiveDateTime) -> String {
    t.format("%Y-%m-%dT%H:%M:%S").to_string()
}

fn temporal_range(t: &TemporalEntity) -> Value {
    json!({
        "start": timestamp(&t.start),
        "end": timestamp(&t.end),
        "type": t.kind.as_str(),
    })
}

/// Appends operators and keeps the chain's tail
struct Chain {
    operators: Vec<Operator>,
    edges: Vec<Edge>,
}

impl Chain {
    fn new() -> Self {
        Self {
            operators: Vec::new(),
            edges: Vec::new(),
        }
    }

    fn push(&mut self, op: Operator) {
        if let Some(tail) = self.operators.last() {
            self.edges.push(Edge::new(tail.id.clone(), op.id.clone()));
        }
        self.operators.push(op);
    }
}

pub struct OperatorGenerator {
    domain: Arc<DomainKnowledge>,
}

impl OperatorGenerator {
    pub fn new(domain: Arc<DomainKnowledge>) -> Self {
        Self { domain }
    }

    /// Generate the operator chain and its edges
    pub fn generate(
        &self,
        entities: &ExtractedEntities,
        intent: QueryIntent,
    ) -> (Vec<Operator>, Vec<Edge>) {
        let mut chain = Chain::new();

        for op in Self::filter_operators(entities) {
            chain.push(op);
        }
        if let Some(op) = Self::compute_operator(entities, intent) {
            chain.push(op);
        }
        chain.push(self.visualize_operator(entities, intent));

        tracing::debug!(
            intent = %intent,
            operators = chain.operators.len(),
            "Generated operator chain"
        );

        (chain.operators, chain.edges)
    }

    /// One filter per non-empty entity class, in fixed class order
    fn filter_operators(entities: &ExtractedEntities) -> Vec<Operator> {
        let mut ops = Vec::new();

        // A spatial filter needs an extent; bare place names have none.
        // Several regions share one filter covering all of them.
        let extent = entities
            .spatial
            .iter()
            .filter_map(|s| s.bbox)
            .reduce(|acc, bbox| acc.union(&bbox));
        let primary = entities.spatial.iter().find(|s| s.bbox.is_some());
        if let (Some(extent), Some(primary)) = (extent, primary) {
            let regions: Vec<&str> = entities.spatial.iter().map(|s| s.name.as_str()).collect();
            ops.push(new_operator(
                OperatorKind::SpatialFilter,
                params(json!({
                    "bbox": extent,
                    "region_name": primary.name,
                    "regions": regions,
                })),
            ));
        }

        if let Some(first) = entities.temporal.first() {
            let mut p = params(temporal_range(first));
            if entities.temporal.len() > 1 {
                let ranges: Vec<Value> = entities.temporal.iter().map(temporal_range).collect();
                p.insert("ranges".into(), Value::Array(ranges));
            }
            ops.push(new_operator(OperatorKind::TemporalFilter, p));
        }

        if !entities.parameters.is_empty() {
            let columns: Vec<&str> = entities
                .parameters
                .iter()
                .map(|p| p.column.as_str())
                .collect();
            let mut p = params(json!({
                "parameters": columns,
                "include_qc": true,
            }));
            if let Some(depth) = entities.depth.first() {
                p.insert(
                    "depth_range".into(),
                    json!({"min": depth.min_depth, "max": depth.max_depth}),
                );
            }
            ops.push(new_operator(OperatorKind::ParameterFilter, p));
        }

        if !entities.floats.is_empty() {
            let ids: Vec<&str> = entities.floats.iter().map(|f| f.float_id.as_str()).collect();
            ops.push(new_operator(
                OperatorKind::FloatFilter,
                params(json!({ "float_ids": ids })),
            ));
        }

        if !entities.quality.is_empty() {
            let flags: BTreeSet<u8> = entities
                .quality
                .iter()
                .flat_map(|q| q.qc_flags.iter().copied())
                .collect();
            let data_mode = entities.quality.iter().find_map(|q| q.data_mode.clone());
            let qc_flags = if flags.is_empty() {
                Value::Null
            } else {
                json!(flags.into_iter().collect::<Vec<_>>())
            };
            ops.push(new_operator(
                OperatorKind::QcFilter,
                params(json!({ "qc_flags": qc_flags, "data_mode": data_mode })),
            ));
        }

        ops
    }

    fn compute_operator(entities: &ExtractedEntities, intent: QueryIntent) -> Option<Operator> {
        let parameter = entities
            .parameters
            .first()
            .map(|p| p.column.as_str())
            .unwrap_or(DEFAULT_PARAMETER);

        let (kind, p) = match intent {
            QueryIntent::GradientAnalysis => (
                OperatorKind::ComputeGradient,
                json!({"parameter": parameter, "method": "finite_difference"}),
            ),
            QueryIntent::MixedLayerAnalysis => (
                OperatorKind::ComputeMld,
                json!({"method": "temperature_threshold", "threshold": 0.5}),
            ),
            QueryIntent::AnomalyDetection => (
                OperatorKind::ComputeAnomaly,
                json!({"parameter": parameter, "baseline": "climatology"}),
            ),
            QueryIntent::Comparison => (
                OperatorKind::ComputeStats,
                json!({"metrics": ["mean", "std", "min", "max"]}),
            ),
            _ => return None,
        };
        Some(new_operator(kind, params(p)))
    }

    fn visualize_operator(&self, entities: &ExtractedEntities, intent: QueryIntent) -> Operator {
        let types = self.domain.intents.visualizations_for(intent);
        let primary = types.first().map(String::as_str).unwrap_or("time_series");
        let alternatives: Vec<&str> = types.iter().skip(1).map(String::as_str).collect();
        let parameters: Vec<&str> = if entities.parameters.is_empty() {
            vec![DEFAULT_PARAMETER]
        } else {
            entities
                .parameters
                .iter()
                .map(|p| p.column.as_str())
                .collect()
        };
        new_operator(
            OperatorKind::Visualize,
            params(json!({
                "type": primary,
                "alternatives": alternatives,
                "parameters": parameters,
            })),
        )
    }
}
