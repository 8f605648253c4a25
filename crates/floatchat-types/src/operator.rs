//! Operators and the semantic operator DAG

use crate::entities::ExtractedEntities;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Operator parameters. `serde_json::Map` keeps keys sorted, which makes
/// the serialized form canonical.
pub type Params = serde_json::Map<String, serde_json::Value>;

// ============================================================================
// OPERATOR KIND
// ============================================================================

/// The closed set of operator kinds. The SCREAMING_SNAKE_CASE spelling is
/// the wire identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperatorKind {
    SpatialFilter,
    TemporalFilter,
    ParameterFilter,
    QcFilter,
    FloatFilter,
    Aggregate,
    GroupBy,
    ComputeGradient,
    ComputeMld,
    ComputeAnomaly,
    ComputeStats,
    SemanticSearch,
    Join,
    Visualize,
}

impl OperatorKind {
    pub const ALL: [OperatorKind; 14] = [
        OperatorKind::SpatialFilter,
        OperatorKind::TemporalFilter,
        OperatorKind::ParameterFilter,
        OperatorKind::QcFilter,
        OperatorKind::FloatFilter,
        OperatorKind::Aggregate,
        OperatorKind::GroupBy,
        OperatorKind::ComputeGradient,
        OperatorKind::ComputeMld,
        OperatorKind::ComputeAnomaly,
        OperatorKind::ComputeStats,
        OperatorKind::SemanticSearch,
        OperatorKind::Join,
        OperatorKind::Visualize,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperatorKind::SpatialFilter => "SPATIAL_FILTER",
            OperatorKind::TemporalFilter => "TEMPORAL_FILTER",
            OperatorKind::ParameterFilter => "PARAMETER_FILTER",
            OperatorKind::QcFilter => "QC_FILTER",
            OperatorKind::FloatFilter => "FLOAT_FILTER",
            OperatorKind::Aggregate => "AGGREGATE",
            OperatorKind::GroupBy => "GROUP_BY",
            OperatorKind::ComputeGradient => "COMPUTE_GRADIENT",
            OperatorKind::ComputeMld => "COMPUTE_MLD",
            OperatorKind::ComputeAnomaly => "COMPUTE_ANOMALY",
            OperatorKind::ComputeStats => "COMPUTE_STATS",
            OperatorKind::SemanticSearch => "SEMANTIC_SEARCH",
            OperatorKind::Join => "JOIN",
            OperatorKind::Visualize => "VISUALIZE",
        }
    }

    /// Lowercase prefix used in generated operator ids
    pub fn id_prefix(&self) -> String {
        self.as_str().to_lowercase()
    }

    /// Row-restricting filters
    pub fn is_filter(&self) -> bool {
        matches!(
            self,
            OperatorKind::SpatialFilter
                | OperatorKind::TemporalFilter
                | OperatorKind::ParameterFilter
                | OperatorKind::QcFilter
                | OperatorKind::FloatFilter
        )
    }

    /// Profile computations that accept a reduced-precision `fast_mode`
    pub fn supports_fast_mode(&self) -> bool {
        matches!(
            self,
            OperatorKind::ComputeGradient | OperatorKind::ComputeMld | OperatorKind::ComputeAnomaly
        )
    }

    /// Filters that scan raw rows and accept a `sample_rate`
    pub fn supports_sampling(&self) -> bool {
        matches!(
            self,
            OperatorKind::SpatialFilter | OperatorKind::TemporalFilter
        )
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown operator kind: '{0}'")]
pub struct ParseOperatorKindError(pub String);

impl FromStr for OperatorKind {
    type Err = ParseOperatorKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase();
        OperatorKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| ParseOperatorKindError(s.to_string()))
    }
}

// ============================================================================
// OPERATOR / EDGE
// ============================================================================

/// One typed unit of query work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operator {
    pub id: String,
    pub kind: OperatorKind,
    #[serde(default)]
    pub params: Params,
    /// Estimated cost in milliseconds; refined by the planner
    pub estimated_cost: f64,
    pub target_executor: String,
}

/// Dependency edge: `from_id` must complete before `to_id`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub from_id: String,
    pub to_id: String,
}

impl Edge {
    pub fn new(from_id: impl Into<String>, to_id: impl Into<String>) -> Self {
        Self {
            from_id: from_id.into(),
            to_id: to_id.into(),
        }
    }
}

// ============================================================================
// INTENT / MODE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    TrajectoryTracking,
    ProfileAnalysis,
    TimeSeriesAnalysis,
    SpatialAnalysis,
    AnomalyDetection,
    Comparison,
    FloatTracking,
    GradientAnalysis,
    WaterMassAnalysis,
    MixedLayerAnalysis,
    QualityCheck,
    GeneralQuery,
    /// Alternative reading with the spatial constraint dropped
    GlobalAnalysis,
    /// Alternative reading over the common parameter set
    MultiParameter,
}

impl QueryIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryIntent::TrajectoryTracking => "trajectory_tracking",
            QueryIntent::ProfileAnalysis => "profile_analysis",
            QueryIntent::TimeSeriesAnalysis => "time_series_analysis",
            QueryIntent::SpatialAnalysis => "spatial_analysis",
            QueryIntent::AnomalyDetection => "anomaly_detection",
            QueryIntent::Comparison => "comparison",
            QueryIntent::FloatTracking => "float_tracking",
            QueryIntent::GradientAnalysis => "gradient_analysis",
            QueryIntent::WaterMassAnalysis => "water_mass_analysis",
            QueryIntent::MixedLayerAnalysis => "mixed_layer_analysis",
            QueryIntent::QualityCheck => "quality_check",
            QueryIntent::GeneralQuery => "general_query",
            QueryIntent::GlobalAnalysis => "global_analysis",
            QueryIntent::MultiParameter => "multi_parameter",
        }
    }

    pub fn is_general(&self) -> bool {
        matches!(self, QueryIntent::GeneralQuery)
    }
}

impl fmt::Display for QueryIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the caller wants results presented. Recorded on the DAG for the
/// formatting layer; it does not change the operator graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseMode {
    /// Guided, clarification-friendly
    #[default]
    Explorer,
    /// Terse, technical
    Power,
}

impl FromStr for ParseMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "explorer" => Ok(ParseMode::Explorer),
            "power" => Ok(ParseMode::Power),
            other => Err(format!("Unknown parse mode: '{}'", other)),
        }
    }
}

// ============================================================================
// DAG
// ============================================================================

/// Operator graph produced by the semantic parser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticOperatorDAG {
    pub operators: Vec<Operator>,
    pub edges: Vec<Edge>,
    pub confidence: f64,
    pub intent: QueryIntent,
    pub entities: ExtractedEntities,
    /// Lower-confidence readings offered for disambiguation
    #[serde(default)]
    pub alternatives: Vec<SemanticOperatorDAG>,
    #[serde(default)]
    pub mode: ParseMode,
}

impl SemanticOperatorDAG {
    pub fn operator(&self, id: &str) -> Option<&Operator> {
        self.operators.iter().find(|op| op.id == id)
    }

    /// Ids of operators that `id` directly depends on, in edge order
    pub fn dependencies_of(&self, id: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|e| e.to_id == id)
            .map(|e| e.from_id.as_str())
            .collect()
    }

    pub fn filter_count(&self) -> usize {
        self.operators.iter().filter(|op| op.kind.is_filter()).count()
    }

    pub fn has_operator_kind(&self, kind: OperatorKind) -> bool {
        self.operators.iter().any(|op| op.kind == kind)
    }

    pub fn needs_clarification(&self) -> bool {
        !self.alternatives.is_empty()
    }
}
