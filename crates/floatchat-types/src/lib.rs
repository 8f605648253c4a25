//! FloatChat Types - Level 1 foundation types
//!
//! Pure data structures shared by every stage of the query engine:
//! parsing, planning, security screening and execution.
//!
//! ## Contents
//!
//! - Extracted entities (spatial, temporal, parameter, float, quality, depth)
//! - Operators, edges and the semantic operator DAG
//! - Execution steps, plans and cache strategy
//! - Security validation verdicts
//! - Executor request/response contract and execution results
//!
//! ## Rules
//!
//! 1. **NO BUSINESS LOGIC** - only data structures and small accessors
//! 2. **NO WORKSPACE DEPENDENCIES** - this crate sits at the bottom
//! 3. **SERIALIZABLE** - every type crosses a wire boundary somewhere

pub mod entities;
pub mod execution;
pub mod operator;
pub mod plan;
pub mod security;

pub use entities::{
    BoundingBox, DepthEntity, ExtractedEntities, FloatEntity, ParameterEntity, QualityEntity,
    SpatialEntity, SpatialKind, TemporalEntity, TemporalKind,
};
pub use execution::{
    ExecutionResult, ExecutorError, ExecutorMetadata, ExecutorRequest, ExecutorResponse,
    StepError, StepErrorKind, StepMetric,
};
pub use operator::{
    Edge, Operator, OperatorKind, ParseMode, ParseOperatorKindError, Params, QueryIntent,
    SemanticOperatorDAG,
};
pub use plan::{CacheStrategy, ExecutionPlan, ExecutionStep};
pub use security::{SecurityValidation, ThreatLevel};
