//! FloatChat - natural-language query engine for ARGO float data
//!
//! Turns a free-text question into a DAG of semantic operators, plans it
//! against a deadline, screens it for abuse and runs it across executor
//! services.
//!
//! ## Pipeline
//! Query -> NL2Operator (entities, intent, operators) -> Query Planner
//! (order, cost, parallel groups) -> Security Bridge -> Execution Orchestrator
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use floatchat::{EngineConfig, ParseContext, QueryEngine};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EngineConfig::from_env()?;
//! let engine = QueryEngine::from_config(&config)?;
//! let outcome = engine
//!     .handle("Show temperature in the Arabian Sea for 2020", &ParseContext::new(), None, None)
//!     .await?;
//! assert!(outcome.is_executed());
//! # Ok(())
//! # }
//! ```

// Core error handling
pub mod error;

// Environment configuration
pub mod config;

// Domain tables: regions, parameters, QC flags, depth patterns, intents
pub mod domain;

// Static per-kind cost and executor tables
pub mod catalog;

// Cache and cost-history feedback for the planner
pub mod memory;

// Natural language to operator DAG
pub mod nl2op;

// Ordering, costing, degradation and parallel grouping
pub mod planner;

// Grouped concurrent execution across executors
pub mod orchestrator;

// Multi-stage query screening
pub mod security;

// LLM client used by security escalation
pub mod llm;

// Facade wiring every stage together
pub mod engine;

pub use floatchat_types as types;

pub use config::EngineConfig;
pub use engine::{QueryEngine, QueryOutcome};
pub use error::{ConfigError, DagError, EngineError, ExecutionError, Result, ValidationError};
pub use nl2op::{ParseContext, SemanticParser};
pub use orchestrator::{Executor, ExecutorRegistry, Orchestrator};
pub use planner::QueryPlanner;
pub use security::SecurityBridge;
