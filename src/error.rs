//! Error types for the query engine
//!
//! Each stage owns a `thiserror` enum; `EngineError` wraps them for callers
//! driving the whole pipeline.

use crate::domain::DomainTableError;
use floatchat_types::{StepError, StepErrorKind, ThreatLevel};
use thiserror::Error;

/// Top-level error for the query pipeline
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("DAG error: {0}")]
    Dag(#[from] DagError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Security violation ({threat_level} at stage {stage}): {}", .issues.join("; "))]
    SecurityBlocked {
        threat_level: ThreatLevel,
        stage: u8,
        issues: Vec<String>,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Domain table error: {0}")]
    Domain(#[from] DomainTableError),
}

/// Malformed or unsupported requests
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Query is empty")]
    EmptyQuery,

    #[error("Unknown operation '{operation}'")]
    UnknownOperation { operation: String },

    #[error("Malformed request: {message}")]
    MalformedRequest { message: String },
}

/// Structural problems in an operator graph
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DagError {
    #[error("{explanation}")]
    Cycle {
        operator_ids: Vec<String>,
        explanation: String,
    },

    #[error("Edge {from} -> {to} references an unknown operator")]
    DanglingEdge { from: String, to: String },

    #[error("Operator id '{id}' appears more than once")]
    DuplicateOperator { id: String },
}

/// Failures of a single execution step
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("Step timed out after {timeout_ms}ms")]
    Timeout { step: String, timeout_ms: u64 },

    #[error("{code}: {message}")]
    Executor {
        step: String,
        code: String,
        message: String,
    },

    #[error("No executor registered for '{executor}'")]
    UnknownExecutor { step: String, executor: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Circuit open for executor '{executor}'")]
    CircuitOpen { executor: String },

    #[error("Rate limit exceeded for executor '{executor}'")]
    RateLimited { executor: String },
}

impl ExecutionError {
    /// Record this failure against a step without aborting the plan
    pub fn into_step_error(self, step: &str) -> StepError {
        let kind = match &self {
            ExecutionError::Timeout { .. } => StepErrorKind::Timeout,
            ExecutionError::UnknownExecutor { .. } => StepErrorKind::UnknownExecutor,
            _ => StepErrorKind::Executor,
        };
        StepError {
            step: step.to_string(),
            kind,
            message: self.to_string(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}: {message}")]
    InvalidValue {
        key: String,
        value: String,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message() {
        let err = ExecutionError::Timeout {
            step: "compute_mld_1a2b3c4d".into(),
            timeout_ms: 1200,
        };
        let step = err.into_step_error("compute_mld_1a2b3c4d");
        assert_eq!(step.kind, StepErrorKind::Timeout);
        assert_eq!(step.message, "Step timed out after 1200ms");
    }

    #[test]
    fn test_security_blocked_lists_issues() {
        let err = EngineError::SecurityBlocked {
            threat_level: ThreatLevel::Blocked,
            stage: 1,
            issues: vec!["SQL injection pattern detected".into(), "second".into()],
        };
        assert_eq!(
            err.to_string(),
            "Security violation (BLOCKED at stage 1): SQL injection pattern detected; second"
        );
    }
}
