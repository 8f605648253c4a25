//! Executor contract and execution results

use crate::operator::{OperatorKind, Params};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ============================================================================
// EXECUTOR CONTRACT
// ============================================================================

/// Request sent to a backend executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorRequest {
    pub request_id: Uuid,
    /// Operator kind wire name, e.g. "SPATIAL_FILTER"
    pub operation: String,
    #[serde(default)]
    pub params: Params,
    pub timeout_ms: u64,
    pub trace_id: Option<String>,
}

impl ExecutorRequest {
    pub fn new(operation: impl Into<String>, params: Params, timeout_ms: u64) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            operation: operation.into(),
            params,
            timeout_ms,
            trace_id: None,
        }
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorError {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutorMetadata {
    pub rows_count: Option<u64>,
    pub from_cache: Option<bool>,
}

/// Response returned by a backend executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Value,
    pub error: Option<ExecutorError>,
    #[serde(default)]
    pub metadata: Option<ExecutorMetadata>,
}

impl ExecutorResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data,
            error: None,
            metadata: None,
        }
    }

    pub fn failed(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Value::Null,
            error: Some(ExecutorError {
                code: code.into(),
                message: message.into(),
            }),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, rows_count: Option<u64>, from_cache: Option<bool>) -> Self {
        self.metadata = Some(ExecutorMetadata {
            rows_count,
            from_cache,
        });
        self
    }

    pub fn rows_count(&self) -> u64 {
        self.metadata
            .as_ref()
            .and_then(|m| m.rows_count)
            .unwrap_or(0)
    }

    pub fn from_cache(&self) -> bool {
        self.metadata
            .as_ref()
            .and_then(|m| m.from_cache)
            .unwrap_or(false)
    }
}

// ============================================================================
// RESULTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepErrorKind {
    Timeout,
    Executor,
    UnknownExecutor,
}

/// A failed step, recorded without aborting the plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepError {
    /// Operator id of the failed step
    pub step: String,
    pub kind: StepErrorKind,
    pub message: String,
}

/// Observed timing of one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepMetric {
    pub operator_id: String,
    pub kind: OperatorKind,
    pub elapsed_ms: f64,
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub data: Value,
    pub confidence: f64,
    pub cache_hits: u64,
    pub rows_processed: u64,
    pub execution_time_ms: f64,
    #[serde(default)]
    pub errors: Vec<StepError>,
    #[serde(default)]
    pub step_metrics: Vec<StepMetric>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_accepts_minimal_wire_shape() {
        let response: ExecutorResponse =
            serde_json::from_value(json!({"success": true, "error": null})).unwrap();
        assert!(response.success);
        assert_eq!(response.data, Value::Null);
        assert_eq!(response.rows_count(), 0);
        assert!(!response.from_cache());
    }

    #[test]
    fn test_response_metadata_accessors() {
        let response = ExecutorResponse::ok(json!([1, 2])).with_metadata(Some(42), Some(true));
        assert_eq!(response.rows_count(), 42);
        assert!(response.from_cache());
    }

    #[test]
    fn test_step_error_kind_wire_names() {
        let err = StepError {
            step: "visualize_0a1b2c3d".into(),
            kind: StepErrorKind::UnknownExecutor,
            message: "no executor".into(),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], json!("unknown_executor"));
    }
}
