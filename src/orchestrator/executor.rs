//! Executor capability and registry
//!
//! An executor owns one category of operators (structured filters, profile
//! computations, visualization, ...). The orchestrator only knows it by name.

use crate::error::ExecutionError;
use async_trait::async_trait;
use floatchat_types::{ExecutorRequest, ExecutorResponse};
use std::collections::HashMap;
use std::sync::Arc;

/// Backend capability that runs operators
///
/// `Ok` with `success == false` is a domain failure reported by the
/// executor; `Err` is a failure to reach or complete the call.
#[async_trait]
pub trait Executor: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(&self, request: ExecutorRequest) -> Result<ExecutorResponse, ExecutionError>;
}

/// Executors by name
#[derive(Default, Clone)]
pub struct ExecutorRegistry {
    executors: HashMap<String, Arc<dyn Executor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under an explicit name, replacing any previous entry
    pub fn register(&mut self, name: impl Into<String>, executor: Arc<dyn Executor>) {
        let name = name.into();
        tracing::debug!(executor = %name, "Registered executor");
        self.executors.insert(name, executor);
    }

    /// Register under the executor's own name
    pub fn register_named(&mut self, executor: Arc<dyn Executor>) {
        let name = executor.name().to_string();
        self.register(name, executor);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Executor>> {
        self.executors.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.executors.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.executors.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.executors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}
