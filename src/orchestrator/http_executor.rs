//! HTTP Executor
//!
//! Speaks the executor contract to a remote server: the request is POSTed
//! as JSON to `<base_url>/execute` and the body is decoded as an
//! `ExecutorResponse`.

use super::executor::Executor;
use crate::error::ExecutionError;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use floatchat_types::{ExecutorRequest, ExecutorResponse};
use std::time::Duration;

#[derive(Clone)]
pub struct HttpExecutor {
    name: String,
    base_url: String,
    client: reqwest::Client,
}

impl HttpExecutor {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self::with_client(name, base_url, reqwest::Client::new())
    }

    pub fn with_client(
        name: impl Into<String>,
        base_url: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            name: name.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoint(&self) -> String {
        format!("{}/execute", self.base_url)
    }

    async fn call(&self, request: &ExecutorRequest) -> Result<ExecutorResponse> {
        let mut builder = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .timeout(Duration::from_millis(request.timeout_ms))
            .json(request);
        if let Some(trace_id) = &request.trace_id {
            builder = builder.header("X-Trace-Id", trace_id);
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Executor {} returned {}: {}", self.name, status, body));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl Executor for HttpExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, request: ExecutorRequest) -> Result<ExecutorResponse, ExecutionError> {
        tracing::debug!(
            executor = %self.name,
            operation = %request.operation,
            request_id = %request.request_id,
            "POST {}",
            self.endpoint()
        );
        self.call(&request).await.map_err(|e| {
            let timed_out = e
                .downcast_ref::<reqwest::Error>()
                .is_some_and(reqwest::Error::is_timeout);
            if timed_out {
                ExecutionError::Timeout {
                    step: request.operation.clone(),
                    timeout_ms: request.timeout_ms,
                }
            } else {
                ExecutionError::Transport(e.to_string())
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let executor = HttpExecutor::new("structured", "http://localhost:8010/");
        assert_eq!(executor.endpoint(), "http://localhost:8010/execute");
        assert_eq!(executor.name(), "structured");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_a_transport_error() {
        // Port 9 (discard) is not expected to host an HTTP server
        let executor = HttpExecutor::new("structured", "http://127.0.0.1:9");
        let request = ExecutorRequest::new("SPATIAL_FILTER", Default::default(), 500);
        let err = executor.execute(request).await.unwrap_err();
        assert!(matches!(err, ExecutionError::Transport(_)));
    }

    #[tokio::test]
    async fn test_silent_server_is_a_timeout() {
        // Accepts the connection and never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let executor = HttpExecutor::new("profile", format!("http://{}", addr));
        let request = ExecutorRequest::new("COMPUTE_MLD", Default::default(), 50);
        let err = executor.execute(request).await.unwrap_err();
        assert!(matches!(err, ExecutionError::Timeout { timeout_ms: 50, .. }));
        server.abort();
    }
}
