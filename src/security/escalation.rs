//! Stage 3: LLM escalation
//!
//! Only queries still SUSPICIOUS after Stage 2 reach this stage. The prompt
//! is rendered from a Handlebars template and the verdict comes back as a
//! JSON object `{verdict, confidence, reason}`.

use crate::llm::LlmClient;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use floatchat_types::{SemanticOperatorDAG, ThreatLevel};
use handlebars::Handlebars;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::{Arc, LazyLock};

const SECURITY_ANALYSIS_TEMPLATE: &str = include_str!("prompts/security_analysis.hbs");

const SYSTEM_PROMPT: &str = "You are a security analyst screening natural-language queries \
against an oceanographic database. Classify each query strictly and reply with JSON only.";

static JSON_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(?:json)?\s*([\s\S]*?)\s*```").unwrap());

#[derive(Debug, Clone, PartialEq)]
pub struct EscalationVerdict {
    pub verdict: ThreatLevel,
    pub confidence: f64,
    pub reason: Option<String>,
}

/// External classifier consulted for ambiguous queries
#[async_trait]
pub trait SecurityEscalation: Send + Sync {
    async fn classify(&self, prompt: &str) -> Result<EscalationVerdict>;
}

// =============================================================================
// PROMPT
// =============================================================================

fn json_helper(
    h: &handlebars::Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut handlebars::RenderContext,
    out: &mut dyn handlebars::Output,
) -> handlebars::HelperResult {
    if let Some(v) = h.param(0) {
        out.write(&serde_json::to_string(v.value()).unwrap_or_default())?;
    }
    Ok(())
}

/// Renders the security analysis prompt
pub struct SecurityPrompt {
    handlebars: Handlebars<'static>,
}

impl Default for SecurityPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl SecurityPrompt {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars.register_helper("json", Box::new(json_helper));
        Self { handlebars }
    }

    pub fn render(
        &self,
        query: &str,
        dag: Option<&SemanticOperatorDAG>,
        issues: &[String],
    ) -> Result<String> {
        let operators: Vec<Value> = dag
            .map(|d| {
                d.operators
                    .iter()
                    .map(|op| json!({"kind": op.kind.as_str(), "params": op.params}))
                    .collect()
            })
            .unwrap_or_default();
        let data = json!({
            "query": query,
            "operators": operators,
            "issues": issues,
        });
        Ok(self
            .handlebars
            .render_template(SECURITY_ANALYSIS_TEMPLATE, &data)?)
    }
}

// =============================================================================
// VERDICT PARSING
// =============================================================================

#[derive(Deserialize)]
struct RawVerdict {
    verdict: String,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    reason: Option<String>,
}

/// Parse the model's reply, tolerating a markdown code fence around the JSON
pub fn parse_verdict(content: &str) -> Result<EscalationVerdict> {
    let raw: RawVerdict = match serde_json::from_str(content) {
        Ok(v) => v,
        Err(direct) => {
            let inner = JSON_BLOCK_RE
                .captures(content)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str())
                .ok_or_else(|| anyhow!("Escalation reply is not JSON: {}", direct))?;
            serde_json::from_str(inner)?
        }
    };

    let verdict = match raw.verdict.trim().to_uppercase().as_str() {
        "SAFE" => ThreatLevel::Safe,
        "SUSPICIOUS" => ThreatLevel::Suspicious,
        "BLOCKED" => ThreatLevel::Blocked,
        other => return Err(anyhow!("Unknown verdict '{}'", other)),
    };

    Ok(EscalationVerdict {
        verdict,
        confidence: raw.confidence.unwrap_or(0.5).clamp(0.0, 1.0),
        reason: raw.reason,
    })
}

// =============================================================================
// LLM ESCALATION
// =============================================================================

pub struct LlmEscalation {
    client: Arc<dyn LlmClient>,
}

impl LlmEscalation {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecurityEscalation for LlmEscalation {
    async fn classify(&self, prompt: &str) -> Result<EscalationVerdict> {
        tracing::debug!(
            provider = self.client.provider_name(),
            model = self.client.model_name(),
            "Escalating query to LLM"
        );
        let reply = self.client.chat_json(SYSTEM_PROMPT, prompt).await?;
        parse_verdict(&reply)
    }
}
