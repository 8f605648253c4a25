//! Security Bridge
//!
//! Screens every request before execution:
//!
//! ```text
//! rate limit ─▶ Stage 1 (patterns) ─SUSPICIOUS─▶ Stage 2 (classifier) ─SUSPICIOUS─▶ Stage 3 (LLM)
//!     │               │                                │                               │
//!  stage 0         BLOCKED / SAFE                  BLOCKED / SAFE                  final verdict
//! ```
//!
//! Stages run strictly in sequence. BLOCKED anywhere stops the pipeline.
//! A request passes only once a stage returns SAFE; a request left
//! SUSPICIOUS with nowhere to escalate is refused.

pub mod escalation;
pub mod heuristic;
pub mod patterns;
pub mod rate_limit;

pub use escalation::{EscalationVerdict, LlmEscalation, SecurityEscalation, SecurityPrompt};
pub use heuristic::{heuristic_check, ThreatClassifier};
pub use patterns::{screen, PatternFamily, StageVerdict};
pub use rate_limit::{RateLimiter, TokenBucketRateLimiter};

use floatchat_types::{SecurityValidation, SemanticOperatorDAG, ThreatLevel};
use std::sync::Arc;
use std::time::Instant;

/// Confidence lost per non-fatal DAG issue
const DAG_ISSUE_PENALTY: f64 = 0.1;

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

#[derive(Default)]
pub struct SecurityBridge {
    rate_limiter: Option<Arc<dyn RateLimiter>>,
    classifier: Option<Arc<dyn ThreatClassifier>>,
    /// Run Stage 2 even when Stage 1 found nothing
    always_classify: bool,
    escalation: Option<Arc<dyn SecurityEscalation>>,
    prompt: SecurityPrompt,
}

impl SecurityBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn ThreatClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_always_classify(mut self, enabled: bool) -> Self {
        self.always_classify = enabled;
        self
    }

    pub fn with_escalation(mut self, escalation: Arc<dyn SecurityEscalation>) -> Self {
        self.escalation = Some(escalation);
        self
    }

    pub fn escalation_enabled(&self) -> bool {
        self.escalation.is_some()
    }

    /// Screen a raw query, plus its operator graph when given
    pub async fn validate(
        &self,
        query: &str,
        dag: Option<&SemanticOperatorDAG>,
        user_id: Option<&str>,
    ) -> SecurityValidation {
        let validation = self.validate_text(query, dag, user_id).await;

        let validation = match dag {
            Some(dag) if validation.passed => merge(validation, self.validate_dag(dag)),
            _ => validation,
        };

        if validation.threat_level != ThreatLevel::Safe {
            tracing::warn!(
                threat_level = %validation.threat_level,
                stage = validation.stage_reached,
                user = user_id.unwrap_or("-"),
                issues = ?validation.issues,
                "Security event"
            );
        }

        validation
    }

    async fn validate_text(
        &self,
        query: &str,
        dag: Option<&SemanticOperatorDAG>,
        user_id: Option<&str>,
    ) -> SecurityValidation {
        let start = Instant::now();

        if let (Some(limiter), Some(user)) = (&self.rate_limiter, user_id) {
            if !limiter.allowed(user).await {
                return SecurityValidation {
                    passed: false,
                    threat_level: ThreatLevel::Blocked,
                    stage_reached: 0,
                    confidence: 1.0,
                    issues: vec!["Rate limit exceeded".to_string()],
                    latency_ms: elapsed_ms(start),
                };
            }
        }

        // Stage 1
        let stage1 = screen(query);
        let mut issues = stage1.issues;
        match stage1.threat_level {
            ThreatLevel::Blocked => {
                return SecurityValidation {
                    passed: false,
                    threat_level: ThreatLevel::Blocked,
                    stage_reached: 1,
                    confidence: 1.0,
                    issues,
                    latency_ms: elapsed_ms(start),
                };
            }
            ThreatLevel::Safe if !self.always_classify => {
                return SecurityValidation {
                    passed: true,
                    threat_level: ThreatLevel::Safe,
                    stage_reached: 1,
                    confidence: 1.0,
                    issues,
                    latency_ms: elapsed_ms(start),
                };
            }
            _ => {}
        }

        // Stage 2
        let stage2 = heuristic::stage2(self.classifier.as_deref(), query).await;
        issues.extend(stage2.issues);
        match stage2.threat_level {
            ThreatLevel::Safe => {
                return SecurityValidation {
                    passed: true,
                    threat_level: ThreatLevel::Safe,
                    stage_reached: 2,
                    confidence: 1.0,
                    issues,
                    latency_ms: elapsed_ms(start),
                };
            }
            ThreatLevel::Blocked => {
                return SecurityValidation {
                    passed: false,
                    threat_level: ThreatLevel::Blocked,
                    stage_reached: 2,
                    confidence: stage2.score,
                    issues,
                    latency_ms: elapsed_ms(start),
                };
            }
            ThreatLevel::Suspicious => {}
        }

        // Stage 3
        let Some(escalation) = &self.escalation else {
            issues.push("No escalation stage configured".to_string());
            return SecurityValidation {
                passed: false,
                threat_level: ThreatLevel::Suspicious,
                stage_reached: 2,
                confidence: stage2.score,
                issues,
                latency_ms: elapsed_ms(start),
            };
        };

        let verdict = match self.prompt.render(query, dag, &issues) {
            Ok(prompt) => escalation.classify(&prompt).await,
            Err(e) => Err(e),
        };
        match verdict {
            Ok(verdict) => {
                if let Some(reason) = verdict.reason {
                    if verdict.verdict != ThreatLevel::Safe {
                        issues.push(reason);
                    }
                }
                SecurityValidation {
                    passed: verdict.verdict == ThreatLevel::Safe,
                    threat_level: verdict.verdict,
                    stage_reached: 3,
                    confidence: verdict.confidence,
                    issues,
                    latency_ms: elapsed_ms(start),
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Security escalation failed");
                issues.push("Escalation failed".to_string());
                SecurityValidation {
                    passed: false,
                    threat_level: ThreatLevel::Suspicious,
                    stage_reached: 3,
                    confidence: 0.5,
                    issues,
                    latency_ms: elapsed_ms(start),
                }
            }
        }
    }

    /// Screen an operator graph: every string param against the Stage 1
    /// families (fatal), plus a non-fatal flag for graphs with no filter
    pub fn validate_dag(&self, dag: &SemanticOperatorDAG) -> SecurityValidation {
        let start = Instant::now();
        let mut issues = Vec::new();

        if dag.filter_count() == 0 {
            issues.push("Query has no filters - may access too much data".to_string());
        }

        for op in &dag.operators {
            for value in op.params.values() {
                let Some(text) = value.as_str() else {
                    continue;
                };
                if let Some(family) = patterns::matching_family(&patterns::normalize(text)) {
                    issues.push(format!(
                        "Suspicious pattern in operator parameter: {}",
                        family
                    ));
                    return SecurityValidation {
                        passed: false,
                        threat_level: ThreatLevel::Blocked,
                        stage_reached: 1,
                        confidence: 1.0,
                        issues,
                        latency_ms: elapsed_ms(start),
                    };
                }
            }
        }

        let threat_level = if issues.is_empty() {
            ThreatLevel::Safe
        } else {
            ThreatLevel::Suspicious
        };
        SecurityValidation {
            passed: true,
            threat_level,
            stage_reached: 1,
            confidence: (1.0 - issues.len() as f64 * DAG_ISSUE_PENALTY).max(0.0),
            issues,
            latency_ms: elapsed_ms(start),
        }
    }
}

/// Fold a graph check into a passed text check. A blocked graph blocks;
/// non-fatal graph issues are carried as notes.
fn merge(text: SecurityValidation, graph: SecurityValidation) -> SecurityValidation {
    let mut issues = text.issues;
    issues.extend(graph.issues);
    let latency_ms = text.latency_ms + graph.latency_ms;

    if graph.threat_level == ThreatLevel::Blocked {
        SecurityValidation {
            passed: false,
            threat_level: ThreatLevel::Blocked,
            stage_reached: text.stage_reached.max(graph.stage_reached),
            confidence: graph.confidence,
            issues,
            latency_ms,
        }
    } else {
        SecurityValidation {
            passed: true,
            threat_level: text.threat_level,
            stage_reached: text.stage_reached,
            confidence: text.confidence.min(graph.confidence),
            issues,
            latency_ms,
        }
    }
}
