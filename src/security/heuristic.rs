//! Stage 2: classifier screening
//!
//! A pluggable `ThreatClassifier` (typically an embedding model) with a
//! deterministic heuristic fallback when none is attached.

use super::patterns::StageVerdict;
use anyhow::Result;
use async_trait::async_trait;
use floatchat_types::ThreatLevel;

pub const MAX_QUERY_CHARS: usize = 5000;
pub const SPECIAL_CHAR_DENSITY: f64 = 0.3;
pub const SUSPICIOUS_BELOW: f64 = 0.5;

/// Markers of URL- or hex-encoded payloads
const ENCODED_MARKERS: [&str; 3] = ["%27", "%3D", "0x"];

/// Learned classifier for Stage 2
#[async_trait]
pub trait ThreatClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<StageVerdict>;
}

/// Score starts at 1.0 and loses points for each red flag
pub fn heuristic_check(text: &str) -> StageVerdict {
    let mut score: f64 = 1.0;
    let mut issues = Vec::new();

    let total = text.chars().count();
    if total > MAX_QUERY_CHARS {
        score -= 0.2;
        issues.push("Query length exceeds recommended limit".to_string());
    }

    let special = text
        .chars()
        .filter(|c| !c.is_alphanumeric() && !c.is_whitespace())
        .count();
    if special as f64 / total.max(1) as f64 > SPECIAL_CHAR_DENSITY {
        score -= 0.2;
        issues.push("High special character density".to_string());
    }

    if ENCODED_MARKERS.iter().any(|m| text.contains(m)) {
        score -= 0.3;
        issues.push("Potentially encoded malicious content".to_string());
    }

    let threat_level = if score < SUSPICIOUS_BELOW {
        ThreatLevel::Suspicious
    } else {
        ThreatLevel::Safe
    };

    StageVerdict {
        threat_level,
        score,
        issues,
    }
}

/// Run the classifier when present, otherwise the heuristic.
/// A classifier failure escalates rather than passes.
pub async fn stage2(classifier: Option<&dyn ThreatClassifier>, text: &str) -> StageVerdict {
    let Some(classifier) = classifier else {
        return heuristic_check(text);
    };
    match classifier.classify(text).await {
        Ok(verdict) => verdict,
        Err(e) => {
            tracing::warn!(error = %e, "Threat classifier failed");
            StageVerdict {
                threat_level: ThreatLevel::Suspicious,
                score: 0.5,
                issues: vec!["Neural check failed, escalating".to_string()],
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    struct Broken;

    #[async_trait]
    impl ThreatClassifier for Broken {
        async fn classify(&self, _text: &str) -> Result<StageVerdict> {
            Err(anyhow!("model not loaded"))
        }
    }

    #[test]
    fn test_plain_text_is_safe() {
        let verdict = heuristic_check("what is the admin contact for float data");
        assert_eq!(verdict.threat_level, ThreatLevel::Safe);
        assert_eq!(verdict.score, 1.0);
        assert!(verdict.issues.is_empty());
    }

    #[test]
    fn test_two_flags_still_pass() {
        // Dense and encoded, but short: 1.0 - 0.2 - 0.3 = 0.5
        let verdict = heuristic_check("%27;--%3D%27--");
        assert_eq!(verdict.threat_level, ThreatLevel::Safe);
        assert_eq!(verdict.issues.len(), 2);
    }

    #[test]
    fn test_all_flags_are_suspicious() {
        let verdict = heuristic_check(&"%27;--".repeat(1000));
        assert_eq!(verdict.threat_level, ThreatLevel::Suspicious);
        assert!((verdict.score - 0.3).abs() < 1e-9);
        assert_eq!(verdict.issues.len(), 3);
    }

    #[test]
    fn test_long_query_alone_is_not_suspicious() {
        let verdict = heuristic_check(&"a".repeat(MAX_QUERY_CHARS + 1));
        assert_eq!(verdict.threat_level, ThreatLevel::Safe);
        assert!((verdict.score - 0.8).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_classifier_failure_escalates() {
        let verdict = stage2(Some(&Broken as &dyn ThreatClassifier), "anything").await;
        assert_eq!(verdict.threat_level, ThreatLevel::Suspicious);
    }
}
