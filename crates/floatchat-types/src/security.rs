//! Security validation verdicts

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreatLevel {
    Safe,
    Suspicious,
    Blocked,
}

impl ThreatLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatLevel::Safe => "SAFE",
            ThreatLevel::Suspicious => "SUSPICIOUS",
            ThreatLevel::Blocked => "BLOCKED",
        }
    }
}

impl fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of screening one request.
///
/// `stage_reached` is 1..=3 for the pattern, heuristic and escalation
/// stages; 0 means the request was refused by the rate-limit gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityValidation {
    pub passed: bool,
    pub threat_level: ThreatLevel,
    pub stage_reached: u8,
    pub confidence: f64,
    #[serde(default)]
    pub issues: Vec<String>,
    pub latency_ms: f64,
}

impl SecurityValidation {
    pub fn is_blocked(&self) -> bool {
        self.threat_level == ThreatLevel::Blocked
    }
}
