//! Engine configuration from the environment
//!
//! `.env` is loaded first (if present), then every setting falls back to a
//! default when its variable is unset. Malformed values are errors rather
//! than silently ignored.

use crate::catalog::executors;
use crate::error::ConfigError;
use crate::nl2op::parser::DEFAULT_CLARIFICATION_THRESHOLD;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 100;

/// Executor name, URL variable and default URL
const EXECUTOR_URLS: [(&str, &str, &str); 6] = [
    (executors::STRUCTURED, "MCP_STRUCTURED_URL", "http://localhost:8010"),
    (executors::METADATA, "MCP_METADATA_URL", "http://localhost:8011"),
    (executors::PROFILE, "MCP_PROFILE_URL", "http://localhost:8012"),
    (executors::SEMANTIC, "MCP_SEMANTIC_URL", "http://localhost:8013"),
    (executors::CACHE, "MCP_CACHE_URL", "http://localhost:8014"),
    (executors::VISUALIZATION, "MCP_VISUALIZATION_URL", "http://localhost:8015"),
];

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub rate_limit_per_minute: u32,
    /// Run the Stage 2 classifier on every query, not only suspicious ones
    pub enable_neural_security: bool,
    /// Escalate still-suspicious queries to the LLM (needs an API key)
    pub enable_llm_arbitration: bool,
    /// Feed execution timings back into cost estimation
    pub enable_memory_systems: bool,
    pub groq_api_key: Option<String>,
    pub llm_model: Option<String>,
    pub llm_base_url: Option<String>,
    /// Executor name → base URL
    pub executor_urls: BTreeMap<String, String>,
    pub domain_dir: Option<PathBuf>,
    pub clarification_threshold: f64,
    pub default_deadline_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rate_limit_per_minute: DEFAULT_RATE_LIMIT_PER_MINUTE,
            enable_neural_security: false,
            enable_llm_arbitration: true,
            enable_memory_systems: true,
            groq_api_key: None,
            llm_model: None,
            llm_base_url: None,
            executor_urls: EXECUTOR_URLS
                .iter()
                .map(|(name, _, url)| (name.to_string(), url.to_string()))
                .collect(),
            domain_dir: None,
            clarification_threshold: DEFAULT_CLARIFICATION_THRESHOLD,
            default_deadline_ms: None,
        }
    }
}

impl EngineConfig {
    /// Load `.env`, then read the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let mut executor_urls = BTreeMap::new();
        for (name, key, default) in EXECUTOR_URLS {
            let url = lookup(key).unwrap_or_else(|| default.to_string());
            executor_urls.insert(name.to_string(), url);
        }

        let clarification_threshold = env_parse(
            &lookup,
            "CLARIFICATION_THRESHOLD",
            defaults.clarification_threshold,
        )?;
        if !(0.0..=1.0).contains(&clarification_threshold) {
            return Err(ConfigError::InvalidValue {
                key: "CLARIFICATION_THRESHOLD".into(),
                value: clarification_threshold.to_string(),
                message: "must be between 0 and 1".into(),
            });
        }

        let default_deadline_ms = match lookup("DEFAULT_DEADLINE_MS") {
            Some(raw) => Some(parse_value("DEFAULT_DEADLINE_MS", &raw)?),
            None => None,
        };

        Ok(Self {
            rate_limit_per_minute: env_parse(
                &lookup,
                "RATE_LIMIT_PER_MINUTE",
                defaults.rate_limit_per_minute,
            )?,
            enable_neural_security: env_bool(
                &lookup,
                "ENABLE_NEURAL_SECURITY",
                defaults.enable_neural_security,
            ),
            enable_llm_arbitration: env_bool(
                &lookup,
                "ENABLE_LLM_ARBITRATION",
                defaults.enable_llm_arbitration,
            ),
            enable_memory_systems: env_bool(
                &lookup,
                "ENABLE_MEMORY_SYSTEMS",
                defaults.enable_memory_systems,
            ),
            groq_api_key: lookup("GROQ_API_KEY").filter(|k| !k.is_empty()),
            llm_model: lookup("LLM_MODEL"),
            llm_base_url: lookup("LLM_BASE_URL"),
            executor_urls,
            domain_dir: lookup("FLOATCHAT_DOMAIN_DIR").map(PathBuf::from),
            clarification_threshold,
            default_deadline_ms,
        })
    }

    /// Stage 3 is wired only when enabled and a key is available
    pub fn llm_escalation_available(&self) -> bool {
        self.enable_llm_arbitration && self.groq_api_key.is_some()
    }
}

fn env_bool<F>(lookup: &F, key: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(v) => matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"),
        None => default,
    }
}

fn env_parse<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
            message: e.to_string(),
        })
}
