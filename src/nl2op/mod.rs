//! NL2Operator: natural language to semantic operator DAG
//!
//! Pipeline: text -> entities -> intent -> operator chain -> confidence,
//! with alternative readings when the parse is ambiguous.

pub mod entity_extractor;
pub mod operator_generator;
pub mod parser;
pub mod recognizer;

use floatchat_types::QueryIntent;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use entity_extractor::EntityExtractor;
pub use operator_generator::OperatorGenerator;
pub use parser::{IntentDetector, SemanticParser};
pub use recognizer::{EntityLabel, NamedEntityRecognizer, NamedSpan, RuleBasedRecognizer};

/// Conversation state carried between turns by the caller
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseContext {
    /// Previous turn's intent
    #[serde(default)]
    pub last_intent: Option<QueryIntent>,
    /// Entities remembered for the session, e.g. `"region" -> "Arabian Sea"`
    #[serde(default)]
    pub session_entities: HashMap<String, String>,
}

impl ParseContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.session_entities.insert(key.into(), value.into());
        self
    }
}
