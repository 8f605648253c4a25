//! Semantic parser: natural language to operator DAG
//!
//! Stateless per call:
//! 1. Extract entities
//! 2. Detect intent (keyword table, then entity-shape fallback)
//! 3. Generate the operator chain
//! 4. Score confidence as the mean of entity, operator and intent scores
//! 5. Below the clarification threshold, offer alternative readings

use crate::domain::{DomainKnowledge, DomainTableError};
use crate::nl2op::entity_extractor::EntityExtractor;
use crate::nl2op::operator_generator::OperatorGenerator;
use crate::nl2op::recognizer::NamedEntityRecognizer;
use crate::nl2op::ParseContext;
use chrono::NaiveDateTime;
use floatchat_types::{
    ExtractedEntities, Operator, ParameterEntity, ParseMode, QueryIntent, SemanticOperatorDAG,
};
use regex::Regex;
use std::sync::Arc;

/// Parses below this confidence carry alternatives and are not executed
pub const DEFAULT_CLARIFICATION_THRESHOLD: f64 = 0.7;

const NO_ENTITY_SCORE: f64 = 0.3;
const NO_OPERATOR_SCORE: f64 = 0.2;
const SPECIFIC_INTENT_SCORE: f64 = 0.9;
const GENERAL_INTENT_SCORE: f64 = 0.5;

const GLOBAL_ALTERNATIVE_CONFIDENCE: f64 = 0.6;
const MULTI_PARAMETER_ALTERNATIVE_CONFIDENCE: f64 = 0.5;
const MAX_ALTERNATIVES: usize = 3;

// ============================================================================
// INTENT DETECTION
// ============================================================================

/// Keyword-table intent detection with an entity-shape fallback
pub struct IntentDetector {
    keywords: Vec<(QueryIntent, Regex)>,
}

impl IntentDetector {
    pub fn new(domain: &DomainKnowledge) -> Result<Self, DomainTableError> {
        let keywords = domain
            .intents
            .intents
            .iter()
            .filter(|entry| !entry.keywords.is_empty())
            .map(|entry| {
                let alternation = entry
                    .keywords
                    .iter()
                    .map(|k| regex::escape(k))
                    .collect::<Vec<_>>()
                    .join("|");
                let pattern = format!(r"(?i)\b(?:{})\b", alternation);
                let regex = Regex::new(&pattern).map_err(|e| DomainTableError::InvalidPattern {
                    pattern,
                    message: e.to_string(),
                })?;
                Ok((entry.intent, regex))
            })
            .collect::<Result<Vec<_>, DomainTableError>>()?;
        Ok(Self { keywords })
    }

    pub fn detect(&self, text: &str, entities: &ExtractedEntities) -> QueryIntent {
        if let Some((intent, _)) = self.keywords.iter().find(|(_, re)| re.is_match(text)) {
            return *intent;
        }
        Self::fallback(entities)
    }

    /// Priority fallback when no keyword matched
    pub fn fallback(entities: &ExtractedEntities) -> QueryIntent {
        let has_spatial = !entities.spatial.is_empty();
        let has_temporal = !entities.temporal.is_empty();

        if has_temporal && !has_spatial {
            QueryIntent::TimeSeriesAnalysis
        } else if has_spatial && !has_temporal {
            QueryIntent::SpatialAnalysis
        } else if entities.parameters.len() >= 2 {
            QueryIntent::Comparison
        } else if !entities.floats.is_empty() {
            QueryIntent::FloatTracking
        } else if !entities.depth.is_empty() {
            QueryIntent::ProfileAnalysis
        } else {
            QueryIntent::GeneralQuery
        }
    }
}

// ============================================================================
// PARSER
// ============================================================================

pub struct SemanticParser {
    domain: Arc<DomainKnowledge>,
    extractor: EntityExtractor,
    generator: OperatorGenerator,
    detector: IntentDetector,
    clarification_threshold: f64,
}

impl SemanticParser {
    pub fn new(domain: Arc<DomainKnowledge>) -> Result<Self, DomainTableError> {
        Ok(Self {
            extractor: EntityExtractor::new(domain.clone())?,
            generator: OperatorGenerator::new(domain.clone()),
            detector: IntentDetector::new(&domain)?,
            domain,
            clarification_threshold: DEFAULT_CLARIFICATION_THRESHOLD,
        })
    }

    pub fn with_recognizer(mut self, recognizer: Arc<dyn NamedEntityRecognizer>) -> Self {
        self.extractor = self.extractor.with_recognizer(recognizer);
        self
    }

    pub fn with_clarification_threshold(mut self, threshold: f64) -> Self {
        self.clarification_threshold = threshold;
        self
    }

    pub fn clarification_threshold(&self) -> f64 {
        self.clarification_threshold
    }

    pub fn parse(
        &self,
        query: &str,
        context: &ParseContext,
        mode: ParseMode,
    ) -> SemanticOperatorDAG {
        let now = chrono::Local::now().naive_local();
        self.parse_at(query, context, mode, now)
    }

    /// Parse with an explicit "now" for relative dates
    pub fn parse_at(
        &self,
        query: &str,
        context: &ParseContext,
        mode: ParseMode,
        now: NaiveDateTime,
    ) -> SemanticOperatorDAG {
        let preview: String = query.chars().take(100).collect();
        tracing::info!(query = %preview, ?mode, "Parsing query");

        let entities = self.extractor.extract_at(query, context, now);
        let intent = self.detector.detect(query, &entities);
        let (operators, edges) = self.generator.generate(&entities, intent);
        let confidence = score_confidence(&entities, &operators, intent);

        let alternatives = if confidence < self.clarification_threshold {
            self.alternatives(&entities, mode)
        } else {
            Vec::new()
        };

        tracing::info!(
            operators = operators.len(),
            intent = %intent,
            confidence,
            alternatives = alternatives.len(),
            "Parsed query"
        );

        SemanticOperatorDAG {
            operators,
            edges,
            confidence,
            intent,
            entities,
            alternatives,
            mode,
        }
    }

    /// Alternative readings: drop the spatial constraint, or widen to the
    /// common parameter set
    fn alternatives(
        &self,
        entities: &ExtractedEntities,
        mode: ParseMode,
    ) -> Vec<SemanticOperatorDAG> {
        let mut alternatives = Vec::new();

        if !entities.spatial.is_empty() {
            let alt = ExtractedEntities {
                spatial: Vec::new(),
                ..entities.clone()
            };
            alternatives.push(self.alternative(
                alt,
                QueryIntent::GlobalAnalysis,
                GLOBAL_ALTERNATIVE_CONFIDENCE,
                mode,
            ));
        }

        if !entities.parameters.is_empty() {
            let common: Vec<ParameterEntity> = self
                .domain
                .parameters
                .common_parameters
                .iter()
                .take(3)
                .filter_map(|name| self.domain.parameters.get(name))
                .map(|def| ParameterEntity {
                    name: def.name.clone(),
                    column: def.column.clone(),
                    unit: def.unit.clone(),
                    confidence: MULTI_PARAMETER_ALTERNATIVE_CONFIDENCE,
                })
                .collect();
            let alt = ExtractedEntities {
                parameters: common,
                ..entities.clone()
            };
            alternatives.push(self.alternative(
                alt,
                QueryIntent::MultiParameter,
                MULTI_PARAMETER_ALTERNATIVE_CONFIDENCE,
                mode,
            ));
        }

        alternatives.truncate(MAX_ALTERNATIVES);
        alternatives
    }

    fn alternative(
        &self,
        entities: ExtractedEntities,
        intent: QueryIntent,
        confidence: f64,
        mode: ParseMode,
    ) -> SemanticOperatorDAG {
        let (operators, edges) = self.generator.generate(&entities, intent);
        SemanticOperatorDAG {
            operators,
            edges,
            confidence,
            intent,
            entities,
            alternatives: Vec::new(),
            mode,
        }
    }
}

/// Mean of entity, operator and intent scores
pub fn score_confidence(
    entities: &ExtractedEntities,
    operators: &[Operator],
    intent: QueryIntent,
) -> f64 {
    let entity_score = entities.mean_confidence().unwrap_or(NO_ENTITY_SCORE);
    let operator_score = if operators.is_empty() {
        NO_OPERATOR_SCORE
    } else {
        (operators.len() as f64 / 3.0).min(1.0)
    };
    let intent_score = if intent.is_general() {
        GENERAL_INTENT_SCORE
    } else {
        SPECIFIC_INTENT_SCORE
    };
    (entity_score + operator_score + intent_score) / 3.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use floatchat_types::{OperatorKind, TemporalKind};

    fn parser() -> SemanticParser {
        SemanticParser::new(Arc::new(DomainKnowledge::builtin().unwrap())).unwrap()
    }

    fn now() -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2024, 6, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_hello_is_low_confidence() {
        let dag = parser().parse_at("hello", &ParseContext::new(), ParseMode::Explorer, now());
        assert!(dag.confidence < 0.5, "confidence {}", dag.confidence);
        assert_eq!(dag.intent, QueryIntent::GeneralQuery);
        assert_eq!(dag.operators.len(), 1);
        // Nothing to broaden or substitute
        assert!(dag.alternatives.is_empty());
    }

    #[test]
    fn test_region_and_year() {
        let dag = parser().parse_at(
            "Show temperature in the Arabian Sea for 2020",
            &ParseContext::new(),
            ParseMode::Explorer,
            now(),
        );

        assert_eq!(dag.entities.spatial.len(), 1);
        assert_eq!(dag.entities.spatial[0].name, "Arabian Sea");
        assert_eq!(dag.entities.temporal.len(), 1);
        assert_eq!(dag.entities.temporal[0].kind, TemporalKind::Year);

        let filters = dag.operators.iter().filter(|o| o.kind.is_filter()).count();
        assert!(filters >= 2);
        assert_eq!(
            dag.operators.last().map(|o| o.kind),
            Some(OperatorKind::Visualize)
        );
        assert!(dag.confidence >= DEFAULT_CLARIFICATION_THRESHOLD);
        assert!(dag.alternatives.is_empty());
    }

    #[test]
    fn test_keyword_intent_wins_over_fallback() {
        let dag = parser().parse_at(
            "mixed layer depth in the Bay of Bengal",
            &ParseContext::new(),
            ParseMode::Power,
            now(),
        );
        assert_eq!(dag.intent, QueryIntent::ProfileAnalysis);
        assert_eq!(dag.mode, ParseMode::Power);
    }

    #[test]
    fn test_keywords_match_whole_words() {
        // "temperature" contains "rate" but is not a gradient query
        let detector = IntentDetector::new(&DomainKnowledge::builtin().unwrap()).unwrap();
        assert_eq!(
            detector.detect("temperature", &ExtractedEntities::new()),
            QueryIntent::GeneralQuery
        );
        assert_eq!(
            detector.detect("temperature gradient", &ExtractedEntities::new()),
            QueryIntent::GradientAnalysis
        );
    }

    #[test]
    fn test_fallback_priority() {
        let parser = parser();
        let ctx = ParseContext::new();
        let dag = parser.parse_at("salinity last 2 years", &ctx, ParseMode::Explorer, now());
        assert_eq!(dag.intent, QueryIntent::TimeSeriesAnalysis);

        let dag = parser.parse_at("temperature and salinity", &ctx, ParseMode::Explorer, now());
        assert_eq!(dag.intent, QueryIntent::Comparison);
        assert!(dag
            .operators
            .iter()
            .any(|o| o.kind == OperatorKind::ComputeStats));
    }

    #[test]
    fn test_alternatives_for_ambiguous_query() {
        let parser = parser().with_clarification_threshold(0.99);
        let dag = parser.parse_at(
            "oxygen near the Red Sea",
            &ParseContext::new(),
            ParseMode::Explorer,
            now(),
        );
        let intents: Vec<_> = dag.alternatives.iter().map(|a| a.intent).collect();
        assert_eq!(
            intents,
            vec![QueryIntent::GlobalAnalysis, QueryIntent::MultiParameter]
        );

        let global = &dag.alternatives[0];
        assert_eq!(global.confidence, 0.6);
        assert!(global.entities.spatial.is_empty());
        assert!(!global
            .operators
            .iter()
            .any(|o| o.kind == OperatorKind::SpatialFilter));

        let multi = &dag.alternatives[1];
        assert_eq!(multi.confidence, 0.5);
        let names: Vec<_> = multi.entities.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["temperature", "salinity", "pressure"]);
    }

    #[test]
    fn test_confidence_components() {
        let score = score_confidence(&ExtractedEntities::new(), &[], QueryIntent::GeneralQuery);
        assert!((score - (0.3 + 0.2 + 0.5) / 3.0).abs() < 1e-9);
    }
}
