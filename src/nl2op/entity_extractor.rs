//! Entity Extractor
//!
//! Turns a free-text oceanographic question into typed entities.
//!
//! Six independent passes run over the text, each against the domain tables
//! plus a generic named-entity pass for places and dates the tables don't
//! cover. Every pass returns a (possibly empty) list and none of them can
//! fail. Confidence follows match specificity:
//! - exact lookup-table match: 0.95
//! - coordinate / identifier pattern: 0.9
//! - generic NER fallback: 0.6

use crate::domain::{DepthRule, DomainKnowledge, DomainTableError};
use crate::nl2op::recognizer::{EntityLabel, NamedEntityRecognizer, RuleBasedRecognizer};
use crate::nl2op::ParseContext;
use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime};
use floatchat_types::{
    BoundingBox, DepthEntity, ExtractedEntities, FloatEntity, ParameterEntity, QualityEntity,
    SpatialEntity, SpatialKind, TemporalEntity, TemporalKind,
};
use regex::Regex;
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

pub const LOOKUP_CONFIDENCE: f64 = 0.95;
pub const PATTERN_CONFIDENCE: f64 = 0.9;
pub const NER_CONFIDENCE: f64 = 0.6;
const SEASON_CONFIDENCE: f64 = 0.85;
const YEAR_CONFIDENCE: f64 = 0.85;
const CONTEXT_CONFIDENCE: f64 = 0.8;

static COORDINATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(-?\d+(?:\.\d+)?)\s*°?\s*([NS])[,\s]+(-?\d+(?:\.\d+)?)\s*°?\s*([EW])").unwrap()
});

static EQUATOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bequator\b").unwrap());

static FIRST_YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4}").unwrap());

static FLOAT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)float\s+(?:id\s+)?(\d{7})\b",
        r"(?i)platform\s+(\d{7})\b",
        r"#(\d{7})\b",
        r"\b(\d{7})\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Relative time window unit
#[derive(Debug, Clone, Copy)]
enum Window {
    Months,
    Years,
    Weeks,
    Days,
    ThisMonth,
    ThisYear,
}

static RELATIVE_PATTERNS: LazyLock<Vec<(Regex, Window)>> = LazyLock::new(|| {
    [
        (r"last\s+(\d+)?\s*month", Window::Months),
        (r"last\s+(\d+)?\s*year", Window::Years),
        (r"last\s+(\d+)?\s*week", Window::Weeks),
        (r"last\s+(\d+)?\s*day", Window::Days),
        (r"past\s+(\d+)?\s*month", Window::Months),
        (r"this\s+month", Window::ThisMonth),
        (r"this\s+year", Window::ThisYear),
    ]
    .into_iter()
    .map(|(p, w)| (Regex::new(&format!(r"(?i)\b{p}")).unwrap(), w))
    .collect()
});

/// Season name, first month, last month. Winter wraps into the previous year.
const SEASONS: &[(&str, u32, u32)] = &[
    ("winter", 12, 2),
    ("spring", 3, 5),
    ("summer", 6, 8),
    ("fall", 9, 11),
    ("autumn", 9, 11),
];

const MONTH_NAMES: &[&str] = &[
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december",
];

fn word_pattern(words: &[&str]) -> Result<Regex, DomainTableError> {
    let alternation = words
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = format!(r"(?i)\b(?:{})\b", alternation);
    Regex::new(&pattern).map_err(|e| DomainTableError::InvalidPattern {
        pattern,
        message: e.to_string(),
    })
}

fn midnight(year: i32, month: u32, day: u32) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year, month, day).and_then(|d| d.and_hms_opt(0, 0, 0))
}

struct CompiledRegion {
    index: usize,
    regex: Regex,
}

struct CompiledParameter {
    index: usize,
    regex: Regex,
}

struct CompiledQuality {
    index: usize,
    regex: Regex,
}

struct CompiledDataMode {
    mode: String,
    regex: Regex,
}

struct CompiledDepthPattern {
    regex: Regex,
    rule: DepthRule,
}

/// The entity extractor
pub struct EntityExtractor {
    domain: Arc<DomainKnowledge>,
    recognizer: Arc<dyn NamedEntityRecognizer>,
    regions: Vec<CompiledRegion>,
    parameters: Vec<CompiledParameter>,
    quality: Vec<CompiledQuality>,
    data_modes: Vec<CompiledDataMode>,
    depth: Vec<CompiledDepthPattern>,
}

impl EntityExtractor {
    /// Compile the domain tables into matchers. Uses the rule-based
    /// recognizer; see [`EntityExtractor::with_recognizer`].
    pub fn new(domain: Arc<DomainKnowledge>) -> Result<Self, DomainTableError> {
        let regions = domain
            .regions
            .regions
            .iter()
            .enumerate()
            .map(|(index, r)| {
                Ok(CompiledRegion {
                    index,
                    regex: word_pattern(&[r.name.as_str()])?,
                })
            })
            .collect::<Result<Vec<_>, DomainTableError>>()?;

        let parameters = domain
            .parameters
            .parameters
            .iter()
            .enumerate()
            .map(|(index, p)| {
                let mut words: Vec<&str> = vec![p.name.as_str()];
                words.extend(p.aliases.iter().map(String::as_str));
                Ok(CompiledParameter {
                    index,
                    regex: word_pattern(&words)?,
                })
            })
            .collect::<Result<Vec<_>, DomainTableError>>()?;

        let quality = domain
            .quality
            .qc_mappings
            .iter()
            .enumerate()
            .map(|(index, q)| {
                Ok(CompiledQuality {
                    index,
                    regex: word_pattern(&[q.phrase.as_str()])?,
                })
            })
            .collect::<Result<Vec<_>, DomainTableError>>()?;

        let data_modes = domain
            .quality
            .data_modes
            .iter()
            .map(|rule| {
                let words: Vec<&str> = rule.keywords.iter().map(String::as_str).collect();
                Ok(CompiledDataMode {
                    mode: rule.mode.clone(),
                    regex: word_pattern(&words)?,
                })
            })
            .collect::<Result<Vec<_>, DomainTableError>>()?;

        let depth = domain
            .depth
            .depth_patterns
            .iter()
            .map(|d| {
                let pattern = format!(r"(?i)\b(?:{})\b", d.pattern);
                let regex =
                    Regex::new(&pattern).map_err(|e| DomainTableError::InvalidPattern {
                        pattern: d.pattern.clone(),
                        message: e.to_string(),
                    })?;
                Ok(CompiledDepthPattern {
                    regex,
                    rule: d.rule.clone(),
                })
            })
            .collect::<Result<Vec<_>, DomainTableError>>()?;

        Ok(Self {
            domain,
            recognizer: Arc::new(RuleBasedRecognizer::new()),
            regions,
            parameters,
            quality,
            data_modes,
            depth,
        })
    }

    /// Replace the generic named-entity recognizer
    pub fn with_recognizer(mut self, recognizer: Arc<dyn NamedEntityRecognizer>) -> Self {
        self.recognizer = recognizer;
        self
    }

    /// Extract all entity classes, resolving relative dates against the
    /// local clock
    pub fn extract(&self, text: &str, context: &ParseContext) -> ExtractedEntities {
        let now = chrono::Local::now().naive_local();
        self.extract_at(text, context, now)
    }

    /// Extract all entity classes with an explicit "now"
    pub fn extract_at(
        &self,
        text: &str,
        context: &ParseContext,
        now: NaiveDateTime,
    ) -> ExtractedEntities {
        let mut entities = ExtractedEntities {
            spatial: self.extract_spatial(text),
            temporal: self.extract_temporal(text, now),
            parameters: self.extract_parameters(text),
            floats: self.extract_floats(text),
            quality: self.extract_quality(text),
            depth: self.extract_depth(text),
        };

        self.infer_from_context(&mut entities, context);

        tracing::debug!(
            spatial = entities.spatial.len(),
            temporal = entities.temporal.len(),
            parameters = entities.parameters.len(),
            floats = entities.floats.len(),
            quality = entities.quality.len(),
            depth = entities.depth.len(),
            "Extracted entities"
        );

        entities
    }

    // ------------------------------------------------------------------------
    // Spatial
    // ------------------------------------------------------------------------

    pub fn extract_spatial(&self, text: &str) -> Vec<SpatialEntity> {
        let mut entities = Vec::new();

        for compiled in &self.regions {
            if compiled.regex.is_match(text) {
                let region = &self.domain.regions.regions[compiled.index];
                entities.push(SpatialEntity {
                    name: region.name.clone(),
                    kind: SpatialKind::Region,
                    bbox: Some(region.bbox),
                    center: Some(region.center),
                    confidence: LOOKUP_CONFIDENCE,
                });
            }
        }

        for caps in COORDINATE.captures_iter(text) {
            let (Some(lat), Some(ns), Some(lon), Some(ew)) =
                (caps.get(1), caps.get(2), caps.get(3), caps.get(4))
            else {
                continue;
            };
            let (Ok(mut lat_v), Ok(mut lon_v)) =
                (lat.as_str().parse::<f64>(), lon.as_str().parse::<f64>())
            else {
                continue;
            };
            if ns.as_str().eq_ignore_ascii_case("s") {
                lat_v = -lat_v;
            }
            if ew.as_str().eq_ignore_ascii_case("w") {
                lon_v = -lon_v;
            }
            entities.push(SpatialEntity {
                name: caps[0].trim().to_string(),
                kind: SpatialKind::Point,
                bbox: Some(BoundingBox::around(lon_v, lat_v, 1.0)),
                center: Some((lon_v, lat_v)),
                confidence: PATTERN_CONFIDENCE,
            });
        }

        if EQUATOR.is_match(text) {
            let equator = &self.domain.regions.equator;
            entities.push(SpatialEntity {
                name: equator.name.clone(),
                kind: SpatialKind::Region,
                bbox: Some(equator.bbox),
                center: Some(equator.center),
                confidence: LOOKUP_CONFIDENCE,
            });
        }

        for span in self.recognizer.recognize(text) {
            if span.label != EntityLabel::Location {
                continue;
            }
            let candidate = span.text.to_lowercase();
            let known = self.domain.regions.regions.iter().any(|r| {
                let name = r.name.to_lowercase();
                name.contains(&candidate) || candidate.contains(&name)
            });
            let seen = entities
                .iter()
                .any(|e| e.name.eq_ignore_ascii_case(&span.text));
            if !known && !seen {
                entities.push(SpatialEntity {
                    name: span.text,
                    kind: SpatialKind::Location,
                    bbox: None,
                    center: None,
                    confidence: NER_CONFIDENCE,
                });
            }
        }

        entities
    }

    // ------------------------------------------------------------------------
    // Temporal
    // ------------------------------------------------------------------------

    pub fn extract_temporal(&self, text: &str, now: NaiveDateTime) -> Vec<TemporalEntity> {
        let mut entities = Vec::new();

        for (regex, window) in RELATIVE_PATTERNS.iter() {
            let Some(caps) = regex.captures(text) else {
                continue;
            };
            let n: u32 = caps
                .get(1)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(1);
            let start = match window {
                Window::Months => now.checked_sub_months(Months::new(n)),
                Window::Years => n
                    .checked_mul(12)
                    .and_then(|m| now.checked_sub_months(Months::new(m))),
                Window::Weeks => now.checked_sub_signed(Duration::days(7 * i64::from(n))),
                Window::Days => now.checked_sub_signed(Duration::days(i64::from(n))),
                Window::ThisMonth => now.with_day(1),
                Window::ThisYear => now.with_day(1).and_then(|d| d.with_month(1)),
            };
            if let Some(start) = start {
                entities.push(TemporalEntity {
                    text: caps[0].to_lowercase(),
                    kind: TemporalKind::Relative,
                    start,
                    end: now,
                    confidence: PATTERN_CONFIDENCE,
                });
            }
        }

        let year = FIRST_YEAR
            .find(text)
            .and_then(|m| m.as_str().parse::<i32>().ok())
            .unwrap_or_else(|| now.year());
        let lower = text.to_lowercase();
        for &(season, first, last) in SEASONS {
            if !lower
                .split(|c: char| !c.is_alphanumeric())
                .any(|w| w == season)
            {
                continue;
            }
            let span = if first > last {
                midnight(year - 1, first, 1).zip(midnight(year, last, 28))
            } else {
                midnight(year, first, 1).zip(midnight(year, last, 28))
            };
            if let Some((start, end)) = span {
                entities.push(TemporalEntity {
                    text: format!("{} {}", season, year),
                    kind: TemporalKind::Season,
                    start,
                    end,
                    confidence: SEASON_CONFIDENCE,
                });
            }
        }

        for span in self.recognizer.recognize(text) {
            if span.label != EntityLabel::Date {
                continue;
            }
            if let Some(entity) = Self::date_entity(&span.text) {
                entities.push(entity);
            }
        }

        entities
    }

    /// Interpret a recognised date span: full date, month + year, or year
    fn date_entity(text: &str) -> Option<TemporalEntity> {
        if let Ok(date) = NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d") {
            let start = date.and_hms_opt(0, 0, 0)?;
            return Some(TemporalEntity {
                text: text.to_string(),
                kind: TemporalKind::Absolute,
                start,
                end: start.checked_add_signed(Duration::days(1))?,
                confidence: LOOKUP_CONFIDENCE,
            });
        }

        let lower = text.to_lowercase();
        let mut words = lower.split_whitespace();
        if let (Some(first), Some(second)) = (words.next(), words.next()) {
            if let Some(month_idx) = MONTH_NAMES.iter().position(|m| *m == first) {
                let year: i32 = second.parse().ok()?;
                let start = midnight(year, month_idx as u32 + 1, 1)?;
                return Some(TemporalEntity {
                    text: text.to_string(),
                    kind: TemporalKind::Month,
                    start,
                    end: start.checked_add_months(Months::new(1))?,
                    confidence: PATTERN_CONFIDENCE,
                });
            }
        }

        let year: i32 = FIRST_YEAR.find(text)?.as_str().parse().ok()?;
        Some(TemporalEntity {
            text: text.to_string(),
            kind: TemporalKind::Year,
            start: midnight(year, 1, 1)?,
            end: midnight(year, 12, 31)?,
            confidence: YEAR_CONFIDENCE,
        })
    }

    // ------------------------------------------------------------------------
    // Parameters, floats, quality, depth
    // ------------------------------------------------------------------------

    pub fn extract_parameters(&self, text: &str) -> Vec<ParameterEntity> {
        self.parameters
            .iter()
            .filter(|c| c.regex.is_match(text))
            .map(|c| {
                let def = &self.domain.parameters.parameters[c.index];
                ParameterEntity {
                    name: def.name.clone(),
                    column: def.column.clone(),
                    unit: def.unit.clone().filter(|u| !u.is_empty()),
                    confidence: LOOKUP_CONFIDENCE,
                }
            })
            .collect()
    }

    pub fn extract_floats(&self, text: &str) -> Vec<FloatEntity> {
        let mut seen = HashSet::new();
        let mut entities = Vec::new();
        for regex in FLOAT_PATTERNS.iter() {
            for caps in regex.captures_iter(text) {
                let Some(id) = caps.get(1) else { continue };
                if seen.insert(id.as_str().to_string()) {
                    entities.push(FloatEntity {
                        text: caps[0].to_string(),
                        float_id: id.as_str().to_string(),
                        confidence: PATTERN_CONFIDENCE,
                    });
                }
            }
        }
        entities
    }

    pub fn extract_quality(&self, text: &str) -> Vec<QualityEntity> {
        let mut entities: Vec<QualityEntity> = self
            .quality
            .iter()
            .filter(|c| c.regex.is_match(text))
            .map(|c| {
                let mapping = &self.domain.quality.qc_mappings[c.index];
                QualityEntity {
                    text: mapping.phrase.clone(),
                    qc_flags: mapping.flags.clone(),
                    data_mode: mapping.data_mode.clone(),
                    confidence: PATTERN_CONFIDENCE,
                }
            })
            .collect();

        if let Some((mode, found)) = self
            .data_modes
            .iter()
            .find_map(|m| m.regex.find(text).map(|f| (m.mode.clone(), f)))
        {
            entities.push(QualityEntity {
                text: found.as_str().to_lowercase(),
                qc_flags: Vec::new(),
                data_mode: Some(mode),
                confidence: PATTERN_CONFIDENCE,
            });
        }

        entities
    }

    pub fn extract_depth(&self, text: &str) -> Vec<DepthEntity> {
        let mut entities = Vec::new();
        for compiled in &self.depth {
            let Some(caps) = compiled.regex.captures(text) else {
                continue;
            };
            let capture = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<f64>().ok());
            let range = match &compiled.rule {
                DepthRule::Below => capture(1).map(|v| (Some(v), None)),
                DepthRule::Above => capture(1).map(|v| (None, Some(v))),
                DepthRule::Between => capture(1)
                    .zip(capture(2))
                    .map(|(lo, hi)| (Some(lo), Some(hi))),
                DepthRule::Around { tolerance } => {
                    capture(1).map(|v| (Some(v - tolerance), Some(v + tolerance)))
                }
                DepthRule::Fixed { min, max } => Some((*min, *max)),
            };
            if let Some((min_depth, max_depth)) = range {
                entities.push(DepthEntity {
                    text: caps[0].to_lowercase(),
                    min_depth,
                    max_depth,
                    confidence: PATTERN_CONFIDENCE,
                });
            }
        }
        entities
    }

    // ------------------------------------------------------------------------
    // Context
    // ------------------------------------------------------------------------

    /// Carry the session's region forward when the query names none
    fn infer_from_context(&self, entities: &mut ExtractedEntities, context: &ParseContext) {
        if !entities.spatial.is_empty() {
            return;
        }
        let Some(region) = context
            .session_entities
            .get("region")
            .and_then(|name| self.domain.regions.get(name))
        else {
            return;
        };
        entities.spatial.push(SpatialEntity {
            name: region.name.clone(),
            kind: SpatialKind::Region,
            bbox: Some(region.bbox),
            center: Some(region.center),
            confidence: CONTEXT_CONFIDENCE,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> EntityExtractor {
        let domain = Arc::new(DomainKnowledge::builtin().unwrap());
        EntityExtractor::new(domain).unwrap()
    }

    fn now() -> NaiveDateTime {
        midnight(2024, 6, 15).unwrap()
    }

    #[test]
    fn test_region_lookup() {
        let spatial = extractor().extract_spatial("Show temperature in the Arabian Sea");
        assert_eq!(spatial.len(), 1);
        assert_eq!(spatial[0].name, "Arabian Sea");
        assert_eq!(spatial[0].kind, SpatialKind::Region);
        assert_eq!(spatial[0].confidence, LOOKUP_CONFIDENCE);
        assert_eq!(
            spatial[0].bbox,
            Some(BoundingBox::new(50.0, 8.0, 77.0, 28.0))
        );
    }

    #[test]
    fn test_coordinates() {
        let spatial = extractor().extract_spatial("profiles near 15.5°S, 70°W");
        let point = spatial
            .iter()
            .find(|e| e.kind == SpatialKind::Point).unwrap();
        assert_eq!(point.center, Some((-70.0, -15.5)));
        assert_eq!(
            point.bbox,
            Some(BoundingBox::new(-71.0, -16.5, -69.0, -14.5))
        );
        assert_eq!(point.confidence, PATTERN_CONFIDENCE);
    }

    #[test]
    fn test_equator_and_unknown_location() {
        let spatial = extractor().extract_spatial("salinity along the equator near Madagascar");
        assert!(spatial.iter().any(|e| e.name == "Equator"));
        let madagascar = spatial.iter().find(|e| e.name == "Madagascar").unwrap();
        assert_eq!(madagascar.kind, SpatialKind::Location);
        assert!(madagascar.bbox.is_none());
        assert_eq!(madagascar.confidence, NER_CONFIDENCE);
    }

    #[test]
    fn test_year() {
        let temporal = extractor().extract_temporal("temperature for 2020", now());
        assert_eq!(temporal.len(), 1);
        assert_eq!(temporal[0].kind, TemporalKind::Year);
        assert_eq!(temporal[0].start, midnight(2020, 1, 1).unwrap());
        assert_eq!(temporal[0].end, midnight(2020, 12, 31).unwrap());
    }

    #[test]
    fn test_relative_windows() {
        let temporal = extractor().extract_temporal("floats active in the last 3 months", now());
        assert_eq!(temporal.len(), 1);
        assert_eq!(temporal[0].kind, TemporalKind::Relative);
        assert_eq!(temporal[0].start, midnight(2024, 3, 15).unwrap());
        assert_eq!(temporal[0].end, now());

        let this_year = extractor().extract_temporal("anomalies this year", now());
        assert_eq!(this_year[0].start, midnight(2024, 1, 1).unwrap());
    }

    #[test]
    fn test_winter_spans_previous_year() {
        let temporal = extractor().extract_temporal("winter 2021 mixed layer", now());
        assert_eq!(temporal.len(), 1);
        assert_eq!(temporal[0].kind, TemporalKind::Season);
        assert_eq!(temporal[0].start, midnight(2020, 12, 1).unwrap());
        assert_eq!(temporal[0].end, midnight(2021, 2, 28).unwrap());
    }

    #[test]
    fn test_month_and_absolute_dates() {
        let ex = extractor();
        let month = ex.extract_temporal("oxygen in March 2019", now());
        assert_eq!(month[0].kind, TemporalKind::Month);
        assert_eq!(month[0].end, midnight(2019, 4, 1).unwrap());

        let day = ex.extract_temporal("profiles on 2023-01-15", now());
        assert_eq!(day[0].kind, TemporalKind::Absolute);
        assert_eq!(day[0].end, midnight(2023, 1, 16).unwrap());
    }

    #[test]
    fn test_parameters_use_aliases_and_word_boundaries() {
        let ex = extractor();
        let params = ex.extract_parameters("compare SST and dissolved oxygen");
        let names: Vec<_> = params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["temperature", "oxygen"]);
        assert_eq!(params[1].column, "doxy");

        // "attempt" contains "temp" but is not the alias
        assert!(ex.extract_parameters("attempt this").is_empty());
    }

    #[test]
    fn test_floats_deduplicated() {
        let floats =
            extractor().extract_floats("trajectory of float 2902746 (#2902746) and 5904321");
        let ids: Vec<_> = floats.iter().map(|f| f.float_id.as_str()).collect();
        assert_eq!(ids, vec!["2902746", "5904321"]);
        assert_eq!(floats[0].text, "float 2902746");
    }

    #[test]
    fn test_quality_and_data_mode() {
        let quality = extractor().extract_quality("only good quality delayed mode data");
        assert_eq!(quality.len(), 2);
        assert_eq!(quality[0].qc_flags, vec![1]);
        assert_eq!(quality[1].data_mode.as_deref(), Some("D"));
    }

    #[test]
    fn test_depth_ranges() {
        let ex = extractor();
        let below = ex.extract_depth("temperature below 500m");
        assert_eq!(below[0].min_depth, Some(500.0));
        assert_eq!(below[0].max_depth, None);

        let between = ex.extract_depth("salinity between 100 and 200 meters");
        assert_eq!(between[0].min_depth, Some(100.0));
        assert_eq!(between[0].max_depth, Some(200.0));

        let around = ex.extract_depth("oxygen at 1000 dbar");
        assert_eq!(around[0].min_depth, Some(990.0));
        assert_eq!(around[0].max_depth, Some(1010.0));

        assert!(ex.extract_depth("floats deployed 2019-2020").is_empty());
    }

    #[test]
    fn test_nothing_found() {
        let entities = extractor().extract_at("hello", &ParseContext::default(), now());
        assert!(entities.is_empty());
    }

    #[test]
    fn test_region_inferred_from_context() {
        let mut context = ParseContext::default();
        context
            .session_entities
            .insert("region".into(), "Bay of Bengal".into());
        let entities = extractor().extract_at("now show salinity", &context, now());
        assert_eq!(entities.spatial.len(), 1);
        assert_eq!(entities.spatial[0].name, "Bay of Bengal");
        assert_eq!(entities.spatial[0].confidence, CONTEXT_CONFIDENCE);
    }
}
