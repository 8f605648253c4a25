//! Generic named-entity recognition
//!
//! The extractor runs domain tables first and uses a recognizer only for
//! what the tables cannot see: free-form place names and date expressions.
//! `RuleBasedRecognizer` is deterministic and dependency-free; a statistical
//! model can be plugged in behind the same trait.

use regex::Regex;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityLabel {
    /// Geographic location
    Location,
    /// Date or date-like expression
    Date,
}

/// A labelled span of the input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedSpan {
    pub text: String,
    pub label: EntityLabel,
    pub start: usize,
    pub end: usize,
}

impl NamedSpan {
    fn overlaps(&self, start: usize, end: usize) -> bool {
        self.start < end && start < self.end
    }
}

pub trait NamedEntityRecognizer: Send + Sync {
    fn recognize(&self, text: &str) -> Vec<NamedSpan>;
}

const MONTHS: &str =
    "january|february|march|april|may|june|july|august|september|october|november|december";

static ISO_DATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{4}-\d{2}-\d{2}\b").unwrap());

static MONTH_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b(?:{MONTHS})\s+\d{{4}}\b")).unwrap()
});

static BARE_YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").unwrap());

/// Years attached to a season word belong to the season
static SEASON_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:winter|spring|summer|fall|autumn)\s+((?:19|20)\d{2})\b").unwrap()
});

/// Capitalised phrase introduced by a locative preposition
static LOCATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:in|near|off|around|of|from|at)\s+(?:the\s+)?([A-Z][a-z]+(?:\s+(?:of\s+)?[A-Z][a-z]+)*)",
    )
    .unwrap()
});

const NOT_PLACES: &[&str] = &[
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december", "winter", "spring", "summer", "fall", "autumn", "argo",
];

/// Pattern-based recognizer for dates and capitalised place names
#[derive(Debug, Default, Clone)]
pub struct RuleBasedRecognizer;

impl RuleBasedRecognizer {
    pub fn new() -> Self {
        Self
    }

    fn recognize_dates(&self, text: &str) -> Vec<NamedSpan> {
        let mut spans: Vec<NamedSpan> = Vec::new();

        for re in [&*ISO_DATE, &*MONTH_YEAR] {
            for m in re.find_iter(text) {
                spans.push(NamedSpan {
                    text: m.as_str().to_string(),
                    label: EntityLabel::Date,
                    start: m.start(),
                    end: m.end(),
                });
            }
        }

        let season_years: Vec<(usize, usize)> = SEASON_YEAR
            .captures_iter(text)
            .filter_map(|c| c.get(1).map(|g| (g.start(), g.end())))
            .collect();

        for m in BARE_YEAR.find_iter(text) {
            let taken = spans.iter().any(|s| s.overlaps(m.start(), m.end()))
                || season_years.contains(&(m.start(), m.end()));
            if !taken {
                spans.push(NamedSpan {
                    text: m.as_str().to_string(),
                    label: EntityLabel::Date,
                    start: m.start(),
                    end: m.end(),
                });
            }
        }

        spans.sort_by_key(|s| s.start);
        spans
    }

    fn recognize_locations(&self, text: &str) -> Vec<NamedSpan> {
        LOCATION
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .filter(|m| {
                let first = m.as_str().split_whitespace().next().unwrap_or_default();
                !NOT_PLACES.contains(&first.to_lowercase().as_str())
            })
            .map(|m| NamedSpan {
                text: m.as_str().to_string(),
                label: EntityLabel::Location,
                start: m.start(),
                end: m.end(),
            })
            .collect()
    }
}

impl NamedEntityRecognizer for RuleBasedRecognizer {
    fn recognize(&self, text: &str) -> Vec<NamedSpan> {
        let mut spans = self.recognize_locations(text);
        spans.extend(self.recognize_dates(text));
        spans
    }
}
