//! Entities extracted from a natural-language query

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ============================================================================
// SPATIAL
// ============================================================================

/// Geographic bounding box in degrees.
///
/// Serialized as `[min_lon, min_lat, max_lon, max_lat]`. A box whose
/// `max_lon` is smaller than its `min_lon` crosses the antimeridian
/// (e.g. the North Pacific, `[100, 0, -100, 65]`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// Box of `±delta` degrees around a point
    pub fn around(lon: f64, lat: f64, delta: f64) -> Self {
        Self::new(lon - delta, lat - delta, lon + delta, lat + delta)
    }

    pub fn crosses_antimeridian(&self) -> bool {
        self.max_lon < self.min_lon
    }

    /// Longitudinal extent in degrees, wrapping across the antimeridian
    pub fn width(&self) -> f64 {
        if self.crosses_antimeridian() {
            self.max_lon + 360.0 - self.min_lon
        } else {
            self.max_lon - self.min_lon
        }
    }

    pub fn height(&self) -> f64 {
        (self.max_lat - self.min_lat).abs()
    }

    /// Area in square degrees (used as a selectivity proxy, not a geodesic area)
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Smallest box covering both. Longitudes take the shorter of the two
    /// ways around, so the result may cross the antimeridian.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let min_lat = self.min_lat.min(other.min_lat);
        let max_lat = self.max_lat.max(other.max_lat);

        let span_from = |a: &BoundingBox, b: &BoundingBox| {
            let offset = (b.min_lon - a.min_lon).rem_euclid(360.0);
            a.width().max(offset + b.width())
        };
        let (start, width) = {
            let from_self = span_from(self, other);
            let from_other = span_from(other, self);
            if from_self <= from_other {
                (self.min_lon, from_self)
            } else {
                (other.min_lon, from_other)
            }
        };

        if width >= 360.0 {
            return Self::new(-180.0, min_lat, 180.0, max_lat);
        }
        let mut end = start + width;
        if end > 180.0 {
            end -= 360.0;
        }
        Self::new(start, min_lat, end, max_lat)
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from(v: [f64; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.min_lon, b.min_lat, b.max_lon, b.max_lat]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpatialKind {
    /// Named ocean region from the lookup table
    Region,
    /// Place name found by NER with no known extent
    Location,
    /// Explicit lat/lon coordinate
    Point,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialEntity {
    pub name: String,
    pub kind: SpatialKind,
    pub bbox: Option<BoundingBox>,
    /// `(lon, lat)`
    pub center: Option<(f64, f64)>,
    pub confidence: f64,
}

// ============================================================================
// TEMPORAL
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporalKind {
    Relative,
    Season,
    Absolute,
    Month,
    Year,
}

impl TemporalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemporalKind::Relative => "relative",
            TemporalKind::Season => "season",
            TemporalKind::Absolute => "absolute",
            TemporalKind::Month => "month",
            TemporalKind::Year => "year",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalEntity {
    pub text: String,
    pub kind: TemporalKind,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub confidence: f64,
}

// ============================================================================
// PARAMETERS, FLOATS, QUALITY, DEPTH
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterEntity {
    /// Canonical parameter name (e.g. "oxygen")
    pub name: String,
    /// Storage column (e.g. "doxy")
    pub column: String,
    pub unit: Option<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloatEntity {
    pub text: String,
    /// WMO platform number (7 digits)
    pub float_id: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityEntity {
    pub text: String,
    pub qc_flags: Vec<u8>,
    /// ARGO data mode: R (real-time), D (delayed), A (adjusted)
    pub data_mode: Option<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthEntity {
    pub text: String,
    pub min_depth: Option<f64>,
    pub max_depth: Option<f64>,
    pub confidence: f64,
}

// ============================================================================
// AGGREGATE
// ============================================================================

/// All entities found in one query, one list per entity class
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntities {
    #[serde(default)]
    pub spatial: Vec<SpatialEntity>,
    #[serde(default)]
    pub temporal: Vec<TemporalEntity>,
    #[serde(default)]
    pub parameters: Vec<ParameterEntity>,
    #[serde(default)]
    pub floats: Vec<FloatEntity>,
    #[serde(default)]
    pub quality: Vec<QualityEntity>,
    #[serde(default)]
    pub depth: Vec<DepthEntity>,
}

impl ExtractedEntities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.spatial.len()
            + self.temporal.len()
            + self.parameters.len()
            + self.floats.len()
            + self.quality.len()
            + self.depth.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Confidence of every entity, in class order
    pub fn confidences(&self) -> Vec<f64> {
        self.spatial
            .iter()
            .map(|e| e.confidence)
            .chain(self.temporal.iter().map(|e| e.confidence))
            .chain(self.parameters.iter().map(|e| e.confidence))
            .chain(self.floats.iter().map(|e| e.confidence))
            .chain(self.quality.iter().map(|e| e.confidence))
            .chain(self.depth.iter().map(|e| e.confidence))
            .collect()
    }

    /// Mean entity confidence, `None` when nothing was extracted
    pub fn mean_confidence(&self) -> Option<f64> {
        let all = self.confidences();
        if all.is_empty() {
            None
        } else {
            Some(all.iter().sum::<f64>() / all.len() as f64)
        }
    }
}
