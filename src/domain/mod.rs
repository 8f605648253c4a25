//! Oceanographic domain tables
//!
//! Region bounding boxes, parameter aliases, QC phrase mappings, depth
//! phrases and intent keywords. The tables ship as YAML next to this module
//! and are embedded at compile time; a deployment can override any of them
//! by pointing `FLOATCHAT_DOMAIN_DIR` at a directory holding files with the
//! same names.

use floatchat_types::{BoundingBox, QueryIntent};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

const REGIONS_YAML: &str = include_str!("tables/regions.yaml");
const PARAMETERS_YAML: &str = include_str!("tables/parameters.yaml");
const QUALITY_YAML: &str = include_str!("tables/quality.yaml");
const DEPTH_YAML: &str = include_str!("tables/depth.yaml");
const INTENTS_YAML: &str = include_str!("tables/intents.yaml");

#[derive(Debug, Error)]
pub enum DomainTableError {
    #[error("Failed to read domain table {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse domain table '{table}': {message}")]
    Parse { table: String, message: String },

    #[error("Invalid domain table '{table}': {message}")]
    Invalid { table: String, message: String },

    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

fn parse_table<T: DeserializeOwned>(table: &str, yaml: &str) -> Result<T, DomainTableError> {
    serde_yaml::from_str(yaml).map_err(|e| DomainTableError::Parse {
        table: table.to_string(),
        message: e.to_string(),
    })
}

fn read_table_or(dir: &Path, file: &str, builtin: &str) -> Result<String, DomainTableError> {
    let path = dir.join(file);
    if !path.exists() {
        return Ok(builtin.to_string());
    }
    std::fs::read_to_string(&path).map_err(|e| DomainTableError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

// ============================================================================
// REGIONS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionDefinition {
    pub name: String,
    pub bbox: BoundingBox,
    /// `(lon, lat)`
    pub center: (f64, f64),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionsTable {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    pub regions: Vec<RegionDefinition>,
    pub equator: RegionDefinition,
}

impl RegionsTable {
    pub fn load_from_str(yaml: &str) -> Result<Self, DomainTableError> {
        let table: Self = parse_table("regions", yaml)?;
        for region in table.regions.iter().chain(std::iter::once(&table.equator)) {
            let b = region.bbox;
            if !(-90.0..=90.0).contains(&b.min_lat)
                || !(-90.0..=90.0).contains(&b.max_lat)
                || b.min_lat > b.max_lat
            {
                return Err(DomainTableError::Invalid {
                    table: "regions".into(),
                    message: format!("region '{}' has an invalid latitude span", region.name),
                });
            }
        }
        Ok(table)
    }

    /// Case-insensitive lookup by region name
    pub fn get(&self, name: &str) -> Option<&RegionDefinition> {
        self.regions
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(name.trim()))
    }
}

// ============================================================================
// PARAMETERS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterDefinition {
    pub name: String,
    pub column: String,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParametersTable {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    pub parameters: Vec<ParameterDefinition>,
    #[serde(default)]
    pub common_parameters: Vec<String>,
}

impl ParametersTable {
    pub fn load_from_str(yaml: &str) -> Result<Self, DomainTableError> {
        let table: Self = parse_table("parameters", yaml)?;
        if let Some(unknown) = table
            .common_parameters
            .iter()
            .find(|name| table.get(name).is_none())
        {
            return Err(DomainTableError::Invalid {
                table: "parameters".into(),
                message: format!("common parameter '{}' is not defined", unknown),
            });
        }
        Ok(table)
    }

    pub fn get(&self, name: &str) -> Option<&ParameterDefinition> {
        self.parameters
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

// ============================================================================
// QUALITY
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QcMapping {
    pub phrase: String,
    pub flags: Vec<u8>,
    #[serde(default)]
    pub data_mode: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataModeRule {
    pub keywords: Vec<String>,
    pub mode: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityTable {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    pub qc_mappings: Vec<QcMapping>,
    #[serde(default)]
    pub data_modes: Vec<DataModeRule>,
}

impl QualityTable {
    pub fn load_from_str(yaml: &str) -> Result<Self, DomainTableError> {
        parse_table("quality", yaml)
    }
}

// ============================================================================
// DEPTH
// ============================================================================

/// How a depth phrase's captures map to a depth range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum DepthRule {
    /// First capture is the minimum depth
    Below,
    /// First capture is the maximum depth
    Above,
    /// Captures 1 and 2 are min and max
    Between,
    /// First capture ± tolerance
    Around { tolerance: f64 },
    /// Fixed range, no captures
    Fixed {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepthPatternDefinition {
    pub pattern: String,
    #[serde(flatten)]
    pub rule: DepthRule,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepthTable {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    pub depth_patterns: Vec<DepthPatternDefinition>,
}

impl DepthTable {
    pub fn load_from_str(yaml: &str) -> Result<Self, DomainTableError> {
        parse_table("depth", yaml)
    }
}

// ============================================================================
// INTENTS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentKeywords {
    pub intent: QueryIntent,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentsTable {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    /// Checked in order; the first intent with a matching keyword wins
    pub intents: Vec<IntentKeywords>,
    #[serde(default)]
    pub visualizations: HashMap<QueryIntent, Vec<String>>,
    #[serde(default)]
    pub default_visualizations: Vec<String>,
}

impl IntentsTable {
    pub fn load_from_str(yaml: &str) -> Result<Self, DomainTableError> {
        let table: Self = parse_table("intents", yaml)?;
        if table.default_visualizations.is_empty() {
            return Err(DomainTableError::Invalid {
                table: "intents".into(),
                message: "default_visualizations must not be empty".into(),
            });
        }
        Ok(table)
    }

    /// Visualization types for an intent, primary first
    pub fn visualizations_for(&self, intent: QueryIntent) -> &[String] {
        self.visualizations
            .get(&intent)
            .filter(|v| !v.is_empty())
            .map(|v| v.as_slice())
            .unwrap_or(&self.default_visualizations)
    }
}

// ============================================================================
// DOMAIN KNOWLEDGE
// ============================================================================

/// All domain tables, loaded once at startup and shared read-only
#[derive(Debug, Clone)]
pub struct DomainKnowledge {
    pub regions: RegionsTable,
    pub parameters: ParametersTable,
    pub quality: QualityTable,
    pub depth: DepthTable,
    pub intents: IntentsTable,
}

impl DomainKnowledge {
    /// Tables compiled into the binary
    pub fn builtin() -> Result<Self, DomainTableError> {
        Ok(Self {
            regions: RegionsTable::load_from_str(REGIONS_YAML)?,
            parameters: ParametersTable::load_from_str(PARAMETERS_YAML)?,
            quality: QualityTable::load_from_str(QUALITY_YAML)?,
            depth: DepthTable::load_from_str(DEPTH_YAML)?,
            intents: IntentsTable::load_from_str(INTENTS_YAML)?,
        })
    }

    /// Load tables from a directory; files that are absent fall back to the
    /// built-in table of the same name
    pub fn load_from_dir(dir: &Path) -> Result<Self, DomainTableError> {
        Ok(Self {
            regions: RegionsTable::load_from_str(&read_table_or(
                dir,
                "regions.yaml",
                REGIONS_YAML,
            )?)?,
            parameters: ParametersTable::load_from_str(&read_table_or(
                dir,
                "parameters.yaml",
                PARAMETERS_YAML,
            )?)?,
            quality: QualityTable::load_from_str(&read_table_or(
                dir,
                "quality.yaml",
                QUALITY_YAML,
            )?)?,
            depth: DepthTable::load_from_str(&read_table_or(dir, "depth.yaml", DEPTH_YAML)?)?,
            intents: IntentsTable::load_from_str(&read_table_or(
                dir,
                "intents.yaml",
                INTENTS_YAML,
            )?)?,
        })
    }

    /// `FLOATCHAT_DOMAIN_DIR` if set, otherwise the built-in tables
    pub fn load(domain_dir: Option<&Path>) -> Result<Self, DomainTableError> {
        match domain_dir {
            Some(dir) => {
                tracing::info!(dir = %dir.display(), "Loading domain tables from directory");
                Self::load_from_dir(dir)
            }
            None => Self::builtin(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_tables_load() {
        let domain = DomainKnowledge::builtin().unwrap();
        assert_eq!(domain.regions.regions.len(), 21);
        assert_eq!(domain.parameters.parameters.len(), 8);
        assert_eq!(
            domain.parameters.common_parameters,
            vec!["temperature", "salinity", "pressure"]
        );
        assert_eq!(domain.intents.intents.len(), 11);
        assert_eq!(domain.depth.depth_patterns.len(), 9);
    }

    #[test]
    fn test_region_lookup() {
        let domain = DomainKnowledge::builtin().unwrap();
        let arabian = domain.regions.get("arabian sea").unwrap();
        assert_eq!(arabian.bbox, BoundingBox::new(50.0, 8.0, 77.0, 28.0));
        assert_eq!(arabian.center, (63.5, 18.0));

        let ross = domain.regions.get("Ross Sea").unwrap();
        assert!(ross.bbox.crosses_antimeridian());
    }

    #[test]
    fn test_depth_rules_deserialize() {
        let domain = DomainKnowledge::builtin().unwrap();
        let rules: Vec<_> = domain
            .depth
            .depth_patterns
            .iter()
            .map(|p| p.rule.clone())
            .collect();
        assert_eq!(rules[0], DepthRule::Below);
        assert_eq!(rules[4], DepthRule::Around { tolerance: 10.0 });
        assert_eq!(
            rules[6],
            DepthRule::Fixed {
                min: Some(500.0),
                max: None
            }
        );
    }

    #[test]
    fn test_visualizations_fall_back_to_default() {
        let domain = DomainKnowledge::builtin().unwrap();
        assert_eq!(
            domain.intents.visualizations_for(QueryIntent::WaterMassAnalysis),
            &["ts_diagram".to_string()]
        );
        assert_eq!(
            domain.intents.visualizations_for(QueryIntent::GlobalAnalysis),
            &["time_series".to_string()]
        );
    }

    #[test]
    fn test_unknown_common_parameter_rejected() {
        let yaml = r#"
parameters:
  - name: temperature
    column: temperature
common_parameters: ["salinity"]
"#;
        let err = ParametersTable::load_from_str(yaml).unwrap_err();
        assert!(matches!(err, DomainTableError::Invalid { .. }));
    }

    #[test]
    fn test_load_from_dir_overrides_single_table() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("regions.yaml")).unwrap();
        writeln!(
            file,
            r#"
regions:
  - name: "Lakshadweep Sea"
    bbox: [71, 7, 78, 14]
    center: [74.5, 10.5]
equator:
  name: "Equator"
  bbox: [-180, -5, 180, 5]
  center: [0, 0]
"#
        )
        .unwrap();

        let domain = DomainKnowledge::load_from_dir(dir.path()).unwrap();
        assert_eq!(domain.regions.regions.len(), 1);
        assert!(domain.regions.get("Lakshadweep Sea").is_some());
        // Untouched tables come from the built-ins
        assert_eq!(domain.parameters.parameters.len(), 8);
    }
}
