//! Static per-kind operator tables: base cost and owning executor

use floatchat_types::OperatorKind;

/// Executor names used by the default registry
pub mod executors {
    pub const STRUCTURED: &str = "structured";
    pub const METADATA: &str = "metadata";
    pub const PROFILE: &str = "profile";
    pub const SEMANTIC: &str = "semantic";
    pub const CACHE: &str = "cache";
    pub const VISUALIZATION: &str = "visualization";

    pub const ALL: [&str; 6] = [STRUCTURED, METADATA, PROFILE, SEMANTIC, CACHE, VISUALIZATION];
}

/// Baseline cost in milliseconds before any adjustment
pub fn base_cost(kind: OperatorKind) -> f64 {
    match kind {
        OperatorKind::SpatialFilter => 50.0,
        OperatorKind::TemporalFilter => 30.0,
        OperatorKind::ParameterFilter => 20.0,
        OperatorKind::QcFilter => 15.0,
        OperatorKind::FloatFilter => 25.0,
        OperatorKind::Aggregate => 100.0,
        OperatorKind::GroupBy => 80.0,
        OperatorKind::ComputeGradient => 150.0,
        OperatorKind::ComputeMld => 200.0,
        OperatorKind::ComputeAnomaly => 180.0,
        OperatorKind::ComputeStats => 100.0,
        OperatorKind::SemanticSearch => 300.0,
        OperatorKind::Join => 150.0,
        OperatorKind::Visualize => 250.0,
    }
}

/// Executor that owns an operator kind
pub fn executor_for(kind: OperatorKind) -> &'static str {
    match kind {
        OperatorKind::SpatialFilter
        | OperatorKind::TemporalFilter
        | OperatorKind::ParameterFilter
        | OperatorKind::QcFilter
        | OperatorKind::FloatFilter
        | OperatorKind::Aggregate
        | OperatorKind::GroupBy
        | OperatorKind::Join => executors::STRUCTURED,
        OperatorKind::ComputeGradient
        | OperatorKind::ComputeMld
        | OperatorKind::ComputeAnomaly
        | OperatorKind::ComputeStats => executors::PROFILE,
        OperatorKind::SemanticSearch => executors::SEMANTIC,
        OperatorKind::Visualize => executors::VISUALIZATION,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_has_an_executor_in_the_default_set() {
        for kind in OperatorKind::ALL {
            assert!(executors::ALL.contains(&executor_for(kind)));
            assert!(base_cost(kind) > 0.0);
        }
    }
}
