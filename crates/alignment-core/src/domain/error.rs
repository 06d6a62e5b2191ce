//! Error taxonomy for the alignment engine.

/// Fatal configuration problems. Any of these aborts an analysis before a
/// single score is produced.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("missing economic weight for active sector: {sector}")]
    MissingEconomicWeight { sector: String },

    #[error("economic weight for sector {sector} must be positive and finite, got {weight}")]
    InvalidEconomicWeight { sector: String, weight: f64 },

    #[error("technology {technology} in sector {sector} is not classified as build_out, phase_out or other")]
    UnclassifiedTechnology { sector: String, technology: String },

    #[error("technology {technology} in sector {sector} is classified more than once")]
    AmbiguousClassification { sector: String, technology: String },

    #[error("technology {technology} in sector {sector} is listed at both sector and technology target level")]
    AmbiguousTargetLevel { sector: String, technology: String },

    #[error("technology {technology} in sector {sector} has no target level (sector or technology)")]
    MissingTargetLevel { sector: String, technology: String },

    #[error("sda sector {sector} cannot classify {technology} as build_out or phase_out")]
    SdaDirectionalTechnology { sector: String, technology: String },

    #[error("invalid production threshold for sector {sector}: {field} = {value}")]
    InvalidThreshold {
        sector: String,
        field: String,
        value: f64,
    },

    #[error("missing scenario files for start year {start_year} and scenario set {scenario_set}")]
    MissingScenarioFiles {
        start_year: i32,
        scenario_set: String,
    },

    #[error("missing region file for scenario set {scenario_set} (required by regional sector {sector})")]
    MissingRegionFile {
        scenario_set: String,
        sector: String,
    },
}

/// Alignment engine errors.
#[derive(Debug, thiserror::Error)]
pub enum AlignmentError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("scenario not loaded: {scenario_set}/{pathway} for start year {start_year}")]
    ScenarioNotLoaded {
        scenario_set: String,
        pathway: String,
        start_year: i32,
    },

    #[error("unknown facet: {0}")]
    UnknownFacet(String),

    #[error("invalid analysis request: {0}")]
    InvalidRequest(String),

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("analysis task failed: {0}")]
    Task(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for alignment engine operations.
pub type Result<T> = std::result::Result<T, AlignmentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_names_missing_key() {
        let err = ConfigurationError::MissingEconomicWeight {
            sector: "steel".to_string(),
        };
        assert!(err.to_string().contains("steel"));

        let err = ConfigurationError::MissingScenarioFiles {
            start_year: 2023,
            scenario_set: "geco".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("2023"));
        assert!(msg.contains("geco"));
    }

    #[test]
    fn test_configuration_error_wraps_into_alignment_error() {
        let err: AlignmentError = ConfigurationError::UnclassifiedTechnology {
            sector: "power".to_string(),
            technology: "fusioncap".to_string(),
        }
        .into();
        assert!(matches!(err, AlignmentError::Configuration(_)));
        assert!(err.to_string().contains("fusioncap"));
    }

    #[test]
    fn test_digest_mismatch_error() {
        let err = AlignmentError::DigestMismatch {
            expected: "abc123".to_string(),
            actual: "def456".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("abc123"));
        assert!(msg.contains("def456"));
    }
}
