//! Exhaustiveness checks for [`ConfigStore`].
//!
//! Checks, for every active sector:
//! 1. an economic weight exists and is positive and finite;
//! 2. no technology is classified twice;
//! 3. tms: every technology has exactly one target level and every
//!    technology with a target level is classified;
//! 4. sda: no technology is classified as build_out or phase_out.
//!
//! Production thresholds must be finite and non-negative.

use std::collections::BTreeSet;

use super::{Approach, ConfigStore, SectorApproachRule};
use crate::domain::error::ConfigurationError;

/// Validate a configuration, returning the first problem found.
pub fn validate(config: &ConfigStore) -> Result<(), ConfigurationError> {
    for (sector, rule) in config.sectoral_approach.iter().filter(|(_, r)| r.active) {
        match config.economic_weights.get(sector) {
            None => {
                return Err(ConfigurationError::MissingEconomicWeight {
                    sector: sector.clone(),
                })
            }
            Some(&weight) if !(weight.is_finite() && weight > 0.0) => {
                return Err(ConfigurationError::InvalidEconomicWeight {
                    sector: sector.clone(),
                    weight,
                })
            }
            Some(_) => {}
        }
        validate_rule(sector, rule)?;
    }

    for (sector, threshold) in &config.production_thresholds {
        for (field, value) in [
            ("asset_ratio", threshold.asset_ratio),
            ("turnover_ratio", threshold.turnover_ratio),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigurationError::InvalidThreshold {
                    sector: sector.clone(),
                    field: field.to_string(),
                    value,
                });
            }
        }
    }

    Ok(())
}

fn validate_rule(sector: &str, rule: &SectorApproachRule) -> Result<(), ConfigurationError> {
    let mut classified = BTreeSet::new();
    for tech in rule.classified() {
        if !classified.insert(tech.as_str()) {
            return Err(ConfigurationError::AmbiguousClassification {
                sector: sector.to_string(),
                technology: tech.clone(),
            });
        }
    }

    match rule.approach {
        Approach::Sda => {
            if let Some(tech) = rule.build_out.iter().chain(&rule.phase_out).next() {
                return Err(ConfigurationError::SdaDirectionalTechnology {
                    sector: sector.to_string(),
                    technology: tech.clone(),
                });
            }
        }
        Approach::Tms => {
            let technology_level: BTreeSet<&str> =
                rule.technology.iter().map(String::as_str).collect();
            let sector_level: BTreeSet<&str> = rule.sector.iter().map(String::as_str).collect();

            if let Some(tech) = technology_level.intersection(&sector_level).next() {
                return Err(ConfigurationError::AmbiguousTargetLevel {
                    sector: sector.to_string(),
                    technology: tech.to_string(),
                });
            }
            if let Some(tech) = technology_level
                .union(&sector_level)
                .find(|t| !classified.contains(*t))
            {
                return Err(ConfigurationError::UnclassifiedTechnology {
                    sector: sector.to_string(),
                    technology: tech.to_string(),
                });
            }
            if let Some(tech) = classified
                .iter()
                .find(|t| !technology_level.contains(*t) && !sector_level.contains(*t))
            {
                return Err(ConfigurationError::MissingTargetLevel {
                    sector: sector.to_string(),
                    technology: tech.to_string(),
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Direction, ProductionThreshold};

    fn base() -> ConfigStore {
        ConfigStore::default().with_sector(
            "power",
            SectorApproachRule::tms()
                .with_technology_level(Direction::BuildOut, &["renewablescap"])
                .with_sector_level(Direction::PhaseOut, &["coalcap"]),
            1.0,
        )
    }

    #[test]
    fn valid_config_passes() {
        assert_eq!(validate(&base()), Ok(()));
    }

    #[test]
    fn missing_weight_for_active_sector_fails() {
        let mut config = base();
        config.economic_weights.clear();
        assert_eq!(
            validate(&config),
            Err(ConfigurationError::MissingEconomicWeight {
                sector: "power".to_string()
            })
        );
    }

    #[test]
    fn inactive_sector_needs_no_weight() {
        let mut config = base();
        config.economic_weights.clear();
        if let Some(rule) = config.sectoral_approach.get_mut("power") {
            rule.active = false;
        }
        assert_eq!(validate(&config), Ok(()));
    }

    #[test]
    fn non_positive_weight_fails() {
        let mut config = base();
        config.economic_weights.insert("power".to_string(), 0.0);
        assert!(matches!(
            validate(&config),
            Err(ConfigurationError::InvalidEconomicWeight { .. })
        ));
    }

    #[test]
    fn double_classification_fails() {
        let config = ConfigStore::default().with_sector(
            "power",
            SectorApproachRule::tms()
                .with_technology_level(Direction::BuildOut, &["gascap"])
                .with_technologies(Direction::PhaseOut, &["gascap"]),
            1.0,
        );
        assert_eq!(
            validate(&config),
            Err(ConfigurationError::AmbiguousClassification {
                sector: "power".to_string(),
                technology: "gascap".to_string(),
            })
        );
    }

    #[test]
    fn technology_at_both_levels_fails() {
        let mut config = base();
        if let Some(rule) = config.sectoral_approach.get_mut("power") {
            rule.technology.push("coalcap".to_string());
        }
        assert!(matches!(
            validate(&config),
            Err(ConfigurationError::AmbiguousTargetLevel { .. })
        ));
    }

    #[test]
    fn unclassified_target_level_technology_fails() {
        let mut config = base();
        if let Some(rule) = config.sectoral_approach.get_mut("power") {
            rule.technology.push("oilcap".to_string());
        }
        assert_eq!(
            validate(&config),
            Err(ConfigurationError::UnclassifiedTechnology {
                sector: "power".to_string(),
                technology: "oilcap".to_string(),
            })
        );
    }

    #[test]
    fn classified_technology_without_level_fails() {
        let config = ConfigStore::default().with_sector(
            "power",
            SectorApproachRule::tms().with_technologies(Direction::Other, &["hydrocap"]),
            1.0,
        );
        assert!(matches!(
            validate(&config),
            Err(ConfigurationError::MissingTargetLevel { .. })
        ));
    }

    #[test]
    fn sda_rejects_directional_technologies() {
        let config = ConfigStore::default().with_sector(
            "steel",
            SectorApproachRule::sda().with_technologies(Direction::PhaseOut, &["bof"]),
            1.0,
        );
        assert!(matches!(
            validate(&config),
            Err(ConfigurationError::SdaDirectionalTechnology { .. })
        ));
    }

    #[test]
    fn negative_threshold_fails() {
        let config = base().with_threshold(
            "power",
            ProductionThreshold {
                asset_ratio: -0.1,
                turnover_ratio: 0.0,
            },
        );
        assert!(matches!(
            validate(&config),
            Err(ConfigurationError::InvalidThreshold { ref field, .. }) if field == "asset_ratio"
        ));
    }
}
