//! Validated engine configuration.
//!
//! [`ConfigStore`] mirrors the YAML parameter file. Every way of obtaining a
//! store (parsing, loading, patching, constructing the calculator) runs
//! [`validate`], so an invalid parameter set never reaches the pipeline.

pub mod strategy;
pub mod validation;

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::error::{ConfigurationError, Result};

pub use strategy::{Approach, Direction, SectorPlan, SectorStrategy, TargetLevel};
pub use validation::validate;

/// Company analytics and indicator sources for one data year.
///
/// Accepts either a two-element list `[analytics, indicators]` or a mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ClimateSourcesRepr")]
pub struct ClimateSources {
    pub analytics_source: String,
    pub indicators_source: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ClimateSourcesRepr {
    Pair(String, String),
    Named {
        analytics_source: String,
        indicators_source: String,
    },
}

impl From<ClimateSourcesRepr> for ClimateSources {
    fn from(repr: ClimateSourcesRepr) -> Self {
        match repr {
            ClimateSourcesRepr::Pair(analytics_source, indicators_source)
            | ClimateSourcesRepr::Named {
                analytics_source,
                indicators_source,
            } => Self {
                analytics_source,
                indicators_source,
            },
        }
    }
}

/// Scenario target sources for one (start year, scenario set).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioFiles {
    #[serde(alias = "scenario_file_tms")]
    pub tms_source: String,
    #[serde(alias = "scenario_file_sda")]
    pub sda_source: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioData {
    /// start year → scenario set → sources.
    #[serde(default)]
    pub scenario_files: BTreeMap<i32, BTreeMap<String, ScenarioFiles>>,
    /// scenario set → region membership source.
    #[serde(default)]
    pub region_file: BTreeMap<String, String>,
}

/// Minimum production-to-assets and production-to-turnover ratios.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProductionThreshold {
    pub asset_ratio: f64,
    pub turnover_ratio: f64,
}

/// Methodology and technology classification of one sector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorApproachRule {
    pub approach: Approach,
    /// Technologies whose tms target is anchored on sector production.
    #[serde(default)]
    pub sector: Vec<String>,
    /// Technologies whose tms target is anchored on their own production.
    #[serde(default)]
    pub technology: Vec<String>,
    #[serde(default)]
    pub build_out: Vec<String>,
    #[serde(default)]
    pub phase_out: Vec<String>,
    #[serde(default)]
    pub other: Vec<String>,
    #[serde(default)]
    pub regional: bool,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

fn owned<'a>(techs: &'a [&'a str]) -> impl Iterator<Item = String> + 'a {
    techs.iter().map(|t| t.to_string())
}

impl SectorApproachRule {
    fn empty(approach: Approach) -> Self {
        Self {
            approach,
            sector: Vec::new(),
            technology: Vec::new(),
            build_out: Vec::new(),
            phase_out: Vec::new(),
            other: Vec::new(),
            regional: false,
            active: true,
        }
    }

    pub fn tms() -> Self {
        Self::empty(Approach::Tms)
    }

    pub fn sda() -> Self {
        Self::empty(Approach::Sda)
    }

    /// Classify technologies without assigning a tms target level.
    pub fn with_technologies(mut self, direction: Direction, techs: &[&str]) -> Self {
        let list = match direction {
            Direction::BuildOut => &mut self.build_out,
            Direction::PhaseOut => &mut self.phase_out,
            Direction::Other => &mut self.other,
        };
        list.extend(owned(techs));
        self
    }

    pub fn with_technology_level(mut self, direction: Direction, techs: &[&str]) -> Self {
        self.technology.extend(owned(techs));
        self.with_technologies(direction, techs)
    }

    pub fn with_sector_level(mut self, direction: Direction, techs: &[&str]) -> Self {
        self.sector.extend(owned(techs));
        self.with_technologies(direction, techs)
    }

    pub fn regional(mut self) -> Self {
        self.regional = true;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Every classified technology, in classification order.
    pub fn classified(&self) -> impl Iterator<Item = &String> {
        self.build_out
            .iter()
            .chain(&self.phase_out)
            .chain(&self.other)
    }
}

/// The resolved parameter set of the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigStore {
    #[serde(default)]
    pub main_climate_file: BTreeMap<i32, ClimateSources>,
    #[serde(default)]
    pub company_information_file: Option<String>,
    #[serde(default)]
    pub economic_weights: BTreeMap<String, f64>,
    #[serde(default)]
    pub production_thresholds: BTreeMap<String, ProductionThreshold>,
    #[serde(default)]
    pub scenario_data: ScenarioData,
    #[serde(default)]
    pub sectoral_approach: BTreeMap<String, SectorApproachRule>,
}

impl ConfigStore {
    /// Parse and validate a YAML parameter document.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: ConfigStore = serde_yaml::from_str(yaml)?;
        validate(&config)?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Load and validate a YAML parameter file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml(&raw)
    }

    /// Write the parameter set as YAML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_yaml()?)?;
        Ok(())
    }

    pub fn with_sector(
        mut self,
        sector: impl Into<String>,
        rule: SectorApproachRule,
        economic_weight: f64,
    ) -> Self {
        let sector = sector.into();
        self.economic_weights.insert(sector.clone(), economic_weight);
        self.sectoral_approach.insert(sector, rule);
        self
    }

    pub fn with_threshold(mut self, sector: impl Into<String>, threshold: ProductionThreshold) -> Self {
        self.production_thresholds.insert(sector.into(), threshold);
        self
    }

    pub fn with_scenario_files(
        mut self,
        start_year: i32,
        scenario_set: impl Into<String>,
        files: ScenarioFiles,
    ) -> Self {
        self.scenario_data
            .scenario_files
            .entry(start_year)
            .or_default()
            .insert(scenario_set.into(), files);
        self
    }

    pub fn with_region_file(mut self, scenario_set: impl Into<String>, source: impl Into<String>) -> Self {
        self.scenario_data
            .region_file
            .insert(scenario_set.into(), source.into());
        self
    }

    /// Apply a partial update. The receiver is left untouched; the merged
    /// store is returned only if it validates.
    pub fn apply(&self, patch: ConfigPatch) -> std::result::Result<ConfigStore, ConfigurationError> {
        let mut next = self.clone();
        if let Some(v) = patch.main_climate_file {
            next.main_climate_file = v;
        }
        if let Some(v) = patch.company_information_file {
            next.company_information_file = Some(v);
        }
        if let Some(v) = patch.economic_weights {
            next.economic_weights = v;
        }
        if let Some(v) = patch.production_thresholds {
            next.production_thresholds = v;
        }
        if let Some(v) = patch.scenario_data {
            next.scenario_data = v;
        }
        if let Some(v) = patch.sectoral_approach {
            next.sectoral_approach = v;
        }
        validate(&next)?;
        Ok(next)
    }

    /// Plans for every active sector, ordered by sector name.
    pub fn sector_plans(&self) -> std::result::Result<Vec<SectorPlan>, ConfigurationError> {
        validate(self)?;
        let mut plans = Vec::new();
        for (sector, rule) in self.sectoral_approach.iter().filter(|(_, r)| r.active) {
            let weight = self.economic_weights.get(sector).copied().ok_or_else(|| {
                ConfigurationError::MissingEconomicWeight {
                    sector: sector.clone(),
                }
            })?;
            plans.push(SectorPlan::resolve(sector, rule, weight));
        }
        Ok(plans)
    }

    pub fn scenario_files(
        &self,
        start_year: i32,
        scenario_set: &str,
    ) -> std::result::Result<&ScenarioFiles, ConfigurationError> {
        self.scenario_data
            .scenario_files
            .get(&start_year)
            .and_then(|sets| sets.get(scenario_set))
            .ok_or_else(|| ConfigurationError::MissingScenarioFiles {
                start_year,
                scenario_set: scenario_set.to_string(),
            })
    }

    pub fn has_region_file(&self, scenario_set: &str) -> bool {
        self.scenario_data.region_file.contains_key(scenario_set)
    }
}

/// Partial configuration update. `None` keeps the current section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigPatch {
    pub main_climate_file: Option<BTreeMap<i32, ClimateSources>>,
    pub company_information_file: Option<String>,
    pub economic_weights: Option<BTreeMap<String, f64>>,
    pub production_thresholds: Option<BTreeMap<String, ProductionThreshold>>,
    pub scenario_data: Option<ScenarioData>,
    pub sectoral_approach: Option<BTreeMap<String, SectorApproachRule>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AlignmentError;

    const PARAMETERS: &str = r#"
main_climate_file:
  2023:
    - /data/company_analytics_2023.csv
    - /data/company_indicators_2023.csv
company_information_file: /data/company_information.csv
economic_weights:
  power: 800
  automotive: 300
production_thresholds:
  power:
    asset_ratio: 0.0003
    turnover_ratio: 0.001
scenario_data:
  scenario_files:
    2023:
      weo:
        scenario_file_tms: /data/weo_2023_tms.csv
        scenario_file_sda: /data/weo_2023_sda.csv
  region_file:
    weo: /data/weo_regions.csv
sectoral_approach:
  power:
    approach: tms
    sector: [coalcap, gascap]
    technology: [renewablescap]
    build_out: [renewablescap]
    phase_out: [coalcap, gascap]
    regional: true
  automotive:
    approach: tms
    technology: [electric, ice]
    build_out: [electric]
    phase_out: [ice]
  aviation:
    approach: sda
    other: [passenger]
    active: false
"#;

    #[test]
    fn parses_parameter_file_with_legacy_keys() {
        let config = ConfigStore::from_yaml(PARAMETERS).expect("valid parameters");
        assert_eq!(
            config.main_climate_file[&2023].indicators_source,
            "/data/company_indicators_2023.csv"
        );
        let files = config.scenario_files(2023, "weo").expect("weo files");
        assert_eq!(files.tms_source, "/data/weo_2023_tms.csv");
        assert!(config.has_region_file("weo"));
        assert!(!config.sectoral_approach["aviation"].active);
    }

    #[test]
    fn sector_plans_cover_active_sectors_only() {
        let config = ConfigStore::from_yaml(PARAMETERS).expect("valid parameters");
        let plans = config.sector_plans().expect("plans");
        let names: Vec<&str> = plans.iter().map(|p| p.sector.as_str()).collect();
        assert_eq!(names, vec!["automotive", "power"]);
        assert_eq!(plans[1].economic_weight, 800.0);
        assert!(plans[1].regional);
    }

    #[test]
    fn yaml_round_trip_preserves_store() {
        let config = ConfigStore::from_yaml(PARAMETERS).expect("valid parameters");
        let yaml = config.to_yaml().expect("serialize");
        let reparsed = ConfigStore::from_yaml(&yaml).expect("reparse");
        assert_eq!(config, reparsed);
    }

    #[test]
    fn missing_scenario_files_names_year_and_set() {
        let config = ConfigStore::from_yaml(PARAMETERS).expect("valid parameters");
        let err = config.scenario_files(2024, "geco").unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::MissingScenarioFiles {
                start_year: 2024,
                scenario_set: "geco".to_string(),
            }
        );
    }

    #[test]
    fn from_yaml_rejects_missing_weight() {
        let yaml = PARAMETERS.replace("  automotive: 300\n", "");
        let err = ConfigStore::from_yaml(&yaml).unwrap_err();
        assert!(matches!(
            err,
            AlignmentError::Configuration(ConfigurationError::MissingEconomicWeight { ref sector })
                if sector == "automotive"
        ));
    }

    #[test]
    fn rejected_patch_leaves_store_untouched() {
        let config = ConfigStore::from_yaml(PARAMETERS).expect("valid parameters");
        let patch = ConfigPatch {
            economic_weights: Some(BTreeMap::from([("power".to_string(), 800.0)])),
            ..ConfigPatch::default()
        };
        assert!(config.apply(patch).is_err());
        assert_eq!(config.economic_weights.len(), 2);

        let patch = ConfigPatch {
            company_information_file: Some("/data/other.csv".to_string()),
            ..ConfigPatch::default()
        };
        let next = config.apply(patch).expect("valid patch");
        assert_eq!(
            next.company_information_file.as_deref(),
            Some("/data/other.csv")
        );
        assert_eq!(next.sectoral_approach, config.sectoral_approach);
    }

    #[test]
    fn save_then_load_uses_yaml_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".climate").join("parameters.yaml");
        let config = ConfigStore::from_yaml(PARAMETERS).expect("valid parameters");
        config.save(&path).expect("save");
        let loaded = ConfigStore::load(&path).expect("load");
        assert_eq!(loaded, config);
    }
}
