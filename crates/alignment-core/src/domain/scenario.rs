//! Scenario reference data: published pathway targets and region membership.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Region name used when no regional target applies.
pub const GLOBAL_REGION: &str = "global";

/// The value of a single pathway data point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "metric", rename_all = "snake_case")]
pub enum TargetValue {
    /// tms: technology market-share ratio and sector market-share percentage.
    MarketShare { tmsr: f64, smsp: f64 },
    /// sda: emission intensity per unit of production.
    EmissionIntensity { emission_factor: f64 },
}

/// One published pathway data point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioTarget {
    pub scenario_set: String,
    pub pathway: String,
    pub region: String,
    pub sector: String,
    /// `None` for sector-wide intensity curves.
    #[serde(default)]
    pub technology: Option<String>,
    pub year: i32,
    #[serde(flatten)]
    pub value: TargetValue,
}

/// Membership of one country in a scenario region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionMembership {
    pub scenario_set: String,
    pub region: String,
    pub iso: String,
}

/// Identifies one loadable scenario.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScenarioKey {
    pub scenario_set: String,
    pub pathway: String,
    pub start_year: i32,
}

/// All targets published for one (start year, scenario set).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioBundle {
    pub start_year: i32,
    pub scenario_set: String,
    pub targets: Vec<ScenarioTarget>,
    #[serde(default)]
    pub regions: Vec<RegionMembership>,
}

impl ScenarioBundle {
    pub fn new(start_year: i32, scenario_set: impl Into<String>) -> Self {
        Self {
            start_year,
            scenario_set: scenario_set.into(),
            targets: Vec::new(),
            regions: Vec::new(),
        }
    }

    pub fn with_targets(mut self, targets: Vec<ScenarioTarget>) -> Self {
        self.targets = targets;
        self
    }

    pub fn with_regions(mut self, regions: Vec<RegionMembership>) -> Self {
        self.regions = regions;
        self
    }

    pub fn pathways(&self) -> BTreeSet<&str> {
        self.targets.iter().map(|t| t.pathway.as_str()).collect()
    }

    /// Targets of one pathway for one sector.
    pub fn sector_targets<'a>(
        &'a self,
        pathway: &'a str,
        sector: &'a str,
    ) -> impl Iterator<Item = &'a ScenarioTarget> + 'a {
        self.targets
            .iter()
            .filter(move |t| t.pathway == pathway && t.sector == sector)
    }
}

/// Every scenario bundle available to the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScenarioLibrary {
    bundles: Vec<ScenarioBundle>,
}

impl ScenarioLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a bundle, replacing any bundle with the same start year and set.
    pub fn insert(&mut self, bundle: ScenarioBundle) {
        self.bundles.retain(|b| {
            !(b.start_year == bundle.start_year && b.scenario_set == bundle.scenario_set)
        });
        self.bundles.push(bundle);
    }

    pub fn with_bundle(mut self, bundle: ScenarioBundle) -> Self {
        self.insert(bundle);
        self
    }

    pub fn bundle(&self, start_year: i32, scenario_set: &str) -> Option<&ScenarioBundle> {
        self.bundles
            .iter()
            .find(|b| b.start_year == start_year && b.scenario_set == scenario_set)
    }

    /// Every (scenario set, pathway, start year) combination with targets.
    pub fn available(&self) -> Vec<ScenarioKey> {
        let mut keys: BTreeSet<ScenarioKey> = BTreeSet::new();
        for bundle in &self.bundles {
            for pathway in bundle.pathways() {
                keys.insert(ScenarioKey {
                    scenario_set: bundle.scenario_set.clone(),
                    pathway: pathway.to_string(),
                    start_year: bundle.start_year,
                });
            }
        }
        keys.into_iter().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }
}
