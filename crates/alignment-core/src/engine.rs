//! Analysis entry points.
//!
//! [`run_analysis`] executes one request end to end:
//! join → sector shares → threshold → projection → scoring → aggregation.
//! [`AlignmentCalculator`] owns a validated configuration snapshot and the
//! scenario library, and can fan independent requests out over a tokio
//! `JoinSet`.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::aggregator;
use crate::config::{validate, ConfigPatch, ConfigStore};
use crate::domain::{
    AlignmentError, AlignmentResultSet, AuditReport, CompanyDataset, ConfigurationError,
    LoanRecord, Result, ScenarioKey, ScenarioLibrary,
};
use crate::joiner;
use crate::metrics::METRICS;
use crate::obs::{self, AnalysisSpan};
use crate::projector::{self, ProjectionContext};
use crate::scorer;
use crate::threshold;

fn default_facets() -> Vec<String> {
    vec!["company_id".to_string()]
}

fn default_horizon() -> i32 {
    5
}

fn default_limit() -> f64 {
    3.0
}

fn default_true() -> bool {
    true
}

/// Tunables of one analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOptions {
    #[serde(default = "default_facets")]
    pub facets: Vec<String>,
    /// Years between start and terminal year.
    #[serde(default = "default_horizon")]
    pub horizon: i32,
    /// Published scores are clipped to ±limit.
    #[serde(default = "default_limit")]
    pub limit: f64,
    /// Re-attribute loans to parent companies before joining.
    #[serde(default = "default_true")]
    pub only_parents: bool,
    #[serde(default = "default_true")]
    pub use_region_file: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            facets: default_facets(),
            horizon: default_horizon(),
            limit: default_limit(),
            only_parents: true,
            use_region_file: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub scenario_set: String,
    pub pathway: String,
    pub start_year: i32,
    #[serde(default)]
    pub options: AnalysisOptions,
}

impl AnalysisRequest {
    pub fn new(scenario_set: impl Into<String>, pathway: impl Into<String>, start_year: i32) -> Self {
        Self {
            scenario_set: scenario_set.into(),
            pathway: pathway.into(),
            start_year,
            options: AnalysisOptions::default(),
        }
    }

    pub fn with_facets<I, S>(mut self, facets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.facets = facets.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_horizon(mut self, horizon: i32) -> Self {
        self.options.horizon = horizon;
        self
    }

    pub fn with_limit(mut self, limit: f64) -> Self {
        self.options.limit = limit;
        self
    }

    pub fn with_only_parents(mut self, only_parents: bool) -> Self {
        self.options.only_parents = only_parents;
        self
    }

    pub fn with_region_file(mut self, use_region_file: bool) -> Self {
        self.options.use_region_file = use_region_file;
        self
    }

    pub fn terminal_year(&self) -> i32 {
        self.start_year + self.options.horizon
    }

    fn validate(&self) -> Result<()> {
        if self.scenario_set.trim().is_empty() || self.pathway.trim().is_empty() {
            return Err(AlignmentError::InvalidRequest(
                "scenario_set and pathway must be non-empty".to_string(),
            ));
        }
        if self.options.horizon < 0 {
            return Err(AlignmentError::InvalidRequest(format!(
                "horizon must be non-negative, got {}",
                self.options.horizon
            )));
        }
        if !(self.options.limit.is_finite() && self.options.limit > 0.0) {
            return Err(AlignmentError::InvalidRequest(format!(
                "limit must be positive and finite, got {}",
                self.options.limit
            )));
        }
        Ok(())
    }
}

/// Scores plus the audit trail of everything left out of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub run_id: Uuid,
    pub request: AnalysisRequest,
    pub results: AlignmentResultSet,
    pub audit: AuditReport,
}

/// Run one analysis against a configuration snapshot.
///
/// Configuration problems are reported before any data is touched; data
/// problems end up in the returned [`AuditReport`].
pub fn run_analysis(
    config: &ConfigStore,
    scenarios: &ScenarioLibrary,
    loans: &[LoanRecord],
    companies: &CompanyDataset,
    request: &AnalysisRequest,
) -> Result<AnalysisOutcome> {
    request.validate()?;
    let plans = config.sector_plans()?;
    config.scenario_files(request.start_year, &request.scenario_set)?;
    if request.options.use_region_file && !config.has_region_file(&request.scenario_set) {
        if let Some(plan) = plans.iter().find(|p| p.regional) {
            return Err(ConfigurationError::MissingRegionFile {
                scenario_set: request.scenario_set.clone(),
                sector: plan.sector.clone(),
            }
            .into());
        }
    }

    let bundle = scenarios
        .bundle(request.start_year, &request.scenario_set)
        .filter(|b| b.pathways().contains(request.pathway.as_str()))
        .ok_or_else(|| AlignmentError::ScenarioNotLoaded {
            scenario_set: request.scenario_set.clone(),
            pathway: request.pathway.clone(),
            start_year: request.start_year,
        })?;
    let facets = aggregator::validate_facets(&request.options.facets, loans)?;

    let run_id = Uuid::new_v4();
    let run_label = run_id.to_string();
    let _span = AnalysisSpan::enter(
        &run_label,
        &request.scenario_set,
        &request.pathway,
        request.start_year,
    );
    let started = Instant::now();
    obs::emit_analysis_started(&run_label, loans.len(), companies.production.len());
    METRICS.inc_analyses();

    let frame = joiner::join(&plans, loans, companies, request.options.only_parents)?;
    let mut audit = AuditReport::new();
    audit.extend(frame.gaps);

    let shares = scorer::sector_shares(&frame.production);
    let filtered = threshold::apply_thresholds(frame.production, &config.production_thresholds);
    audit.extend(filtered.gaps);

    let terminal_year = request.terminal_year();
    let ctx = ProjectionContext {
        bundle,
        pathway: &request.pathway,
        start_year: request.start_year,
        terminal_year,
        use_region_file: request.options.use_region_file,
    };
    let projection = projector::project(&plans, &filtered.kept, &ctx);
    audit.extend(projection.gaps);

    let contributions = scorer::score(
        &projection.points,
        &frame.loans,
        &shares,
        &plans,
        terminal_year,
    );
    let results = aggregator::aggregate(
        &contributions,
        &facets,
        request.start_year,
        terminal_year,
        request.options.limit,
    );

    let scored: std::collections::BTreeSet<&str> = projection
        .points
        .iter()
        .map(|p| p.company_id.as_str())
        .collect();
    METRICS.add_companies_scored(scored.len() as u64);
    METRICS.add_exclusions(audit.len() as u64);
    obs::emit_analysis_finished(
        &run_label,
        results.len(),
        audit.len(),
        started.elapsed().as_millis() as u64,
    );

    let mut request = request.clone();
    request.options.facets = facets;
    Ok(AnalysisOutcome {
        run_id,
        request,
        results,
        audit,
    })
}

/// Holds the active configuration and scenario library.
///
/// Cloning is cheap; clones share the same snapshots. Updating the
/// configuration swaps the snapshot, so analyses already running keep the
/// one they started with.
#[derive(Debug, Clone)]
pub struct AlignmentCalculator {
    config: Arc<ConfigStore>,
    scenarios: Arc<ScenarioLibrary>,
}

impl AlignmentCalculator {
    pub fn new(config: ConfigStore, scenarios: ScenarioLibrary) -> Result<Self> {
        validate(&config)?;
        Ok(Self {
            config: Arc::new(config),
            scenarios: Arc::new(scenarios),
        })
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn scenarios(&self) -> &ScenarioLibrary {
        &self.scenarios
    }

    /// Every (scenario set, pathway, start year) that can be analysed.
    pub fn available_scenarios(&self) -> Vec<ScenarioKey> {
        self.scenarios.available()
    }

    /// Merge `patch` into the configuration. A rejected patch leaves the
    /// current configuration in place.
    pub fn update_config(&mut self, patch: ConfigPatch) -> Result<()> {
        match self.config.apply(patch) {
            Ok(next) => {
                self.install(next);
                Ok(())
            }
            Err(e) => {
                obs::emit_config_rejected(&e);
                Err(e.into())
            }
        }
    }

    /// Replace the configuration with the parameter file at `path`.
    pub fn reset_config(&mut self, path: &Path) -> Result<()> {
        let next = ConfigStore::load(path)?;
        self.install(next);
        Ok(())
    }

    pub fn save_config(&self, path: &Path) -> Result<()> {
        self.config.save(path)
    }

    fn install(&mut self, next: ConfigStore) {
        let active = next.sectoral_approach.values().filter(|r| r.active).count();
        self.config = Arc::new(next);
        obs::emit_config_updated(active);
    }

    pub fn compute_alignment(
        &self,
        loans: &[LoanRecord],
        companies: &CompanyDataset,
        request: &AnalysisRequest,
    ) -> Result<AnalysisOutcome> {
        run_analysis(&self.config, &self.scenarios, loans, companies, request)
    }

    pub fn regroup(&self, results: &AlignmentResultSet, facets: &[String]) -> Result<AlignmentResultSet> {
        let regrouped = aggregator::regroup(results, facets)?;
        METRICS.inc_regroups();
        Ok(regrouped)
    }

    /// Run independent requests concurrently over the same inputs.
    ///
    /// Outcomes are returned in request order. The first failing request
    /// fails the batch.
    pub async fn compute_many(
        &self,
        loans: Arc<Vec<LoanRecord>>,
        companies: Arc<CompanyDataset>,
        requests: Vec<AnalysisRequest>,
    ) -> Result<Vec<AnalysisOutcome>> {
        let total = requests.len();
        let mut join_set = JoinSet::new();
        for (idx, request) in requests.into_iter().enumerate() {
            let config = Arc::clone(&self.config);
            let scenarios = Arc::clone(&self.scenarios);
            let loans = Arc::clone(&loans);
            let companies = Arc::clone(&companies);
            join_set.spawn_blocking(move || {
                run_analysis(&config, &scenarios, &loans, &companies, &request)
                    .map(|outcome| (idx, outcome))
            });
        }

        let mut ordered: Vec<Option<AnalysisOutcome>> = vec![None; total];
        while let Some(joined) = join_set.join_next().await {
            let (idx, outcome) =
                joined.map_err(|e| AlignmentError::Task(format!("analysis task join error: {e}")))??;
            ordered[idx] = Some(outcome);
        }

        ordered
            .into_iter()
            .enumerate()
            .map(|(idx, slot)| {
                slot.ok_or_else(|| AlignmentError::Task(format!("missing outcome for request {idx}")))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Direction, SectorApproachRule};

    fn config() -> ConfigStore {
        ConfigStore::default().with_sector(
            "power",
            SectorApproachRule::tms()
                .with_technology_level(Direction::BuildOut, &["renewablescap"])
                .with_sector_level(Direction::PhaseOut, &["coalcap"]),
            1.0,
        )
    }

    #[test]
    fn options_default_to_company_level_five_year_horizon() {
        let request = AnalysisRequest::new("weo", "nze_2050", 2023);
        assert_eq!(request.options.facets, vec!["company_id".to_string()]);
        assert_eq!(request.terminal_year(), 2028);
        assert_eq!(request.options.limit, 3.0);
        assert!(request.options.only_parents);

        let parsed: AnalysisRequest = serde_json::from_str(
            r#"{"scenario_set":"weo","pathway":"nze_2050","start_year":2023,"options":{"horizon":2}}"#,
        )
        .expect("parse request");
        assert_eq!(parsed.terminal_year(), 2025);
        assert_eq!(parsed.options.facets, vec!["company_id".to_string()]);
    }

    #[test]
    fn invalid_limit_is_rejected() {
        let calc = AlignmentCalculator::new(config(), ScenarioLibrary::new()).expect("calculator");
        let request = AnalysisRequest::new("weo", "nze_2050", 2023).with_limit(0.0);
        let err = calc
            .compute_alignment(&[], &CompanyDataset::default(), &request)
            .unwrap_err();
        assert!(matches!(err, AlignmentError::InvalidRequest(_)));
    }

    #[test]
    fn missing_scenario_files_is_a_configuration_error() {
        let calc = AlignmentCalculator::new(config(), ScenarioLibrary::new()).expect("calculator");
        let request = AnalysisRequest::new("weo", "nze_2050", 2023);
        let err = calc
            .compute_alignment(&[], &CompanyDataset::default(), &request)
            .unwrap_err();
        assert!(matches!(
            err,
            AlignmentError::Configuration(ConfigurationError::MissingScenarioFiles { .. })
        ));
    }

    #[test]
    fn rejected_patch_keeps_previous_config() {
        let mut calc = AlignmentCalculator::new(config(), ScenarioLibrary::new()).expect("calculator");
        let before = calc.config().clone();
        let patch = ConfigPatch {
            economic_weights: Some(Default::default()),
            ..ConfigPatch::default()
        };
        let err = calc.update_config(patch).unwrap_err();
        assert!(matches!(
            err,
            AlignmentError::Configuration(ConfigurationError::MissingEconomicWeight { .. })
        ));
        assert_eq!(calc.config(), &before);
    }

    #[test]
    fn config_round_trips_through_reset() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings").join("parameters.yml");
        let mut calc = AlignmentCalculator::new(config(), ScenarioLibrary::new()).expect("calculator");
        calc.save_config(&path).expect("save");

        let patch = ConfigPatch {
            economic_weights: Some([("power".to_string(), 2.0)].into_iter().collect()),
            ..ConfigPatch::default()
        };
        calc.update_config(patch).expect("update");
        assert_eq!(calc.config().economic_weights["power"], 2.0);

        calc.reset_config(&path).expect("reset");
        assert_eq!(calc.config().economic_weights["power"], 1.0);
    }
}
