//! Observability tests for the analysis lifecycle.
//!
//! These tests verify that structured tracing events and metric counters are
//! produced for the key lifecycle stages: analysis start and finish,
//! exclusions, regrouping and configuration updates.

use alignment_core::obs::{
    emit_analysis_finished, emit_analysis_started, emit_config_rejected, emit_config_updated,
    emit_loan_unmatched, emit_results_regrouped, emit_sector_excluded, emit_threshold_excluded,
    AnalysisSpan,
};
use alignment_core::{
    init_tracing, AlignmentCalculator, AnalysisRequest, CompanyDataset, CompanyProductionRecord,
    ConfigStore, Direction, LoanRecord, ScenarioBundle, ScenarioLibrary, ScenarioTarget,
    SectorApproachRule, TargetValue, GLOBAL_REGION, METRICS,
};
use alignment_core::config::ScenarioFiles;
use tracing::Level;

#[test]
fn test_emit_analysis_lifecycle_events() {
    init_tracing(false, Level::DEBUG);
    let _span = AnalysisSpan::enter("run-123", "weo", "nze_2050", 2023);
    emit_analysis_started("run-123", 10, 250);
    emit_analysis_finished("run-123", 4, 1, 12);
}

#[test]
fn test_emit_exclusion_events() {
    init_tracing(false, Level::DEBUG);
    emit_sector_excluded("cement", "no scenario targets for pathway");
    emit_threshold_excluded("c1", "power", "below threshold");
    emit_loan_unmatched("ghost", 2);
}

#[test]
fn test_emit_regroup_and_config_events() {
    init_tracing(true, Level::INFO);
    emit_results_regrouped(&["portfolio_id".to_string()], 3);
    emit_config_updated(4);
    emit_config_rejected(&"missing economic weight for active sector: steel");
}

#[test]
fn test_analysis_updates_metrics() {
    let config = ConfigStore::default()
        .with_sector(
            "automotive",
            SectorApproachRule::tms()
                .with_technology_level(Direction::BuildOut, &["electric"])
                .with_technology_level(Direction::PhaseOut, &["ice"]),
            1.0,
        )
        .with_scenario_files(
            2023,
            "weo",
            ScenarioFiles {
                tms_source: "tms.csv".to_string(),
                sda_source: "sda.csv".to_string(),
            },
        );
    let targets = ["electric", "ice"]
        .into_iter()
        .flat_map(|tech| {
            (2023..=2028).map(move |year| ScenarioTarget {
                scenario_set: "weo".to_string(),
                pathway: "nze_2050".to_string(),
                region: GLOBAL_REGION.to_string(),
                sector: "automotive".to_string(),
                technology: Some(tech.to_string()),
                year,
                value: TargetValue::MarketShare { tmsr: 1.0, smsp: 0.0 },
            })
        })
        .collect();
    let library = ScenarioLibrary::new().with_bundle(ScenarioBundle::new(2023, "weo").with_targets(targets));
    let companies = CompanyDataset::new(vec![
        CompanyProductionRecord::new("carmaker", "automotive", "electric", 2023, 40.0),
        CompanyProductionRecord::new("carmaker", "automotive", "ice", 2023, 60.0),
    ]);
    let loans = vec![
        LoanRecord::new("l1", "carmaker", 100.0, 2023),
        LoanRecord::new("l2", "ghost", 10.0, 2023),
    ];

    let before_runs = METRICS.analyses_run();
    let before_companies = METRICS.companies_scored();
    let before_exclusions = METRICS.exclusions_recorded();

    let calc = AlignmentCalculator::new(config, library).expect("calculator");
    let outcome = calc
        .compute_alignment(&loans, &companies, &AnalysisRequest::new("weo", "nze_2050", 2023))
        .expect("analysis");
    assert_eq!(outcome.audit.len(), 1);

    assert!(METRICS.analyses_run() > before_runs);
    assert!(METRICS.companies_scored() > before_companies);
    assert!(METRICS.exclusions_recorded() > before_exclusions);
    METRICS.flush();
}
