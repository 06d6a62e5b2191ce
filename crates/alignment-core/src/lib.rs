//! Climate alignment core library
//!
//! Scores how closely a loan portfolio's financed production tracks a
//! decarbonisation scenario. Re-exports the pipeline stages and the
//! [`AlignmentCalculator`] entry point for programmatic access.

pub mod aggregator;
pub mod config;
pub mod domain;
pub mod engine;
pub mod joiner;
pub mod metrics;
pub mod obs;
pub mod projector;
pub mod region;
pub mod reporting;
pub mod scorer;
pub mod telemetry;
pub mod threshold;

pub use config::{
    Approach, ConfigPatch, ConfigStore, Direction, ProductionThreshold, ScenarioFiles,
    SectorApproachRule, SectorPlan, TargetLevel,
};

pub use domain::{
    AlignmentError, AlignmentResult, AlignmentResultSet, AuditReport, CompanyDataset,
    CompanyProductionRecord, CompanyProfile, ConfigurationError, DataGap, LoanRecord,
    OwnershipLink, RatioKind, RegionMembership, Result, ScenarioBundle, ScenarioKey,
    ScenarioLibrary, ScenarioTarget, SectorContribution, TargetValue, GLOBAL_REGION,
};

pub use engine::{
    run_analysis, AlignmentCalculator, AnalysisOptions, AnalysisOutcome, AnalysisRequest,
};

pub use reporting::{read_report, write_report, AlignmentReport};

pub use metrics::METRICS;
pub use telemetry::init_tracing;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
