//! Domain models for the alignment engine.
//!
//! Canonical definitions for the core entities:
//! - `LoanRecord`, `CompanyDataset`: borrower exposure and production inputs
//! - `ScenarioLibrary`: published pathway targets per start year and set
//! - `AlignmentResultSet`: scored rows at a chosen grouping level
//! - `AuditReport`: recoverable data gaps found during an analysis

pub mod audit;
pub mod error;
pub mod records;
pub mod result;
pub mod scenario;

pub use audit::{AuditReport, DataGap, RatioKind};
pub use error::{AlignmentError, ConfigurationError, Result};
pub use records::{
    CompanyDataset, CompanyProductionRecord, CompanyProfile, LoanRecord, OwnershipLink,
};
pub use result::{AlignmentResult, AlignmentResultSet, SectorContribution};
pub use scenario::{
    RegionMembership, ScenarioBundle, ScenarioKey, ScenarioLibrary, ScenarioTarget, TargetValue,
    GLOBAL_REGION,
};
