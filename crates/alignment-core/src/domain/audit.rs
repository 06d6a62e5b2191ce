//! Recoverable data-quality findings collected during an analysis.
//!
//! Nothing here aborts a run: each gap documents data that was left out of
//! the scores and why.

use serde::{Deserialize, Serialize};

/// Which threshold ratio could not be computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatioKind {
    Asset,
    Turnover,
}

/// A single exclusion or gap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataGap {
    /// Company is in the loan book but has no production data.
    MissingProduction {
        company_id: String,
        loan_ids: Vec<String>,
    },
    /// Company-sector excluded by the production threshold.
    BelowThreshold {
        company_id: String,
        sector: String,
        asset_ratio: f64,
        turnover_ratio: f64,
    },
    /// Threshold ratio denominator was zero or missing.
    UndefinedRatio {
        company_id: String,
        sector: String,
        ratio: RatioKind,
    },
    /// sda company-sector without any emission factor.
    MissingEmissionFactor { company_id: String, sector: String },
    /// Active sector without scenario data for the analysed pathway.
    ScenarioSectorUnavailable { sector: String },
    /// Terminal-year target missing; the whole sector is omitted.
    ScenarioTargetMissing {
        sector: String,
        technology: String,
        region: String,
        year: i32,
    },
}

impl DataGap {
    /// Short, stable label of the gap kind.
    pub fn kind(&self) -> &'static str {
        match self {
            DataGap::MissingProduction { .. } => "missing_production",
            DataGap::BelowThreshold { .. } => "below_threshold",
            DataGap::UndefinedRatio { .. } => "undefined_ratio",
            DataGap::MissingEmissionFactor { .. } => "missing_emission_factor",
            DataGap::ScenarioSectorUnavailable { .. } => "scenario_sector_unavailable",
            DataGap::ScenarioTargetMissing { .. } => "scenario_target_missing",
        }
    }

    /// Sector affected by the gap, if the gap is sector-scoped.
    pub fn sector(&self) -> Option<&str> {
        match self {
            DataGap::MissingProduction { .. } => None,
            DataGap::BelowThreshold { sector, .. }
            | DataGap::UndefinedRatio { sector, .. }
            | DataGap::MissingEmissionFactor { sector, .. }
            | DataGap::ScenarioSectorUnavailable { sector }
            | DataGap::ScenarioTargetMissing { sector, .. } => Some(sector.as_str()),
        }
    }
}

/// Ordered collection of every gap found in one analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    pub gaps: Vec<DataGap>,
}

impl AuditReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, gap: DataGap) {
        self.gaps.push(gap);
    }

    pub fn extend(&mut self, gaps: impl IntoIterator<Item = DataGap>) {
        self.gaps.extend(gaps);
    }

    pub fn is_empty(&self) -> bool {
        self.gaps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.gaps.len()
    }

    /// Number of gaps of the given kind label.
    pub fn count(&self, kind: &str) -> usize {
        self.gaps.iter().filter(|g| g.kind() == kind).count()
    }

    /// Sectors omitted entirely from the blend.
    pub fn omitted_sectors(&self) -> Vec<&str> {
        let mut sectors: Vec<&str> = self
            .gaps
            .iter()
            .filter(|g| {
                matches!(
                    g,
                    DataGap::ScenarioSectorUnavailable { .. }
                        | DataGap::ScenarioTargetMissing { .. }
                )
            })
            .filter_map(DataGap::sector)
            .collect();
        sectors.sort_unstable();
        sectors.dedup();
        sectors
    }
}
