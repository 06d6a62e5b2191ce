//! Structured observability hooks for alignment analyses.
//!
//! This module provides:
//! - Analysis-scoped tracing spans via the `AnalysisSpan` RAII guard
//! - Emission functions for pipeline events: start, exclusions, finish, regroup
//!
//! Stage events carry an `event` field (`analysis.started`,
//! `sector.excluded`, ...) so log pipelines can filter on it. Events emitted
//! inside an `AnalysisSpan` inherit its `run_id`.

use tracing::{debug, info, warn};

/// RAII guard that enters an analysis-scoped span for the duration of a run.
///
/// # Example
///
/// ```ignore
/// let _span = AnalysisSpan::enter("3f0c…", "weo", "nze_2050", 2023);
/// // every event below is tagged with run_id, scenario_set, pathway, start_year
/// ```
pub struct AnalysisSpan {
    _span: tracing::span::EnteredSpan,
}

impl AnalysisSpan {
    pub fn enter(run_id: &str, scenario_set: &str, pathway: &str, start_year: i32) -> Self {
        let span = tracing::info_span!(
            "alignment.analysis",
            run_id = %run_id,
            scenario_set = %scenario_set,
            pathway = %pathway,
            start_year = start_year,
        );
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: analysis started with input sizes.
pub fn emit_analysis_started(run_id: &str, loans: usize, production_records: usize) {
    info!(
        event = "analysis.started",
        run_id = %run_id,
        loans = loans,
        production_records = production_records,
    );
}

/// Emit event: analysis finished.
pub fn emit_analysis_finished(run_id: &str, rows: usize, gaps: usize, duration_ms: u64) {
    info!(
        event = "analysis.finished",
        run_id = %run_id,
        rows = rows,
        gaps = gaps,
        duration_ms = duration_ms,
    );
}

/// Emit event: a whole sector was left out of the blend (warning level).
pub fn emit_sector_excluded(sector: &str, reason: &str) {
    warn!(event = "sector.excluded", sector = %sector, reason = %reason);
}

/// Emit event: a company-sector pair failed the production threshold.
pub fn emit_threshold_excluded(company_id: &str, sector: &str, reason: &str) {
    debug!(
        event = "threshold.excluded",
        company_id = %company_id,
        sector = %sector,
        reason = %reason,
    );
}

/// Emit event: loans reference a company without production data (warning level).
pub fn emit_loan_unmatched(company_id: &str, loans: usize) {
    warn!(event = "loan.unmatched", company_id = %company_id, loans = loans);
}

/// Emit event: results regrouped to a new facet list.
pub fn emit_results_regrouped(facets: &[String], rows: usize) {
    info!(event = "results.regrouped", facets = ?facets, rows = rows);
}

/// Emit event: configuration update accepted.
pub fn emit_config_updated(active_sectors: usize) {
    info!(event = "config.updated", active_sectors = active_sectors);
}

/// Emit event: configuration update rejected (warning level).
pub fn emit_config_rejected(error: &dyn std::fmt::Display) {
    warn!(event = "config.rejected", error = %error);
}
