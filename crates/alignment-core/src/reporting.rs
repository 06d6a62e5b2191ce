use anyhow::{Context, Result as AnyResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::domain::{AlignmentError, AlignmentResultSet, AuditReport, Result};
use crate::engine::{AnalysisOutcome, AnalysisRequest};

pub const REPORT_SCHEMA_VERSION: &str = "1.0";

/// Persisted result of one analysis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlignmentReport {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    pub run_id: Uuid,
    pub request: AnalysisRequest,
    pub results: AlignmentResultSet,
    pub audit: AuditReport,
}

impl AlignmentReport {
    pub fn from_outcome(outcome: &AnalysisOutcome) -> Self {
        Self {
            schema_version: REPORT_SCHEMA_VERSION.to_string(),
            generated_at: Utc::now(),
            run_id: outcome.run_id,
            request: outcome.request.clone(),
            results: outcome.results.clone(),
            audit: outcome.audit.clone(),
        }
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Persist `<dir>/<run_id>/report.json` and `<dir>/<run_id>/report.digest`.
pub fn write_report(report: &AlignmentReport, dir: &Path) -> Result<PathBuf> {
    let run_dir = dir.join(report.run_id.to_string());
    std::fs::create_dir_all(&run_dir)?;

    let path = run_dir.join("report.json");
    let digest_path = run_dir.join("report.digest");
    let json = serde_json::to_vec_pretty(report)?;

    std::fs::write(&path, &json)?;
    std::fs::write(&digest_path, sha256_hex(&json).as_bytes())?;

    Ok(path)
}

/// Read `report.json` from `run_dir` and verify it against `report.digest`.
pub fn read_report(run_dir: &Path) -> Result<AlignmentReport> {
    let json = std::fs::read(run_dir.join("report.json"))?;
    let digest = std::fs::read_to_string(run_dir.join("report.digest"))?;
    let actual = sha256_hex(&json);
    if digest.trim() != actual {
        return Err(AlignmentError::DigestMismatch {
            expected: digest.trim().to_string(),
            actual,
        });
    }
    Ok(serde_json::from_slice(&json)?)
}

/// Render a markdown summary for review.
pub fn render_summary_md(report: &AlignmentReport) -> String {
    let request = &report.request;
    let results = &report.results;
    let mut out = String::new();
    out.push_str("# Alignment Summary\n\n");
    out.push_str(&format!(
        "- scenario: {} / {}\n- horizon: {} → {}\n- run: `{}`\n\n",
        request.scenario_set,
        request.pathway,
        results.start_year,
        results.terminal_year,
        report.run_id
    ));

    out.push_str("## Scores\n");
    if results.is_empty() {
        out.push_str("_no scored rows_\n\n");
    } else {
        let header = if results.facets.is_empty() {
            "portfolio".to_string()
        } else {
            results.facets.join(" | ")
        };
        out.push_str(&format!("| {header} | score | exposure |\n"));
        out.push_str(&format!(
            "|{}---|---|\n",
            "---|".repeat(results.facets.len().max(1))
        ));
        for row in results.iter() {
            let key = if results.facets.is_empty() {
                "total".to_string()
            } else {
                results
                    .facets
                    .iter()
                    .map(|f| row.value(f).unwrap_or(""))
                    .collect::<Vec<_>>()
                    .join(" | ")
            };
            out.push_str(&format!(
                "| {key} | {:.4} | {:.2} |\n",
                row.score, row.exposure
            ));
        }
        out.push('\n');
    }

    out.push_str("## Audit\n");
    out.push_str(&format!("- gaps: {}\n", report.audit.len()));
    for kind in [
        "missing_production",
        "below_threshold",
        "undefined_ratio",
        "missing_emission_factor",
        "scenario_sector_unavailable",
        "scenario_target_missing",
    ] {
        let n = report.audit.count(kind);
        if n > 0 {
            out.push_str(&format!("- {kind}: {n}\n"));
        }
    }
    let omitted = report.audit.omitted_sectors();
    if !omitted.is_empty() {
        out.push_str(&format!("- omitted sectors: {}\n", omitted.join(", ")));
    }
    out
}

/// Write the markdown summary.
pub fn write_summary_md(path: &Path, report: &AlignmentReport) -> AnyResult<()> {
    let md = render_summary_md(report);
    std::fs::write(path, md).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AlignmentResult, DataGap, SectorContribution};
    use std::collections::BTreeMap;

    fn report() -> AlignmentReport {
        let sectors = BTreeMap::from([(
            "power".to_string(),
            SectorContribution {
                weighted_delta: 50.0,
                weight: 100.0,
                exposure: 100.0,
                economic_weight: 1.0,
            },
        )]);
        let row = AlignmentResult::from_sectors(
            BTreeMap::from([("company_id".to_string(), "c1".to_string())]),
            sectors,
            3.0,
        );
        let mut audit = AuditReport::new();
        audit.record(DataGap::ScenarioSectorUnavailable {
            sector: "cement".to_string(),
        });
        AlignmentReport {
            schema_version: REPORT_SCHEMA_VERSION.to_string(),
            generated_at: Utc::now(),
            run_id: Uuid::new_v4(),
            request: AnalysisRequest::new("weo", "nze_2050", 2023),
            results: AlignmentResultSet {
                facets: vec!["company_id".to_string()],
                start_year: 2023,
                terminal_year: 2028,
                limit: 3.0,
                rows: vec![row],
            },
            audit,
        }
    }

    #[test]
    fn report_schema_has_expected_keys() {
        let value = serde_json::to_value(report()).expect("serialize");
        let obj = value.as_object().expect("object");
        for key in ["schema_version", "generated_at", "run_id", "request", "results", "audit"] {
            assert!(obj.contains_key(key), "missing {key}");
        }
        assert_eq!(value["audit"]["gaps"][0]["kind"], "scenario_sector_unavailable");
    }

    #[test]
    fn written_report_reads_back_verified() {
        let dir = tempfile::tempdir().expect("tempdir");
        let report = report();
        let path = write_report(&report, dir.path()).expect("write");
        let run_dir = path.parent().expect("run dir");
        assert_eq!(read_report(run_dir).expect("read"), report);
    }

    #[test]
    fn tampered_report_fails_digest_check() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_report(&report(), dir.path()).expect("write");
        let mut raw = std::fs::read_to_string(&path).expect("read raw");
        raw = raw.replace("\"c1\"", "\"c2\"");
        std::fs::write(&path, raw).expect("tamper");

        let err = read_report(path.parent().expect("run dir")).unwrap_err();
        assert!(matches!(err, AlignmentError::DigestMismatch { .. }));
    }

    #[test]
    fn summary_lists_scores_and_gaps() {
        let md = render_summary_md(&report());
        assert!(md.contains("# Alignment Summary"));
        assert!(md.contains("| c1 | 0.5000 | 100.00 |"));
        assert!(md.contains("- scenario_sector_unavailable: 1"));
        assert!(md.contains("- omitted sectors: cement"));
    }

    #[test]
    fn summary_written_to_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("summary.md");
        write_summary_md(&path, &report()).expect("write md");
        let md = std::fs::read_to_string(&path).expect("read md");
        assert!(md.starts_with("# Alignment Summary"));
    }
}
