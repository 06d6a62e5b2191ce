//! Production threshold filter.
//!
//! For every company-sector pair of a sector with a configured threshold,
//! production (summed over all years and technologies) is divided by the
//! company's total assets and turnover. The pair is excluded when either
//! ratio is below the minimum or cannot be computed.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::ProductionThreshold;
use crate::domain::{DataGap, RatioKind};
use crate::joiner::ProductionRow;
use crate::obs;

/// Rows that passed the filter and the exclusions that did not.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThresholdOutcome {
    pub kept: Vec<ProductionRow>,
    pub gaps: Vec<DataGap>,
}

#[derive(Default)]
struct PairTotals {
    production: f64,
    assets: Vec<f64>,
    turnover: Vec<f64>,
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn ratio(production: f64, denominator: Option<f64>) -> Option<f64> {
    match denominator {
        Some(d) if d != 0.0 && d.is_finite() => Some(production / d),
        _ => None,
    }
}

/// Apply per-sector production thresholds. Applying the filter to its own
/// output removes nothing further.
pub fn apply_thresholds(
    rows: Vec<ProductionRow>,
    thresholds: &BTreeMap<String, ProductionThreshold>,
) -> ThresholdOutcome {
    let mut totals: BTreeMap<(String, String), PairTotals> = BTreeMap::new();
    for row in rows.iter().filter(|r| thresholds.contains_key(&r.sector)) {
        let pair = totals
            .entry((row.company_id.clone(), row.sector.clone()))
            .or_default();
        pair.production += row.production;
        pair.assets.extend(row.total_assets);
        pair.turnover.extend(row.turnover);
    }

    let mut gaps = Vec::new();
    let mut excluded: BTreeSet<(String, String)> = BTreeSet::new();
    for ((company_id, sector), pair) in &totals {
        let Some(threshold) = thresholds.get(sector) else {
            continue;
        };
        let asset_ratio = ratio(pair.production, mean(&pair.assets));
        let turnover_ratio = ratio(pair.production, mean(&pair.turnover));

        let mut undefined = false;
        for (kind, value) in [
            (RatioKind::Asset, asset_ratio),
            (RatioKind::Turnover, turnover_ratio),
        ] {
            if value.is_none() {
                undefined = true;
                obs::emit_threshold_excluded(company_id, sector, "undefined ratio");
                gaps.push(DataGap::UndefinedRatio {
                    company_id: company_id.clone(),
                    sector: sector.clone(),
                    ratio: kind,
                });
            }
        }

        let below = match (asset_ratio, turnover_ratio) {
            (Some(a), Some(t)) => a < threshold.asset_ratio || t < threshold.turnover_ratio,
            _ => false,
        };
        if below {
            obs::emit_threshold_excluded(company_id, sector, "below threshold");
            gaps.push(DataGap::BelowThreshold {
                company_id: company_id.clone(),
                sector: sector.clone(),
                asset_ratio: asset_ratio.unwrap_or_default(),
                turnover_ratio: turnover_ratio.unwrap_or_default(),
            });
        }

        if undefined || below {
            excluded.insert((company_id.clone(), sector.clone()));
        }
    }

    let kept = rows
        .into_iter()
        .filter(|r| !excluded.contains(&(r.company_id.clone(), r.sector.clone())))
        .collect();

    ThresholdOutcome { kept, gaps }
}
