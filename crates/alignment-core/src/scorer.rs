//! Loan exposure splitting and per-point alignment deltas.
//!
//! A loan's outstanding amount is divided first across the sectors of its
//! company (by production share over all years), then across technologies
//! and regions within each sector-year (by the magnitude of projected plus
//! target values).

use std::collections::BTreeMap;

use crate::config::SectorPlan;
use crate::domain::LoanRecord;
use crate::joiner::ProductionRow;
use crate::projector::ProjectedPoint;

/// Keeps a technology with zero projection and zero target from vanishing
/// out of the split.
const SPLIT_EPSILON: f64 = 1e-4;

/// One loan's share of one projected point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contribution<'a> {
    pub loan: &'a LoanRecord,
    pub point: &'a ProjectedPoint,
    /// Part of the loan's outstanding amount attributed to the point.
    pub exposure: f64,
    pub economic_weight: f64,
    /// Signed, scale-normalised deviation; positive means aligned.
    pub alignment_delta: f64,
}

impl Contribution<'_> {
    pub fn weight(&self) -> f64 {
        self.exposure * self.economic_weight
    }

    pub fn weighted_delta(&self) -> f64 {
        self.weight() * self.alignment_delta
    }
}

/// Share of each (company, sector) in the company's production over all
/// years. A company with no recorded production splits evenly.
pub fn sector_shares(rows: &[ProductionRow]) -> BTreeMap<(String, String), f64> {
    let mut totals: BTreeMap<&str, BTreeMap<&str, f64>> = BTreeMap::new();
    for row in rows {
        *totals
            .entry(row.company_id.as_str())
            .or_default()
            .entry(row.sector.as_str())
            .or_insert(0.0) += row.production;
    }

    let mut shares = BTreeMap::new();
    for (company, sectors) in totals {
        let total: f64 = sectors.values().sum();
        let count = sectors.len() as f64;
        for (sector, production) in sectors {
            let share = if total > 0.0 { production / total } else { 1.0 / count };
            shares.insert((company.to_string(), sector.to_string()), share);
        }
    }
    shares
}

/// Σ terminal-year target of each company-sector, falling back to the
/// terminal-year projection when targets sum to zero or less.
fn scales(points: &[ProjectedPoint], terminal_year: i32) -> BTreeMap<(&str, &str), f64> {
    let mut sums: BTreeMap<(&str, &str), (f64, f64)> = BTreeMap::new();
    for p in points.iter().filter(|p| p.year == terminal_year) {
        let entry = sums
            .entry((p.company_id.as_str(), p.sector.as_str()))
            .or_insert((0.0, 0.0));
        entry.0 += p.target;
        entry.1 += p.projected;
    }
    sums.into_iter()
        .filter_map(|(key, (target, projected))| {
            let scale = if target > 0.0 { target } else { projected };
            (scale > 0.0).then_some((key, scale))
        })
        .collect()
}

fn technology_shares(points: &[ProjectedPoint]) -> Vec<f64> {
    let magnitude = |p: &ProjectedPoint| p.target + p.projected + SPLIT_EPSILON;
    let mut totals: BTreeMap<(&str, &str, i32), f64> = BTreeMap::new();
    for p in points {
        *totals
            .entry((p.company_id.as_str(), p.sector.as_str(), p.year))
            .or_insert(0.0) += magnitude(p);
    }
    points
        .iter()
        .map(|p| {
            let total = totals
                .get(&(p.company_id.as_str(), p.sector.as_str(), p.year))
                .copied()
                .unwrap_or(0.0);
            if total != 0.0 {
                magnitude(p) / total
            } else {
                0.0
            }
        })
        .collect()
}

/// Attribute every loan to the projected points of its company.
pub fn score<'a>(
    points: &'a [ProjectedPoint],
    loans: &'a [LoanRecord],
    shares: &BTreeMap<(String, String), f64>,
    plans: &[SectorPlan],
    terminal_year: i32,
) -> Vec<Contribution<'a>> {
    let plans: BTreeMap<&str, &SectorPlan> = plans.iter().map(|p| (p.sector.as_str(), p)).collect();
    let scale_by_pair = scales(points, terminal_year);
    let tech_shares = technology_shares(points);

    let mut by_company: BTreeMap<&str, Vec<(&ProjectedPoint, f64)>> = BTreeMap::new();
    for (point, tech_share) in points.iter().zip(tech_shares) {
        by_company
            .entry(point.company_id.as_str())
            .or_default()
            .push((point, tech_share));
    }

    let mut contributions = Vec::new();
    for loan in loans {
        let Some(company_points) = by_company.get(loan.company_id.as_str()) else {
            continue;
        };
        for &(point, tech_share) in company_points {
            let Some(plan) = plans.get(point.sector.as_str()) else {
                continue;
            };
            let sector_share = shares
                .get(&(point.company_id.clone(), point.sector.clone()))
                .copied()
                .unwrap_or(0.0);
            let alignment_delta = scale_by_pair
                .get(&(point.company_id.as_str(), point.sector.as_str()))
                .map(|scale| plan.alignment_sign(point.direction) * (point.projected - point.target) / scale)
                .unwrap_or(0.0);
            contributions.push(Contribution {
                loan,
                point,
                exposure: loan.outstanding_amount * sector_share * tech_share,
                economic_weight: plan.economic_weight,
                alignment_delta,
            });
        }
    }
    contributions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigStore, Direction, SectorApproachRule};

    fn plans() -> Vec<SectorPlan> {
        ConfigStore::default()
            .with_sector(
                "power",
                SectorApproachRule::tms()
                    .with_technology_level(Direction::BuildOut, &["renewablescap"])
                    .with_sector_level(Direction::PhaseOut, &["coalcap"]),
                1.0,
            )
            .with_sector(
                "cement",
                SectorApproachRule::sda().with_technologies(Direction::Other, &["grinding"]),
                2.0,
            )
            .sector_plans()
            .expect("valid plans")
    }

    fn production(company: &str, sector: &str, production: f64) -> ProductionRow {
        ProductionRow {
            company_id: company.to_string(),
            sector: sector.to_string(),
            technology: "t".to_string(),
            direction: Direction::Other,
            year: 2023,
            production,
            plant_location: None,
            emission_factor: None,
            total_assets: None,
            turnover: None,
        }
    }

    fn point(technology: &str, direction: Direction, year: i32, projected: f64, target: f64) -> ProjectedPoint {
        ProjectedPoint {
            company_id: "c1".to_string(),
            sector: "power".to_string(),
            technology: technology.to_string(),
            region: "global".to_string(),
            direction,
            year,
            projected,
            target,
        }
    }

    #[test]
    fn sector_shares_follow_production() {
        let rows = [
            production("c1", "power", 30.0),
            production("c1", "cement", 10.0),
            production("c2", "power", 0.0),
            production("c2", "cement", 0.0),
        ];
        let shares = sector_shares(&rows);
        assert_eq!(shares[&("c1".to_string(), "power".to_string())], 0.75);
        assert_eq!(shares[&("c1".to_string(), "cement".to_string())], 0.25);
        assert_eq!(shares[&("c2".to_string(), "power".to_string())], 0.5);
    }

    #[test]
    fn build_out_above_target_is_positive() {
        let points = [point("renewablescap", Direction::BuildOut, 2025, 120.0, 100.0)];
        let loans = [LoanRecord::new("l1", "c1", 1_000.0, 2023)];
        let shares = BTreeMap::from([(("c1".to_string(), "power".to_string()), 1.0)]);
        let contributions = score(&points, &loans, &shares, &plans(), 2025);

        assert_eq!(contributions.len(), 1);
        assert!((contributions[0].alignment_delta - 0.2).abs() < 1e-12);
        assert!((contributions[0].exposure - 1_000.0).abs() < 1e-9);
    }

    #[test]
    fn phase_out_above_target_is_negative() {
        let points = [point("coalcap", Direction::PhaseOut, 2025, 120.0, 100.0)];
        let loans = [LoanRecord::new("l1", "c1", 1_000.0, 2023)];
        let shares = BTreeMap::from([(("c1".to_string(), "power".to_string()), 1.0)]);
        let contributions = score(&points, &loans, &shares, &plans(), 2025);
        assert!((contributions[0].alignment_delta + 0.2).abs() < 1e-12);
    }

    #[test]
    fn exposure_splits_across_technologies() {
        let points = [
            point("renewablescap", Direction::BuildOut, 2025, 30.0, 30.0),
            point("coalcap", Direction::PhaseOut, 2025, 10.0, 10.0),
        ];
        let loans = [LoanRecord::new("l1", "c1", 800.0, 2023)];
        let shares = BTreeMap::from([(("c1".to_string(), "power".to_string()), 1.0)]);
        let contributions = score(&points, &loans, &shares, &plans(), 2025);

        let total: f64 = contributions.iter().map(|c| c.exposure).sum();
        assert!((total - 800.0).abs() < 1e-9);
        assert!(contributions[0].exposure > contributions[1].exposure);
        assert!(contributions.iter().all(|c| c.alignment_delta == 0.0));
    }

    #[test]
    fn zero_scale_gives_zero_delta() {
        let points = [point("coalcap", Direction::PhaseOut, 2025, 0.0, 0.0)];
        let loans = [LoanRecord::new("l1", "c1", 100.0, 2023)];
        let shares = BTreeMap::from([(("c1".to_string(), "power".to_string()), 1.0)]);
        let contributions = score(&points, &loans, &shares, &plans(), 2025);
        assert_eq!(contributions[0].alignment_delta, 0.0);
        assert_eq!(contributions[0].weight(), 100.0);
    }
}
