//! Scored output rows.
//!
//! Every row carries additive sums (weighted delta, weight, exposure) split
//! per sector, so any coarser grouping can be derived from the rows alone.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::{AlignmentError, Result};

/// Additive totals of one sector inside a result row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SectorContribution {
    /// Σ weight × alignment delta.
    pub weighted_delta: f64,
    /// Σ exposure × economic weight.
    pub weight: f64,
    /// Σ loan exposure attributed to the sector.
    pub exposure: f64,
    /// Economic weight applied to the sector.
    pub economic_weight: f64,
}

impl SectorContribution {
    pub fn merge(&mut self, other: &SectorContribution) {
        self.weighted_delta += other.weighted_delta;
        self.weight += other.weight;
        self.exposure += other.exposure;
        self.economic_weight = other.economic_weight;
    }
}

/// One scored group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentResult {
    /// Facet name → facet value. Empty for the portfolio total.
    pub key: BTreeMap<String, String>,
    pub sectors: BTreeMap<String, SectorContribution>,
    pub weighted_delta: f64,
    pub weight: f64,
    pub exposure: f64,
    /// Σ weighted delta / Σ weight, unclipped.
    pub alignment_delta: f64,
    /// `alignment_delta` clipped to the analysis limit.
    pub score: f64,
}

impl AlignmentResult {
    /// Build a row from per-sector sums.
    pub fn from_sectors(
        key: BTreeMap<String, String>,
        sectors: BTreeMap<String, SectorContribution>,
        limit: f64,
    ) -> Self {
        let weighted_delta: f64 = sectors.values().map(|s| s.weighted_delta).sum();
        let weight: f64 = sectors.values().map(|s| s.weight).sum();
        let exposure: f64 = sectors.values().map(|s| s.exposure).sum();
        let alignment_delta = if weight > 0.0 {
            weighted_delta / weight
        } else {
            0.0
        };
        Self {
            key,
            sectors,
            weighted_delta,
            weight,
            exposure,
            alignment_delta,
            score: alignment_delta.clamp(-limit, limit),
        }
    }

    pub fn value(&self, facet: &str) -> Option<&str> {
        self.key.get(facet).map(String::as_str)
    }

    /// Share of each sector in the row's total weight. Sums to one over the
    /// sectors present whenever the row carries any weight.
    pub fn sector_shares(&self) -> BTreeMap<String, f64> {
        if self.weight <= 0.0 {
            return BTreeMap::new();
        }
        self.sectors
            .iter()
            .map(|(sector, c)| (sector.clone(), c.weight / self.weight))
            .collect()
    }
}

/// The engine's output: rows at one grouping level plus the parameters
/// needed to regroup them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentResultSet {
    /// Facets the rows are keyed by, in request order.
    pub facets: Vec<String>,
    pub start_year: i32,
    pub terminal_year: i32,
    pub limit: f64,
    pub rows: Vec<AlignmentResult>,
}

impl AlignmentResultSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AlignmentResult> {
        self.rows.iter()
    }

    pub fn has_facet(&self, facet: &str) -> bool {
        self.facets.iter().any(|f| f == facet)
    }

    /// Row whose facet values equal `values`, given in facet order.
    pub fn get(&self, values: &[&str]) -> Option<&AlignmentResult> {
        if values.len() != self.facets.len() {
            return None;
        }
        self.rows.iter().find(|row| {
            self.facets
                .iter()
                .zip(values)
                .all(|(facet, value)| row.value(facet) == Some(*value))
        })
    }

    /// The sector carrying the largest exposure for every company.
    pub fn main_sectors(&self) -> Result<BTreeMap<String, String>> {
        if !self.has_facet("company_id") {
            return Err(AlignmentError::UnknownFacet("company_id".to_string()));
        }

        let mut exposure: BTreeMap<&str, BTreeMap<&str, f64>> = BTreeMap::new();
        for row in &self.rows {
            let Some(company) = row.value("company_id") else {
                continue;
            };
            let per_sector = exposure.entry(company).or_default();
            for (sector, c) in &row.sectors {
                *per_sector.entry(sector.as_str()).or_insert(0.0) += c.exposure;
            }
        }

        Ok(exposure
            .into_iter()
            .filter_map(|(company, sectors)| {
                sectors
                    .into_iter()
                    .max_by(|a, b| a.1.total_cmp(&b.1).then_with(|| b.0.cmp(a.0)))
                    .map(|(sector, _)| (company.to_string(), sector.to_string()))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contribution(weighted_delta: f64, weight: f64, exposure: f64) -> SectorContribution {
        SectorContribution {
            weighted_delta,
            weight,
            exposure,
            economic_weight: 1.0,
        }
    }

    fn key(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn score_is_clipped_but_delta_is_not() {
        let sectors = BTreeMap::from([("power".to_string(), contribution(10.0, 2.0, 2.0))]);
        let row = AlignmentResult::from_sectors(BTreeMap::new(), sectors, 3.0);
        assert_eq!(row.alignment_delta, 5.0);
        assert_eq!(row.score, 3.0);
    }

    #[test]
    fn zero_weight_row_scores_zero() {
        let sectors = BTreeMap::from([("power".to_string(), contribution(0.0, 0.0, 0.0))]);
        let row = AlignmentResult::from_sectors(BTreeMap::new(), sectors, 3.0);
        assert_eq!(row.score, 0.0);
        assert!(row.sector_shares().is_empty());
    }

    #[test]
    fn sector_shares_sum_to_one() {
        let sectors = BTreeMap::from([
            ("power".to_string(), contribution(1.0, 3.0, 1.0)),
            ("automotive".to_string(), contribution(-1.0, 1.0, 1.0)),
        ]);
        let row = AlignmentResult::from_sectors(BTreeMap::new(), sectors, 3.0);
        let shares = row.sector_shares();
        let total: f64 = shares.values().sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!((shares["power"] - 0.75).abs() < 1e-12);
    }

    #[test]
    fn main_sectors_picks_largest_exposure() {
        let set = AlignmentResultSet {
            facets: vec!["company_id".to_string()],
            start_year: 2023,
            terminal_year: 2028,
            limit: 3.0,
            rows: vec![AlignmentResult::from_sectors(
                key(&[("company_id", "c1")]),
                BTreeMap::from([
                    ("power".to_string(), contribution(0.0, 1.0, 40.0)),
                    ("coal".to_string(), contribution(0.0, 1.0, 60.0)),
                ]),
                3.0,
            )],
        };
        let main = set.main_sectors().expect("company facet present");
        assert_eq!(main["c1"], "coal");
        assert!(set.get(&["c1"]).is_some());
        assert!(set.get(&["c2"]).is_none());
    }

    #[test]
    fn main_sectors_requires_company_facet() {
        let set = AlignmentResultSet {
            facets: vec!["sector".to_string()],
            start_year: 2023,
            terminal_year: 2028,
            limit: 3.0,
            rows: Vec::new(),
        };
        assert!(matches!(
            set.main_sectors(),
            Err(AlignmentError::UnknownFacet(_))
        ));
    }
}
