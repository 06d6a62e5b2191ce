//! Grouping of scored contributions into result rows.
//!
//! Facets are either built-in columns of the joined data or free-form loan
//! attribute keys. Rows keep per-sector additive sums so a result set can be
//! regrouped onto any subset of its facets without recomputation.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{
    AlignmentError, AlignmentResult, AlignmentResultSet, LoanRecord, Result, SectorContribution,
};
use crate::obs;
use crate::scorer::Contribution;

/// Facets every analysis can group by.
pub const BUILTIN_FACETS: &[&str] = &[
    "portfolio_id",
    "company_id",
    "loan_id",
    "sector",
    "technology",
    "direction",
    "region",
    "year",
];

/// Facet value for loans that do not carry a requested attribute.
pub const UNASSIGNED: &str = "unassigned";

/// Deduplicate `facets`, preserving order, and reject names that are
/// neither built in nor an attribute of any loan.
pub fn validate_facets(facets: &[String], loans: &[LoanRecord]) -> Result<Vec<String>> {
    let attributes: BTreeSet<&str> = loans
        .iter()
        .flat_map(|l| l.attributes.keys().map(String::as_str))
        .collect();

    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(facets.len());
    for facet in facets {
        if !BUILTIN_FACETS.contains(&facet.as_str()) && !attributes.contains(facet.as_str()) {
            return Err(AlignmentError::UnknownFacet(facet.clone()));
        }
        if seen.insert(facet.as_str()) {
            out.push(facet.clone());
        }
    }
    Ok(out)
}

fn facet_value(c: &Contribution<'_>, facet: &str) -> String {
    match facet {
        "portfolio_id" => c.loan.portfolio_id.clone(),
        "company_id" => c.loan.company_id.clone(),
        "loan_id" => c.loan.loan_id.clone(),
        "sector" => c.point.sector.clone(),
        "technology" => c.point.technology.clone(),
        "direction" => c.point.direction.as_str().to_string(),
        "region" => c.point.region.clone(),
        "year" => c.point.year.to_string(),
        attribute => c
            .loan
            .attributes
            .get(attribute)
            .cloned()
            .unwrap_or_else(|| UNASSIGNED.to_string()),
    }
}

fn rows_from_groups(
    facets: &[String],
    groups: BTreeMap<Vec<String>, BTreeMap<String, SectorContribution>>,
    limit: f64,
) -> Vec<AlignmentResult> {
    groups
        .into_iter()
        .map(|(values, sectors)| {
            let key = facets.iter().cloned().zip(values).collect();
            AlignmentResult::from_sectors(key, sectors, limit)
        })
        .collect()
}

/// Group contributions by `facets`. Only terminal-year contributions count
/// unless `year` is itself a facet.
pub fn aggregate(
    contributions: &[Contribution<'_>],
    facets: &[String],
    start_year: i32,
    terminal_year: i32,
    limit: f64,
) -> AlignmentResultSet {
    let by_year = facets.iter().any(|f| f == "year");

    let mut groups: BTreeMap<Vec<String>, BTreeMap<String, SectorContribution>> = BTreeMap::new();
    for c in contributions
        .iter()
        .filter(|c| by_year || c.point.year == terminal_year)
    {
        let values: Vec<String> = facets.iter().map(|f| facet_value(c, f)).collect();
        let sector = groups
            .entry(values)
            .or_default()
            .entry(c.point.sector.clone())
            .or_default();
        sector.merge(&SectorContribution {
            weighted_delta: c.weighted_delta(),
            weight: c.weight(),
            exposure: c.exposure,
            economic_weight: c.economic_weight,
        });
    }

    AlignmentResultSet {
        facets: facets.to_vec(),
        start_year,
        terminal_year,
        limit,
        rows: rows_from_groups(facets, groups, limit),
    }
}

/// Collapse a result set onto a subset of its facets.
///
/// Dropping `year` keeps only the terminal-year rows, so the regrouped set
/// equals a fresh analysis with the coarser facets.
pub fn regroup(results: &AlignmentResultSet, facets: &[String]) -> Result<AlignmentResultSet> {
    let mut seen = BTreeSet::new();
    let mut target = Vec::with_capacity(facets.len());
    for facet in facets {
        if !results.has_facet(facet) {
            return Err(AlignmentError::UnknownFacet(facet.clone()));
        }
        if seen.insert(facet.as_str()) {
            target.push(facet.clone());
        }
    }

    let drop_years = results.has_facet("year") && !target.iter().any(|f| f == "year");
    let terminal = results.terminal_year.to_string();

    let mut groups: BTreeMap<Vec<String>, BTreeMap<String, SectorContribution>> = BTreeMap::new();
    for row in results.iter() {
        if drop_years && row.value("year") != Some(terminal.as_str()) {
            continue;
        }
        let values: Vec<String> = target
            .iter()
            .map(|f| row.value(f).unwrap_or(UNASSIGNED).to_string())
            .collect();
        let sectors = groups.entry(values).or_default();
        for (sector, contribution) in &row.sectors {
            sectors.entry(sector.clone()).or_default().merge(contribution);
        }
    }

    let rows = rows_from_groups(&target, groups, results.limit);
    obs::emit_results_regrouped(&target, rows.len());

    Ok(AlignmentResultSet {
        facets: target,
        start_year: results.start_year,
        terminal_year: results.terminal_year,
        limit: results.limit,
        rows,
    })
}
