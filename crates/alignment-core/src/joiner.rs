//! Join the loan book to company production data.
//!
//! Production of inactive or unconfigured sectors is dropped. Companies with
//! production but no loans are dropped. Loans to companies without any
//! production data are reported as [`DataGap::MissingProduction`].

use std::collections::{BTreeMap, BTreeSet};

use crate::config::{Direction, SectorPlan};
use crate::domain::error::ConfigurationError;
use crate::domain::{CompanyDataset, DataGap, LoanRecord};
use crate::obs;

/// A production record of an active sector, classified and enriched with
/// the company's financials.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductionRow {
    pub company_id: String,
    pub sector: String,
    pub technology: String,
    pub direction: Direction,
    pub year: i32,
    pub production: f64,
    pub plant_location: Option<String>,
    pub emission_factor: Option<f64>,
    pub total_assets: Option<f64>,
    pub turnover: Option<f64>,
}

/// Loans and production restricted to companies present in both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinedFrame {
    pub loans: Vec<LoanRecord>,
    pub production: Vec<ProductionRow>,
    pub gaps: Vec<DataGap>,
}

/// Re-attribute loans to parent companies and merge loans that collapse onto
/// the same (portfolio, loan, company) key.
pub fn roll_up_to_parents(loans: &[LoanRecord], companies: &CompanyDataset) -> Vec<LoanRecord> {
    let parents = companies.parent_map();
    let mut merged: Vec<LoanRecord> = Vec::with_capacity(loans.len());
    let mut index: BTreeMap<(String, String, String), usize> = BTreeMap::new();

    for loan in loans {
        let mut loan = loan.clone();
        if let Some(parent) = parents.get(&loan.company_id) {
            loan.company_id = parent.clone();
        }
        let key = (
            loan.portfolio_id.clone(),
            loan.loan_id.clone(),
            loan.company_id.clone(),
        );
        match index.get(&key) {
            Some(&i) => merged[i].outstanding_amount += loan.outstanding_amount,
            None => {
                index.insert(key, merged.len());
                merged.push(loan);
            }
        }
    }
    merged
}

/// Join loans with production for the active sectors in `plans`.
pub fn join(
    plans: &[SectorPlan],
    loans: &[LoanRecord],
    companies: &CompanyDataset,
    only_parents: bool,
) -> Result<JoinedFrame, ConfigurationError> {
    let loans = if only_parents {
        roll_up_to_parents(loans, companies)
    } else {
        loans.to_vec()
    };

    let plans: BTreeMap<&str, &SectorPlan> = plans.iter().map(|p| (p.sector.as_str(), p)).collect();
    let profiles = companies.profile_index();
    let borrowers: BTreeSet<&str> = loans.iter().map(|l| l.company_id.as_str()).collect();

    let mut production = Vec::new();
    let mut active_producers: BTreeSet<&str> = BTreeSet::new();
    for record in &companies.production {
        let Some(plan) = plans.get(record.sector.as_str()) else {
            continue;
        };
        let direction = plan.direction(&record.technology).ok_or_else(|| {
            ConfigurationError::UnclassifiedTechnology {
                sector: record.sector.clone(),
                technology: record.technology.clone(),
            }
        })?;
        active_producers.insert(record.company_id.as_str());
        if !borrowers.contains(record.company_id.as_str()) {
            continue;
        }

        let profile = profiles.get(record.company_id.as_str());
        production.push(ProductionRow {
            company_id: record.company_id.clone(),
            sector: record.sector.clone(),
            technology: record.technology.clone(),
            direction,
            year: record.year,
            production: record.production,
            plant_location: record.plant_location.clone(),
            emission_factor: record.emission_factor,
            total_assets: record
                .total_assets
                .or_else(|| profile.and_then(|p| p.total_assets)),
            turnover: record.turnover.or_else(|| profile.and_then(|p| p.turnover)),
        });
    }

    let producing = companies.producing_companies();
    let mut unmatched: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for loan in &loans {
        if !producing.contains(loan.company_id.as_str()) {
            unmatched
                .entry(loan.company_id.as_str())
                .or_default()
                .push(loan.loan_id.clone());
        }
    }

    let gaps: Vec<DataGap> = unmatched
        .into_iter()
        .map(|(company_id, loan_ids)| {
            obs::emit_loan_unmatched(company_id, loan_ids.len());
            DataGap::MissingProduction {
                company_id: company_id.to_string(),
                loan_ids,
            }
        })
        .collect();

    let kept_loans = loans
        .iter()
        .filter(|l| active_producers.contains(l.company_id.as_str()))
        .cloned()
        .collect();

    Ok(JoinedFrame {
        loans: kept_loans,
        production,
        gaps,
    })
}
