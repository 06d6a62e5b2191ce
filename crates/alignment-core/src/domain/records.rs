//! Input records handed to the engine by data providers.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// An exposure from the lender to one borrowing company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanRecord {
    pub loan_id: String,
    pub company_id: String,
    #[serde(default)]
    pub portfolio_id: String,
    pub outstanding_amount: f64,
    #[serde(default)]
    pub currency: String,
    pub reporting_year: i32,
    /// Free-form loan attributes. Every key is usable as a facet.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl LoanRecord {
    pub fn new(
        loan_id: impl Into<String>,
        company_id: impl Into<String>,
        outstanding_amount: f64,
        reporting_year: i32,
    ) -> Self {
        Self {
            loan_id: loan_id.into(),
            company_id: company_id.into(),
            portfolio_id: String::new(),
            outstanding_amount,
            currency: String::new(),
            reporting_year,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_portfolio(mut self, portfolio_id: impl Into<String>) -> Self {
        self.portfolio_id = portfolio_id.into();
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Production of one company for one (sector, technology, year), optionally
/// at a single plant location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyProductionRecord {
    pub company_id: String,
    pub sector: String,
    pub technology: String,
    pub year: i32,
    pub production: f64,
    /// ISO country code of the plant.
    #[serde(default)]
    pub plant_location: Option<String>,
    /// Emission intensity per unit of production, used by sda sectors.
    #[serde(default)]
    pub emission_factor: Option<f64>,
    /// Overrides the company profile's asset value for this record.
    #[serde(default)]
    pub total_assets: Option<f64>,
    /// Overrides the company profile's turnover for this record.
    #[serde(default)]
    pub turnover: Option<f64>,
}

impl CompanyProductionRecord {
    pub fn new(
        company_id: impl Into<String>,
        sector: impl Into<String>,
        technology: impl Into<String>,
        year: i32,
        production: f64,
    ) -> Self {
        Self {
            company_id: company_id.into(),
            sector: sector.into(),
            technology: technology.into(),
            year,
            production,
            plant_location: None,
            emission_factor: None,
            total_assets: None,
            turnover: None,
        }
    }

    pub fn at(mut self, plant_location: impl Into<String>) -> Self {
        self.plant_location = Some(plant_location.into());
        self
    }

    pub fn with_emission_factor(mut self, emission_factor: f64) -> Self {
        self.emission_factor = Some(emission_factor);
        self
    }
}

/// Company metadata: the denominators for production thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub company_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub domicile: Option<String>,
    #[serde(default)]
    pub total_assets: Option<f64>,
    #[serde(default)]
    pub turnover: Option<f64>,
}

impl CompanyProfile {
    pub fn new(company_id: impl Into<String>) -> Self {
        Self {
            company_id: company_id.into(),
            name: None,
            domicile: None,
            total_assets: None,
            turnover: None,
        }
    }

    pub fn with_financials(mut self, total_assets: f64, turnover: f64) -> Self {
        self.total_assets = Some(total_assets);
        self.turnover = Some(turnover);
        self
    }
}

/// One edge of the corporate ownership tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnershipLink {
    pub company_id: String,
    pub parent_company_id: String,
    /// Distance from `company_id` to `parent_company_id` (0 = itself).
    pub ownership_level: u32,
    /// `true` when the parent is a reporting parent company.
    pub is_parent: bool,
}

/// Everything the engine knows about borrowers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyDataset {
    pub production: Vec<CompanyProductionRecord>,
    #[serde(default)]
    pub profiles: Vec<CompanyProfile>,
    #[serde(default)]
    pub ownership: Vec<OwnershipLink>,
}

impl CompanyDataset {
    pub fn new(production: Vec<CompanyProductionRecord>) -> Self {
        Self {
            production,
            profiles: Vec::new(),
            ownership: Vec::new(),
        }
    }

    pub fn with_profiles(mut self, profiles: Vec<CompanyProfile>) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn with_ownership(mut self, ownership: Vec<OwnershipLink>) -> Self {
        self.ownership = ownership;
        self
    }

    /// Company ids that have at least one production record.
    pub fn producing_companies(&self) -> BTreeSet<&str> {
        self.production
            .iter()
            .map(|r| r.company_id.as_str())
            .collect()
    }

    /// Profiles indexed by company id. Later duplicates win.
    pub fn profile_index(&self) -> BTreeMap<&str, &CompanyProfile> {
        self.profiles
            .iter()
            .map(|p| (p.company_id.as_str(), p))
            .collect()
    }

    /// Map each company to the parent its loans are attributed to.
    ///
    /// Links flagged `is_parent` resolve to the closest such parent (lowest
    /// `ownership_level`). Companies without a parent link resolve to their
    /// most distant owner. Companies absent from the ownership table keep
    /// their own id.
    pub fn parent_map(&self) -> BTreeMap<String, String> {
        let mut closest_parent: BTreeMap<&str, &OwnershipLink> = BTreeMap::new();
        let mut furthest_owner: BTreeMap<&str, &OwnershipLink> = BTreeMap::new();

        for link in &self.ownership {
            if link.is_parent {
                let slot = closest_parent.entry(link.company_id.as_str()).or_insert(link);
                if link.ownership_level < slot.ownership_level {
                    *slot = link;
                }
            }
            let slot = furthest_owner.entry(link.company_id.as_str()).or_insert(link);
            if link.ownership_level > slot.ownership_level {
                *slot = link;
            }
        }

        furthest_owner
            .into_iter()
            .map(|(company, link)| {
                let parent = closest_parent.get(company).copied().unwrap_or(link);
                (company.to_string(), parent.parent_company_id.clone())
            })
            .collect()
    }
}
