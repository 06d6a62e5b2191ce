//! Plant-country to scenario-region resolution.
//!
//! A country belongs to the smallest region (fewest member countries) that
//! contains it among the candidate regions, those carrying targets. Countries
//! outside every candidate region resolve to [`GLOBAL_REGION`].

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{RegionMembership, GLOBAL_REGION};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionResolver {
    assignment: BTreeMap<String, String>,
}

impl RegionResolver {
    /// Build a resolver from region memberships restricted to `candidates`.
    pub fn build<'a>(
        memberships: &[RegionMembership],
        candidates: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let candidates: BTreeSet<&str> = candidates.into_iter().collect();

        let mut members: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
        for m in memberships {
            if candidates.contains(m.region.as_str()) {
                members
                    .entry(m.region.as_str())
                    .or_default()
                    .insert(m.iso.to_ascii_uppercase());
            }
        }

        let mut ordered: Vec<(&str, BTreeSet<String>)> = members.into_iter().collect();
        ordered.sort_by(|a, b| a.1.len().cmp(&b.1.len()).then_with(|| a.0.cmp(b.0)));

        let mut assignment = BTreeMap::new();
        for (region, isos) in ordered {
            for iso in isos {
                assignment.entry(iso).or_insert_with(|| region.to_string());
            }
        }

        Self { assignment }
    }

    pub fn resolve(&self, plant_location: Option<&str>) -> &str {
        plant_location
            .and_then(|iso| self.assignment.get(&iso.to_ascii_uppercase()))
            .map(String::as_str)
            .unwrap_or(GLOBAL_REGION)
    }
}
