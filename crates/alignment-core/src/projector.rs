//! Trajectory projection against scenario targets.
//!
//! Each active sector is dispatched on its [`SectorStrategy`]:
//!
//! * **tms**: production is summed per (company, technology, region). A
//!   technology-level target is `P_tech(start) × tmsr(y)`; a sector-level
//!   target is `P_sector(start) × smsp(y) + P_tech(start)`.
//! * **sda**: production is summed per (company, region) and paired with its
//!   production-weighted emission intensity. Both the projection and the
//!   target are expressed in emissions: `intensity × production` and
//!   `scenario_intensity(y) × production`.
//!
//! Years without a production record carry the latest earlier value
//! forward; years before the first record count as zero production.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::{Direction, SectorPlan, SectorStrategy, TargetLevel};
use crate::domain::{
    DataGap, RegionMembership, ScenarioBundle, ScenarioTarget, TargetValue, GLOBAL_REGION,
};
use crate::joiner::ProductionRow;
use crate::obs;
use crate::region::RegionResolver;

/// A company's projected value paired with its target for one year.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedPoint {
    pub company_id: String,
    pub sector: String,
    /// Technology name; the sector name for sda sectors.
    pub technology: String,
    pub region: String,
    pub direction: Direction,
    pub year: i32,
    pub projected: f64,
    pub target: f64,
}

/// Scenario and horizon of one analysis.
#[derive(Debug, Clone, Copy)]
pub struct ProjectionContext<'a> {
    pub bundle: &'a ScenarioBundle,
    pub pathway: &'a str,
    pub start_year: i32,
    pub terminal_year: i32,
    pub use_region_file: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    pub points: Vec<ProjectedPoint>,
    pub gaps: Vec<DataGap>,
}

#[derive(Default)]
struct SectorProjection {
    points: Vec<ProjectedPoint>,
    gaps: Vec<DataGap>,
}

type TargetKey<'a> = (Option<&'a str>, &'a str, i32);

struct TargetIndex<'a> {
    values: BTreeMap<TargetKey<'a>, TargetValue>,
}

impl<'a> TargetIndex<'a> {
    fn new(targets: &[&'a ScenarioTarget]) -> Self {
        let values = targets
            .iter()
            .map(|t| ((t.technology.as_deref(), t.region.as_str(), t.year), t.value))
            .collect();
        Self { values }
    }

    fn market_share(&self, technology: &str, region: &str, year: i32) -> Option<(f64, f64)> {
        match self.values.get(&(Some(technology), region, year))? {
            TargetValue::MarketShare { tmsr, smsp } => Some((*tmsr, *smsp)),
            TargetValue::EmissionIntensity { .. } => None,
        }
    }

    fn intensity(&self, region: &str, year: i32) -> Option<f64> {
        match self.values.get(&(None, region, year))? {
            TargetValue::EmissionIntensity { emission_factor } => Some(*emission_factor),
            TargetValue::MarketShare { .. } => None,
        }
    }
}

/// Plant-location resolution per target technology. A region only counts
/// for a technology when it publishes targets for it, so a plant in a
/// region without them falls back to a containing region or to `global`.
#[derive(Debug, Default)]
struct TechnologyRegions {
    by_technology: BTreeMap<String, RegionResolver>,
    intensity: Option<RegionResolver>,
}

impl TechnologyRegions {
    fn build(memberships: &[RegionMembership], targets: &[&ScenarioTarget]) -> Self {
        let mut technology_regions: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        let mut intensity_regions: BTreeSet<&str> = BTreeSet::new();
        for t in targets {
            match t.technology.as_deref() {
                Some(technology) => {
                    technology_regions
                        .entry(technology)
                        .or_default()
                        .insert(t.region.as_str());
                }
                None => {
                    intensity_regions.insert(t.region.as_str());
                }
            }
        }

        let by_technology = technology_regions
            .into_iter()
            .map(|(technology, regions)| {
                (technology.to_string(), RegionResolver::build(memberships, regions))
            })
            .collect();
        let intensity = (!intensity_regions.is_empty())
            .then(|| RegionResolver::build(memberships, intensity_regions));
        Self {
            by_technology,
            intensity,
        }
    }

    fn technology(&self, technology: &str, plant_location: Option<&str>) -> &str {
        self.by_technology
            .get(technology)
            .map_or(GLOBAL_REGION, |r| r.resolve(plant_location))
    }

    fn intensity(&self, plant_location: Option<&str>) -> &str {
        self.intensity
            .as_ref()
            .map_or(GLOBAL_REGION, |r| r.resolve(plant_location))
    }
}

/// Latest value at or before `year`, zero before the first record.
fn value_at(series: &BTreeMap<i32, f64>, year: i32) -> f64 {
    series
        .range(..=year)
        .next_back()
        .map(|(_, v)| *v)
        .unwrap_or(0.0)
}

/// Project every active sector present in `rows`.
pub fn project(plans: &[SectorPlan], rows: &[ProductionRow], ctx: &ProjectionContext<'_>) -> Projection {
    let mut projection = Projection::default();

    for plan in plans {
        let sector_rows: Vec<&ProductionRow> =
            rows.iter().filter(|r| r.sector == plan.sector).collect();
        if sector_rows.is_empty() {
            continue;
        }

        let targets: Vec<&ScenarioTarget> =
            ctx.bundle.sector_targets(ctx.pathway, &plan.sector).collect();
        if targets.is_empty() {
            obs::emit_sector_excluded(&plan.sector, "no scenario targets for pathway");
            projection.gaps.push(DataGap::ScenarioSectorUnavailable {
                sector: plan.sector.clone(),
            });
            continue;
        }

        let regions = if plan.regional && ctx.use_region_file {
            TechnologyRegions::build(&ctx.bundle.regions, &targets)
        } else {
            TechnologyRegions::default()
        };
        let index = TargetIndex::new(&targets);

        let result = match &plan.strategy {
            SectorStrategy::Tms { .. } => project_tms(plan, &sector_rows, &regions, &index, ctx),
            SectorStrategy::Sda { .. } => project_sda(plan, &sector_rows, &regions, &index, ctx),
        };
        match result {
            Ok(sector) => {
                projection.points.extend(sector.points);
                projection.gaps.extend(sector.gaps);
            }
            Err(missing) => {
                obs::emit_sector_excluded(&plan.sector, "terminal-year target missing");
                projection.gaps.push(missing);
            }
        }
    }

    projection
}

fn project_tms(
    plan: &SectorPlan,
    rows: &[&ProductionRow],
    regions: &TechnologyRegions,
    index: &TargetIndex<'_>,
    ctx: &ProjectionContext<'_>,
) -> Result<SectorProjection, DataGap> {
    let mut series: BTreeMap<(&str, &str, &str), BTreeMap<i32, f64>> = BTreeMap::new();
    let mut directions: BTreeMap<&str, Direction> = BTreeMap::new();
    for row in rows {
        let region = regions.technology(&row.technology, row.plant_location.as_deref());
        *series
            .entry((row.company_id.as_str(), row.technology.as_str(), region))
            .or_default()
            .entry(row.year)
            .or_insert(0.0) += row.production;
        directions.insert(row.technology.as_str(), row.direction);
    }

    let mut sector_start: BTreeMap<(&str, &str), f64> = BTreeMap::new();
    for (&(company, _, region), values) in &series {
        *sector_start.entry((company, region)).or_insert(0.0) += value_at(values, ctx.start_year);
    }

    let mut out = SectorProjection::default();
    for (&(company, technology, region), values) in &series {
        let (Some(direction), Some(level)) = (
            directions.get(technology).copied(),
            plan.target_level(technology),
        ) else {
            continue;
        };
        let tech_start = value_at(values, ctx.start_year);
        let total_start = sector_start
            .get(&(company, region))
            .copied()
            .unwrap_or(0.0);

        for year in ctx.start_year..=ctx.terminal_year {
            let Some((tmsr, smsp)) = index.market_share(technology, region, year) else {
                if year == ctx.terminal_year {
                    return Err(DataGap::ScenarioTargetMissing {
                        sector: plan.sector.clone(),
                        technology: technology.to_string(),
                        region: region.to_string(),
                        year,
                    });
                }
                continue;
            };
            let target = match level {
                TargetLevel::Technology => tech_start * tmsr,
                TargetLevel::Sector => total_start * smsp + tech_start,
            };
            out.points.push(ProjectedPoint {
                company_id: company.to_string(),
                sector: plan.sector.clone(),
                technology: technology.to_string(),
                region: region.to_string(),
                direction,
                year,
                projected: value_at(values, year),
                target,
            });
        }
    }
    Ok(out)
}

#[derive(Default)]
struct IntensitySeries {
    production: BTreeMap<i32, f64>,
    emissions: BTreeMap<i32, f64>,
    covered: BTreeMap<i32, f64>,
}

impl IntensitySeries {
    fn has_emission_data(&self) -> bool {
        self.covered.values().any(|c| *c > 0.0)
    }

    /// Production-weighted intensity at `year`, carried from the nearest
    /// covered year (earlier first, then later).
    fn intensity_at(&self, year: i32) -> f64 {
        let covered = |(_, c): &(&i32, &f64)| **c > 0.0;
        self.covered
            .range(..=year)
            .rev()
            .find(covered)
            .or_else(|| self.covered.range(year + 1..).find(covered))
            .map(|(y, c)| self.emissions.get(y).copied().unwrap_or(0.0) / c)
            .unwrap_or(0.0)
    }
}

fn project_sda(
    plan: &SectorPlan,
    rows: &[&ProductionRow],
    regions: &TechnologyRegions,
    index: &TargetIndex<'_>,
    ctx: &ProjectionContext<'_>,
) -> Result<SectorProjection, DataGap> {
    let mut series: BTreeMap<(&str, &str), IntensitySeries> = BTreeMap::new();
    for row in rows {
        let region = regions.intensity(row.plant_location.as_deref());
        let entry = series
            .entry((row.company_id.as_str(), region))
            .or_default();
        *entry.production.entry(row.year).or_insert(0.0) += row.production;
        if let Some(ef) = row.emission_factor {
            *entry.emissions.entry(row.year).or_insert(0.0) += ef * row.production;
            *entry.covered.entry(row.year).or_insert(0.0) += row.production;
        }
    }

    let mut out = SectorProjection::default();
    let mut reported: BTreeSet<&str> = BTreeSet::new();
    for (&(company, region), values) in &series {
        if !values.has_emission_data() {
            if reported.insert(company) {
                out.gaps.push(DataGap::MissingEmissionFactor {
                    company_id: company.to_string(),
                    sector: plan.sector.clone(),
                });
            }
            continue;
        }

        for year in ctx.start_year..=ctx.terminal_year {
            let Some(scenario_intensity) = index.intensity(region, year) else {
                if year == ctx.terminal_year {
                    return Err(DataGap::ScenarioTargetMissing {
                        sector: plan.sector.clone(),
                        technology: plan.sector.clone(),
                        region: region.to_string(),
                        year,
                    });
                }
                continue;
            };
            let production = value_at(&values.production, year);
            out.points.push(ProjectedPoint {
                company_id: company.to_string(),
                sector: plan.sector.clone(),
                technology: plan.sector.clone(),
                region: region.to_string(),
                direction: Direction::Other,
                year,
                projected: values.intensity_at(year) * production,
                target: scenario_intensity * production,
            });
        }
    }
    Ok(out)
}
