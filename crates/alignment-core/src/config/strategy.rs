//! Per-sector methodology resolved once per analysis.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::SectorApproachRule;

/// Projection methodology of a sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Approach {
    /// Technology market share.
    Tms,
    /// Sector decarbonisation approach.
    Sda,
}

impl std::fmt::Display for Approach {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Approach::Tms => "tms",
            Approach::Sda => "sda",
        })
    }
}

/// Expected movement of a technology along the pathway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    BuildOut,
    PhaseOut,
    Other,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::BuildOut => "build_out",
            Direction::PhaseOut => "phase_out",
            Direction::Other => "other",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a tms target is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetLevel {
    /// Company technology production × tmsr.
    Technology,
    /// Company sector production × smsp + starting technology production.
    Sector,
}

/// Methodology-specific lookup tables.
#[derive(Debug, Clone, PartialEq)]
pub enum SectorStrategy {
    Tms {
        directions: BTreeMap<String, Direction>,
        levels: BTreeMap<String, TargetLevel>,
    },
    Sda {
        technologies: BTreeSet<String>,
    },
}

/// Everything the pipeline needs to know about one active sector.
#[derive(Debug, Clone, PartialEq)]
pub struct SectorPlan {
    pub sector: String,
    pub regional: bool,
    pub economic_weight: f64,
    pub strategy: SectorStrategy,
}

impl SectorPlan {
    /// Resolve a validated rule into lookup tables.
    pub fn resolve(sector: &str, rule: &SectorApproachRule, economic_weight: f64) -> Self {
        let strategy = match rule.approach {
            Approach::Tms => {
                let mut directions = BTreeMap::new();
                for (direction, techs) in [
                    (Direction::BuildOut, &rule.build_out),
                    (Direction::PhaseOut, &rule.phase_out),
                    (Direction::Other, &rule.other),
                ] {
                    for tech in techs {
                        directions.insert(tech.clone(), direction);
                    }
                }
                let levels = rule
                    .technology
                    .iter()
                    .map(|t| (t.clone(), TargetLevel::Technology))
                    .chain(rule.sector.iter().map(|t| (t.clone(), TargetLevel::Sector)))
                    .collect();
                SectorStrategy::Tms { directions, levels }
            }
            Approach::Sda => SectorStrategy::Sda {
                technologies: rule.other.iter().cloned().collect(),
            },
        };

        Self {
            sector: sector.to_string(),
            regional: rule.regional,
            economic_weight,
            strategy,
        }
    }

    pub fn approach(&self) -> Approach {
        match self.strategy {
            SectorStrategy::Tms { .. } => Approach::Tms,
            SectorStrategy::Sda { .. } => Approach::Sda,
        }
    }

    /// Classification of a technology, `None` when unclassified.
    pub fn direction(&self, technology: &str) -> Option<Direction> {
        match &self.strategy {
            SectorStrategy::Tms { directions, .. } => directions.get(technology).copied(),
            SectorStrategy::Sda { technologies } => {
                technologies.contains(technology).then_some(Direction::Other)
            }
        }
    }

    pub fn target_level(&self, technology: &str) -> Option<TargetLevel> {
        match &self.strategy {
            SectorStrategy::Tms { levels, .. } => levels.get(technology).copied(),
            SectorStrategy::Sda { .. } => None,
        }
    }

    /// Multiplier turning `projected − target` into an alignment delta where
    /// positive always means aligned.
    ///
    /// tms `other` technologies sit at parity: they keep their exposure in the
    /// weight but never move the score.
    pub fn alignment_sign(&self, direction: Direction) -> f64 {
        match (self.approach(), direction) {
            (Approach::Tms, Direction::BuildOut) => 1.0,
            (Approach::Tms, Direction::PhaseOut) => -1.0,
            (Approach::Tms, Direction::Other) => 0.0,
            (Approach::Sda, _) => -1.0,
        }
    }
}
