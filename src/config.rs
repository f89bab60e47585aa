//! Planner settings, loaded from an optional JSON file

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::jobs;
use crate::models::ActivityKind;

/// Industry time reduction per skill level, in percent.
pub const INDUSTRY_PERCENT_PER_LEVEL: f64 = 4.0;
pub const ADVANCED_INDUSTRY_PERCENT_PER_LEVEL: f64 = 3.0;
pub const REACTIONS_PERCENT_PER_LEVEL: f64 = 4.0;

/// Tunables that are not part of any single request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerSettings {
    /// ME assumed for intermediate (non-root) blueprints.
    pub intermediate_me: u8,
    /// TE assumed for intermediate (non-root) blueprints.
    pub intermediate_te: u8,
    pub root_te: u8,
    pub max_tree_depth: usize,
    pub max_job_duration_days: f64,
    pub sales_tax_percent: f64,
    /// Share of the product EIV charged for an invention attempt.
    pub invention_eiv_factor: f64,
    /// Share of the product EIV charged for a copy run.
    pub copy_eiv_factor: f64,
    pub skills: SkillLevels,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            intermediate_me: 10,
            intermediate_te: 20,
            root_te: 20,
            max_tree_depth: 20,
            max_job_duration_days: 30.0,
            sales_tax_percent: 3.6,
            invention_eiv_factor: 0.02,
            copy_eiv_factor: 0.02,
            skills: SkillLevels::default(),
        }
    }
}

impl PlannerSettings {
    /// Read settings from `path`, or return defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let settings = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(settings)
    }
}

/// Trained skill levels (0-5) that shorten job durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillLevels {
    pub industry: u8,
    pub advanced_industry: u8,
    pub reactions: u8,
}

impl Default for SkillLevels {
    fn default() -> Self {
        Self {
            industry: 5,
            advanced_industry: 5,
            reactions: 5,
        }
    }
}

impl SkillLevels {
    /// Fraction of the base duration left after skill reductions.
    pub fn time_multiplier(&self, activity: ActivityKind) -> f64 {
        match activity {
            ActivityKind::Manufacturing => jobs::skill_multiplier(&[
                (INDUSTRY_PERCENT_PER_LEVEL, self.industry),
                (ADVANCED_INDUSTRY_PERCENT_PER_LEVEL, self.advanced_industry),
            ]),
            ActivityKind::Reaction => {
                jobs::skill_multiplier(&[(REACTIONS_PERCENT_PER_LEVEL, self.reactions)])
            }
            ActivityKind::Invention | ActivityKind::Copying => 1.0,
        }
    }
}
