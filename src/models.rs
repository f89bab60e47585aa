//! Data models for recipes, structures, production trees and trade records

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Integer identifier of an item type (products, materials, blueprints, decryptors).
pub type TypeId = i64;

/// What a blueprint activity does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Manufacturing,
    Reaction,
    Invention,
    Copying,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Manufacturing => "manufacturing",
            ActivityKind::Reaction => "reaction",
            ActivityKind::Invention => "invention",
            ActivityKind::Copying => "copying",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "manufacturing" => Ok(ActivityKind::Manufacturing),
            "reaction" | "reactions" => Ok(ActivityKind::Reaction),
            "invention" => Ok(ActivityKind::Invention),
            "copying" => Ok(ActivityKind::Copying),
            other => Err(format!("unknown activity kind '{other}'")),
        }
    }
}

/// Immutable reference data describing one blueprint activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlueprintRecipe {
    pub blueprint_id: TypeId,
    pub product_id: TypeId,
    pub activity: ActivityKind,
    pub output_per_run: u64,
    /// Base duration of one run, before TE, structure and skill reductions.
    #[serde(default)]
    pub time_seconds: u64,
    /// Success chance, only meaningful for invention.
    #[serde(default)]
    pub probability: Option<f64>,
    /// (material type, base quantity per run), in recipe order.
    pub materials: Vec<(TypeId, u64)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureKind {
    Station,
    EngineeringComplex,
    Refinery,
}

impl FromStr for StructureKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "station" => Ok(StructureKind::Station),
            "engineering_complex" => Ok(StructureKind::EngineeringComplex),
            "refinery" => Ok(StructureKind::Refinery),
            other => Err(format!("unknown structure kind '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityClass {
    Highsec,
    Lowsec,
    Nullsec,
}

impl FromStr for SecurityClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "highsec" | "high" => Ok(SecurityClass::Highsec),
            "lowsec" | "low" => Ok(SecurityClass::Lowsec),
            "nullsec" | "null" | "wormhole" => Ok(SecurityClass::Nullsec),
            other => Err(format!("unknown security class '{other}'")),
        }
    }
}

/// Type metadata row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeInfo {
    pub id: TypeId,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
}

/// Latest known prices for one type. Any of them may be unknown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketPrice {
    pub type_id: TypeId,
    #[serde(default)]
    pub sell: Option<f64>,
    #[serde(default)]
    pub buy: Option<f64>,
    #[serde(default)]
    pub adjusted: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostIndexRecord {
    pub facility_id: i64,
    pub activity: ActivityKind,
    pub cost_index: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityRecord {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub tax_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub owner_id: i64,
    pub type_id: TypeId,
    pub quantity: u64,
}

/// Where the work happens. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureConfig {
    pub name: String,
    pub kind: StructureKind,
    pub security: SecurityClass,
    #[serde(default)]
    pub rigs: Vec<String>,
}

/// One node of a production tree.
///
/// Built top-down by the calculator and never mutated afterwards; every
/// nested node is exclusively owned by the edge that points at it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionNode {
    pub blueprint_id: TypeId,
    pub product_id: TypeId,
    pub product_name: String,
    pub requested_quantity: u64,
    pub runs: u64,
    pub output_per_run: u64,
    /// 0 for the root.
    pub depth: usize,
    pub activity: ActivityKind,
    pub me_level: u8,
    pub te_level: u8,
    /// Base duration of a single run from the recipe.
    pub time_seconds: u64,
    pub has_copy_step: bool,
    pub materials: Vec<MaterialEdge>,
    /// Material bonus applied to this node's inputs, in percent.
    pub structure_bonus_percent: f64,
    pub structure_time_bonus_percent: f64,
    pub structure_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialEdge {
    pub material_id: TypeId,
    pub material_name: String,
    /// Already reduced by ME and structure bonus.
    pub quantity: u64,
    pub is_buildable: bool,
    /// Present when buildable and not excluded.
    pub node: Option<Box<ProductionNode>>,
}

/// A known decryptor and the modifiers it applies to an invention job.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DecryptorOption {
    pub type_id: TypeId,
    pub name: &'static str,
    pub probability_multiplier: f64,
    pub me_modifier: i32,
    pub te_modifier: i32,
    pub run_modifier: i32,
}

/// A flat unit of work derived from the production tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionStep {
    pub activity: ActivityKind,
    pub blueprint_id: TypeId,
    pub product_id: TypeId,
    pub product_name: String,
    pub runs: u64,
    pub quantity: u64,
    pub output_per_run: u64,
    pub depth: usize,
    pub me_level: u8,
    pub te_level: u8,
    /// Adjusted duration of one run (TE, structure and skills applied).
    pub time_per_run_seconds: u64,
    pub split_group_id: Option<u32>,
    pub split_index: Option<u32>,
}

/// Supply-side record for profit matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndustryJobRecord {
    pub job_id: i64,
    pub blueprint_id: TypeId,
    pub product_id: TypeId,
    pub runs: u64,
    /// Total install cost paid for the job.
    pub cost: f64,
    pub completed_at: DateTime<Utc>,
}

/// Demand-side record for profit matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleTransactionRecord {
    pub transaction_id: i64,
    pub product_id: TypeId,
    pub quantity: u64,
    pub unit_price: f64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitMatch {
    pub job_id: i64,
    pub transaction_id: Option<i64>,
    pub product_id: TypeId,
    pub quantity_sold: u64,
    pub revenue: f64,
    pub material_cost: f64,
    pub job_install_cost: f64,
    pub tax_amount: f64,
    pub profit: f64,
}

/// Non-fatal signal that reference or history data looks incomplete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StaleDataWarning {
    MissingRecipe { job_id: i64, blueprint_id: TypeId },
    MissingPrice { type_id: TypeId },
    UnexplainedSales { product_id: TypeId, quantity: u64 },
}

impl fmt::Display for StaleDataWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaleDataWarning::MissingRecipe { job_id, blueprint_id } => {
                write!(f, "job {job_id}: no recipe for blueprint {blueprint_id}")
            }
            StaleDataWarning::MissingPrice { type_id } => {
                write!(f, "no market price for type {type_id}")
            }
            StaleDataWarning::UnexplainedSales { product_id, quantity } => write!(
                f,
                "{quantity} units of {product_id} sold without matching production"
            ),
        }
    }
}

/// Round to two decimals, the precision used for quantities and ISK amounts.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_parse_snake_case_names() {
        assert_eq!(
            "engineering_complex".parse::<StructureKind>().unwrap(),
            StructureKind::EngineeringComplex
        );
        assert_eq!("nullsec".parse::<SecurityClass>().unwrap(), SecurityClass::Nullsec);
        assert_eq!("reaction".parse::<ActivityKind>().unwrap(), ActivityKind::Reaction);
        assert!("citadel".parse::<StructureKind>().is_err());
    }

    #[test]
    fn structure_config_deserializes_snake_case() {
        let json = r#"{"name":"Azbel","kind":"engineering_complex","security":"lowsec"}"#;
        let cfg: StructureConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.kind, StructureKind::EngineeringComplex);
        assert!(cfg.rigs.is_empty());
    }

    #[test]
    fn round2_trims_float_noise() {
        assert_eq!(round2(2218.3200000001), 2218.32);
        assert_eq!(round2(0.1 + 0.2), 0.3);
    }
}
