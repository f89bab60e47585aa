//! Structure and rig bonuses
//!
//! Material bonuses stack additively: `base + Σ rig × security multiplier`.
//! Time bonuses stack multiplicatively: each one is an independent discount
//! on whatever duration the previous ones left over.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::models::{ActivityKind, SecurityClass, StructureConfig, StructureKind};

/// Base material bonus an engineering complex gives to manufacturing.
pub const ENGINEERING_COMPLEX_MATERIAL_PERCENT: f64 = 1.0;
/// Base time bonus an engineering complex gives to manufacturing.
pub const ENGINEERING_COMPLEX_TIME_PERCENT: f64 = 20.0;
/// Base time bonus a refinery gives to reactions.
pub const REFINERY_TIME_PERCENT: f64 = 25.0;

// Standup M-Set Basic Small Ship Manufacturing Material Efficiency II
static RIG_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)^\s*Standup\s+(?:M|L|XL)-Set\s+(?P<target>.+?)\s+",
        r"(?P<effect>Material\s+Efficiency|Time\s+Efficiency|Efficiency)\s+",
        r"(?P<tier>II|I)\s*$",
    ))
    .expect("rig name pattern is valid")
});

/// Group of product categories a rig can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RigFamily {
    SmallShip,
    MediumShip,
    LargeShip,
    CapitalShip,
    Component,
    CapitalComponent,
    Equipment,
    Ammunition,
    Drone,
    Structure,
    CompositeReaction,
    PolymerReaction,
    BiochemicalReaction,
}

const SHIP_FAMILIES: [RigFamily; 4] = [
    RigFamily::SmallShip,
    RigFamily::MediumShip,
    RigFamily::LargeShip,
    RigFamily::CapitalShip,
];

const REACTION_FAMILIES: [RigFamily; 3] = [
    RigFamily::CompositeReaction,
    RigFamily::PolymerReaction,
    RigFamily::BiochemicalReaction,
];

/// Every category the engine knows, and the rig family it belongs to.
pub const CATEGORY_FAMILIES: &[(&str, RigFamily)] = &[
    ("frigate", RigFamily::SmallShip),
    ("destroyer", RigFamily::SmallShip),
    ("cruiser", RigFamily::MediumShip),
    ("battlecruiser", RigFamily::MediumShip),
    ("battleship", RigFamily::LargeShip),
    ("capital_ship", RigFamily::CapitalShip),
    ("component", RigFamily::Component),
    ("capital_component", RigFamily::CapitalComponent),
    ("module", RigFamily::Equipment),
    ("rig", RigFamily::Equipment),
    ("charge", RigFamily::Ammunition),
    ("drone", RigFamily::Drone),
    ("fighter", RigFamily::Drone),
    ("structure", RigFamily::Structure),
    ("composite", RigFamily::CompositeReaction),
    ("polymer", RigFamily::PolymerReaction),
    ("biochemical", RigFamily::BiochemicalReaction),
];

impl RigFamily {
    pub fn is_reaction(&self) -> bool {
        REACTION_FAMILIES.contains(self)
    }

    /// Rig strength multiplier for the structure's security class.
    pub fn security_multiplier(&self, security: SecurityClass) -> f64 {
        match (self.is_reaction(), security) {
            (false, SecurityClass::Highsec) => 1.0,
            (false, SecurityClass::Lowsec) => 1.9,
            (false, SecurityClass::Nullsec) => 2.1,
            (true, SecurityClass::Highsec) => 1.0,
            (true, SecurityClass::Lowsec) => 1.0,
            (true, SecurityClass::Nullsec) => 1.1,
        }
    }
}

pub fn family_for_category(category: &str) -> Option<RigFamily> {
    let category = category.to_ascii_lowercase();
    CATEGORY_FAMILIES
        .iter()
        .find(|(name, _)| *name == category)
        .map(|(_, family)| *family)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RigEffect {
    Material,
    Time,
    Combined,
}

/// What an installed rig does, parsed from its name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RigProfile {
    pub name: String,
    pub tier: u8,
    pub effect: RigEffect,
    pub families: Vec<RigFamily>,
}

impl RigProfile {
    /// Nominal material reduction before the security multiplier.
    pub fn nominal_material_percent(&self) -> f64 {
        match self.tier {
            2 => 2.4,
            _ => 2.0,
        }
    }

    pub fn material_percent(&self) -> f64 {
        match self.effect {
            RigEffect::Material | RigEffect::Combined => self.nominal_material_percent(),
            RigEffect::Time => 0.0,
        }
    }

    /// Time reduction is ten times the nominal material percent.
    pub fn time_percent(&self) -> f64 {
        match self.effect {
            RigEffect::Time | RigEffect::Combined => self.nominal_material_percent() * 10.0,
            RigEffect::Material => 0.0,
        }
    }

    pub fn targets(&self, family: RigFamily) -> bool {
        self.families.contains(&family)
    }
}

/// Parse a rig name into its tier, effect and target families.
///
/// Returns `None` for names that are not industry efficiency rigs.
pub fn parse_rig(name: &str) -> Option<RigProfile> {
    let cap = RIG_NAME_RE.captures(name)?;

    let tier = if cap["tier"].eq_ignore_ascii_case("II") { 2 } else { 1 };
    let effect_text = cap["effect"].to_ascii_lowercase();
    let effect = if effect_text.starts_with("material") {
        RigEffect::Material
    } else if effect_text.starts_with("time") {
        RigEffect::Time
    } else {
        RigEffect::Combined
    };

    let families = target_families(&cap["target"]);
    if families.is_empty() {
        return None;
    }

    Some(RigProfile {
        name: name.trim().to_string(),
        tier,
        effect,
        families,
    })
}

fn target_families(target: &str) -> Vec<RigFamily> {
    let t = target.to_ascii_lowercase();
    let mut families = Vec::new();

    for (keyword, family) in [
        ("small ship", RigFamily::SmallShip),
        ("medium ship", RigFamily::MediumShip),
        ("large ship", RigFamily::LargeShip),
        ("capital ship", RigFamily::CapitalShip),
    ] {
        if t.contains(keyword) {
            families.push(family);
        }
    }
    // XL-Set "Ship Manufacturing" covers every hull size
    if families.is_empty() && t.contains("ship") {
        families.extend(SHIP_FAMILIES);
    }

    if t.contains("capital component") {
        families.push(RigFamily::CapitalComponent);
    } else if t.contains("component") {
        families.push(RigFamily::Component);
    }
    if t.contains("equipment") {
        families.push(RigFamily::Equipment);
    }
    if t.contains("ammunition") || t.contains("consumable") {
        families.push(RigFamily::Ammunition);
    }
    if t.contains("drone") {
        families.push(RigFamily::Drone);
    }
    if t.contains("structure") {
        families.push(RigFamily::Structure);
    }

    let before_reactions = families.len();
    if t.contains("composite") {
        families.push(RigFamily::CompositeReaction);
    }
    if t.contains("hybrid") || t.contains("polymer") {
        families.push(RigFamily::PolymerReaction);
    }
    if t.contains("biochemical") {
        families.push(RigFamily::BiochemicalReaction);
    }
    if families.len() == before_reactions && t.contains("reactor") {
        families.extend(REACTION_FAMILIES);
    }

    families
}

/// Material bonus breakdown, all values in percent.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MaterialBonus {
    pub base: f64,
    pub rig: f64,
    pub total: f64,
}

fn is_reaction_category(family: Option<RigFamily>) -> bool {
    family.is_some_and(|f| f.is_reaction())
}

fn base_material_percent(kind: StructureKind, reaction: bool) -> f64 {
    match kind {
        StructureKind::EngineeringComplex if !reaction => ENGINEERING_COMPLEX_MATERIAL_PERCENT,
        _ => 0.0,
    }
}

fn base_time_percent(kind: StructureKind, reaction: bool) -> f64 {
    match kind {
        StructureKind::EngineeringComplex if !reaction => ENGINEERING_COMPLEX_TIME_PERCENT,
        StructureKind::Refinery if reaction => REFINERY_TIME_PERCENT,
        _ => 0.0,
    }
}

/// Rigs of `structure` that apply to `family`, already parsed.
fn matching_rigs(
    structure: &StructureConfig,
    family: RigFamily,
) -> impl Iterator<Item = RigProfile> + '_ {
    structure.rigs.iter().filter_map(move |name| {
        let rig = parse_rig(name);
        if rig.is_none() {
            debug!(rig = %name, "ignoring unrecognized rig");
        }
        rig.filter(|r| r.targets(family))
    })
}

/// Material bonus a structure gives to products of `category`.
///
/// Categories outside the known table get the structure's manufacturing
/// base bonus and no rig bonus.
pub fn material_bonus(structure: &StructureConfig, category: &str) -> MaterialBonus {
    let family = family_for_category(category);
    let base = base_material_percent(structure.kind, is_reaction_category(family));

    let rig = match family {
        Some(family) => {
            let multiplier = family.security_multiplier(structure.security);
            matching_rigs(structure, family)
                .map(|r| r.material_percent() * multiplier)
                .sum()
        }
        None => 0.0,
    };

    MaterialBonus {
        base,
        rig,
        total: base + rig,
    }
}

/// Total time bonus in percent: `1 - (1 - base) × Π(1 - rigᵢ)`.
pub fn time_bonus(structure: &StructureConfig, category: &str) -> f64 {
    let family = family_for_category(category);
    stacked_time_bonus(structure, family, is_reaction_category(family))
}

/// Time bonus for a job of `activity` on a product of `category`.
///
/// The activity picks the base bonus, so a reaction follows refinery rules
/// even when its category is missing from the table.
pub fn job_time_bonus(structure: &StructureConfig, category: &str, activity: ActivityKind) -> f64 {
    let reaction = activity == ActivityKind::Reaction;
    stacked_time_bonus(structure, family_for_category(category), reaction)
}

fn stacked_time_bonus(
    structure: &StructureConfig,
    family: Option<RigFamily>,
    reaction: bool,
) -> f64 {
    let mut remaining = 1.0 - base_time_percent(structure.kind, reaction) / 100.0;

    // reactor rigs only reach reactions, manufacturing rigs only the rest
    if let Some(family) = family.filter(|f| f.is_reaction() == reaction) {
        let multiplier = family.security_multiplier(structure.security);
        for rig in matching_rigs(structure, family) {
            let percent = rig.time_percent() * multiplier;
            if percent > 0.0 {
                remaining *= 1.0 - percent / 100.0;
            }
        }
    }

    (1.0 - remaining.max(0.0)) * 100.0
}

/// Material bonus for every known category. Categories in the same rig
/// family always get the same number.
pub fn all_material_bonuses(structure: &StructureConfig) -> BTreeMap<String, f64> {
    CATEGORY_FAMILIES
        .iter()
        .map(|(category, _)| (category.to_string(), material_bonus(structure, category).total))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn structure(kind: StructureKind, security: SecurityClass, rigs: &[&str]) -> StructureConfig {
        StructureConfig {
            name: "Test".to_string(),
            kind,
            security,
            rigs: rigs.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[test]
    fn parses_material_rig() {
        let name = "Standup M-Set Basic Small Ship Manufacturing Material Efficiency II";
        let rig = parse_rig(name).unwrap();
        assert_eq!(rig.tier, 2);
        assert_eq!(rig.effect, RigEffect::Material);
        assert_eq!(rig.families, vec![RigFamily::SmallShip]);
        assert_eq!(rig.material_percent(), 2.4);
        assert_eq!(rig.time_percent(), 0.0);
    }

    #[test]
    fn parses_time_and_combined_rigs() {
        let te =
            parse_rig("Standup M-Set Advanced Component Manufacturing Time Efficiency I").unwrap();
        assert_eq!(te.effect, RigEffect::Time);
        assert_eq!(te.families, vec![RigFamily::Component]);
        assert_eq!(te.material_percent(), 0.0);
        assert_eq!(te.time_percent(), 20.0);

        let both =
            parse_rig("Standup L-Set Capital Component Manufacturing Efficiency II").unwrap();
        assert_eq!(both.effect, RigEffect::Combined);
        assert_eq!(both.families, vec![RigFamily::CapitalComponent]);
        assert_eq!(both.material_percent(), 2.4);
        assert_eq!(both.time_percent(), 24.0);
    }

    #[test]
    fn broad_targets_cover_whole_group() {
        let ships = parse_rig("Standup XL-Set Ship Manufacturing Efficiency I").unwrap();
        assert_eq!(ships.families.len(), 4);
        let reactors = parse_rig("Standup XL-Set Reactor Efficiency I").unwrap();
        assert!(reactors.families.iter().all(|f| f.is_reaction()));
        assert_eq!(reactors.families.len(), 3);
    }

    #[test]
    fn unrelated_rigs_are_not_parsed() {
        assert!(parse_rig("Standup M-Set Invention Cost Optimization I").is_none());
        assert!(parse_rig("Large Trimark Armor Pump I").is_none());
    }

    #[test]
    fn station_gives_nothing() {
        let s = structure(StructureKind::Station, SecurityClass::Highsec, &[]);
        assert_eq!(material_bonus(&s, "frigate"), MaterialBonus::default());
        assert_eq!(time_bonus(&s, "frigate"), 0.0);
    }

    #[test]
    fn material_bonus_stacks_additively() {
        let s = structure(
            StructureKind::EngineeringComplex,
            SecurityClass::Nullsec,
            &["Standup M-Set Basic Small Ship Manufacturing Material Efficiency I"],
        );
        let bonus = material_bonus(&s, "frigate");
        assert_eq!(bonus.base, 1.0);
        assert!((bonus.rig - 4.2).abs() < 1e-9);
        assert!((bonus.total - 5.2).abs() < 1e-9);
    }

    #[test]
    fn rig_ignored_for_untargeted_category() {
        let s = structure(
            StructureKind::EngineeringComplex,
            SecurityClass::Lowsec,
            &["Standup M-Set Basic Small Ship Manufacturing Material Efficiency I"],
        );
        let bonus = material_bonus(&s, "battleship");
        assert_eq!(bonus.rig, 0.0);
        assert_eq!(bonus.total, 1.0);
    }

    #[test]
    fn time_bonus_stacks_multiplicatively() {
        let s = structure(
            StructureKind::EngineeringComplex,
            SecurityClass::Nullsec,
            &["Standup M-Set Basic Small Ship Manufacturing Time Efficiency II"],
        );
        // 1 - 0.80 × (1 - 0.504)
        assert!((time_bonus(&s, "frigate") - 60.32).abs() < 1e-9);
    }

    #[test]
    fn material_rig_never_reduces_time() {
        let s = structure(
            StructureKind::EngineeringComplex,
            SecurityClass::Nullsec,
            &["Standup M-Set Basic Small Ship Manufacturing Material Efficiency II"],
        );
        assert!((time_bonus(&s, "frigate") - 20.0).abs() < 1e-9);
    }

    #[test]
    fn refinery_has_no_base_material_bonus() {
        let s = structure(
            StructureKind::Refinery,
            SecurityClass::Nullsec,
            &["Standup M-Set Composite Reactor Material Efficiency I"],
        );
        let bonus = material_bonus(&s, "composite");
        assert_eq!(bonus.base, 0.0);
        assert!((bonus.rig - 2.2).abs() < 1e-9);
        assert!((time_bonus(&s, "composite") - 25.0).abs() < 1e-9);
        // refinery base time does not reach manufacturing
        assert_eq!(time_bonus(&s, "frigate"), 0.0);
    }

    #[test]
    fn reactor_rigs_use_reactor_security_table() {
        let s = structure(
            StructureKind::Refinery,
            SecurityClass::Lowsec,
            &["Standup M-Set Composite Reactor Time Efficiency I"],
        );
        // lowsec reactor multiplier is 1.0: 1 - 0.75 × 0.80
        assert!((time_bonus(&s, "composite") - 40.0).abs() < 1e-9);
    }

    #[test]
    fn all_bonuses_share_values_per_family() {
        let s = structure(
            StructureKind::EngineeringComplex,
            SecurityClass::Highsec,
            &["Standup M-Set Basic Medium Ship Manufacturing Material Efficiency II"],
        );
        let all = all_material_bonuses(&s);
        assert_eq!(all.len(), CATEGORY_FAMILIES.len());
        assert_eq!(all["cruiser"], all["battlecruiser"]);
        assert!((all["cruiser"] - 3.4).abs() < 1e-9);
        assert_eq!(all["frigate"], 1.0);
        assert_eq!(all["composite"], 0.0);
    }

    #[test]
    fn two_material_rigs_add_up() {
        let s = structure(
            StructureKind::EngineeringComplex,
            SecurityClass::Highsec,
            &[
                "Standup M-Set Basic Small Ship Manufacturing Material Efficiency I",
                "Standup L-Set Basic Small Ship Manufacturing Efficiency II",
            ],
        );
        // 1 + 2.0 + 2.4, highsec multiplier 1.0
        let bonus = material_bonus(&s, "destroyer");
        assert!((bonus.rig - 4.4).abs() < 1e-9);
        assert!((bonus.total - 5.4).abs() < 1e-9);
    }

    #[test]
    fn two_time_rigs_multiply() {
        let s = structure(
            StructureKind::EngineeringComplex,
            SecurityClass::Highsec,
            &[
                "Standup M-Set Advanced Component Manufacturing Time Efficiency I",
                "Standup M-Set Advanced Component Manufacturing Time Efficiency II",
            ],
        );
        // 1 - 0.80 × 0.80 × 0.76
        assert!((time_bonus(&s, "component") - 51.36).abs() < 1e-9);
    }

    #[test]
    fn reactions_get_refinery_time_without_category() {
        let s = structure(StructureKind::Refinery, SecurityClass::Nullsec, &[]);
        assert_eq!(time_bonus(&s, ""), 0.0);
        assert!((job_time_bonus(&s, "", ActivityKind::Reaction) - 25.0).abs() < 1e-9);
        let intermediate = job_time_bonus(&s, "intermediate_material", ActivityKind::Reaction);
        assert!((intermediate - 25.0).abs() < 1e-9);
        assert_eq!(job_time_bonus(&s, "composite", ActivityKind::Manufacturing), 0.0);

        let complex = structure(StructureKind::EngineeringComplex, SecurityClass::Nullsec, &[]);
        assert_eq!(job_time_bonus(&complex, "", ActivityKind::Reaction), 0.0);
        assert!((job_time_bonus(&complex, "", ActivityKind::Manufacturing) - 20.0).abs() < 1e-9);
    }
}
