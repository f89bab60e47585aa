//! Invention probability and cost
//!
//! Costs are planning estimates: the engine reports the expected number of
//! attempts needed for the requested successes, never a sampled outcome.

use serde::Serialize;
use tracing::debug;

use crate::config::PlannerSettings;
use crate::lookup::{self, CostIndexLookup, PriceLookup, RecipeLookup};
use crate::models::{ActivityKind, BlueprintRecipe, DecryptorOption, TypeId, round2};

pub const BASE_INVENTION_ME: i32 = 2;
pub const BASE_INVENTION_TE: i32 = 4;

pub const DECRYPTORS: [DecryptorOption; 8] = [
    DecryptorOption {
        type_id: 34201,
        name: "Accelerant Decryptor",
        probability_multiplier: 1.2,
        me_modifier: 2,
        te_modifier: 10,
        run_modifier: 1,
    },
    DecryptorOption {
        type_id: 34202,
        name: "Attainment Decryptor",
        probability_multiplier: 1.8,
        me_modifier: -1,
        te_modifier: 4,
        run_modifier: 4,
    },
    DecryptorOption {
        type_id: 34203,
        name: "Augmentation Decryptor",
        probability_multiplier: 0.6,
        me_modifier: -2,
        te_modifier: 2,
        run_modifier: 9,
    },
    DecryptorOption {
        type_id: 34204,
        name: "Parity Decryptor",
        probability_multiplier: 1.5,
        me_modifier: 1,
        te_modifier: -2,
        run_modifier: 3,
    },
    DecryptorOption {
        type_id: 34205,
        name: "Process Decryptor",
        probability_multiplier: 1.1,
        me_modifier: 3,
        te_modifier: 6,
        run_modifier: 0,
    },
    DecryptorOption {
        type_id: 34206,
        name: "Symmetry Decryptor",
        probability_multiplier: 1.0,
        me_modifier: 1,
        te_modifier: 8,
        run_modifier: 2,
    },
    DecryptorOption {
        type_id: 34207,
        name: "Optimized Attainment Decryptor",
        probability_multiplier: 1.9,
        me_modifier: 1,
        te_modifier: -2,
        run_modifier: 2,
    },
    DecryptorOption {
        type_id: 34208,
        name: "Optimized Augmentation Decryptor",
        probability_multiplier: 0.9,
        me_modifier: 2,
        te_modifier: 0,
        run_modifier: 7,
    },
];

pub fn decryptor_by_id(type_id: TypeId) -> Option<&'static DecryptorOption> {
    DECRYPTORS.iter().find(|d| d.type_id == type_id)
}

/// Find a decryptor by type ID or by name, with or without the
/// "Decryptor" suffix ("accelerant", "Parity Decryptor", "34201").
pub fn find_decryptor(key: &str) -> Option<&'static DecryptorOption> {
    if let Ok(id) = key.trim().parse::<TypeId>() {
        return decryptor_by_id(id);
    }
    let key = key.trim().to_ascii_lowercase();
    DECRYPTORS.iter().find(|d| {
        let name = d.name.to_ascii_lowercase();
        name == key || name.trim_end_matches(" decryptor") == key
    })
}

/// Reference data behind one invention.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventionData {
    pub t1_blueprint_id: TypeId,
    pub t2_blueprint_id: TypeId,
    pub base_probability: f64,
    pub base_runs: u64,
    /// Datacores consumed per attempt.
    pub materials: Vec<(TypeId, u64)>,
    pub invention_time_seconds: u64,
}

/// Outcome parameters once a decryptor (or none) is applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AppliedDecryptor {
    pub probability: f64,
    pub me_level: i32,
    pub te_level: i32,
    pub runs: u64,
}

pub fn apply_decryptor(
    base_probability: f64,
    base_runs: u64,
    decryptor: Option<&DecryptorOption>,
) -> AppliedDecryptor {
    let (multiplier, me, te, runs) = match decryptor {
        Some(d) => (d.probability_multiplier, d.me_modifier, d.te_modifier, d.run_modifier),
        None => (1.0, 0, 0, 0),
    };
    AppliedDecryptor {
        probability: (base_probability * multiplier).min(1.0),
        me_level: BASE_INVENTION_ME + me,
        te_level: BASE_INVENTION_TE + te,
        runs: (base_runs as i64 + runs as i64).max(1) as u64,
    }
}

/// `ceil(desired / probability)`, or `None` when success is impossible.
pub fn expected_attempts(desired_successes: u64, probability: f64) -> Option<u64> {
    if probability.is_nan() || probability <= 0.0 {
        return None;
    }
    // trim float noise such as 3 / 0.3 = 10.000000000000002
    let raw = desired_successes as f64 / probability;
    let trimmed = (raw * 1e6).round() / 1e6;
    Some(trimmed.ceil() as u64)
}

/// Fully costed invention plan for one decryptor choice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventionCostResult {
    pub product_id: TypeId,
    pub t2_blueprint_id: TypeId,
    pub decryptor_type_id: Option<TypeId>,
    pub decryptor_name: Option<String>,
    pub probability: f64,
    pub expected_attempts: u64,
    pub me_level: i32,
    pub te_level: i32,
    /// Runs on each invented copy.
    pub runs: u64,
    pub datacore_cost_per_attempt: f64,
    pub decryptor_cost_per_attempt: f64,
    pub copy_job_cost: f64,
    pub invention_install_cost: f64,
    pub total_cost: f64,
    /// Invention cost carried by each manufacturing run of the copies.
    pub cost_per_run: f64,
}

/// Manufacturing recipe of a T2 product plus the invention recipe that
/// produces its blueprint.
fn t2_recipes(
    recipes: &dyn RecipeLookup,
    product_id: TypeId,
) -> Option<(BlueprintRecipe, BlueprintRecipe)> {
    let manufacturing = recipes.find_recipe_for_product(product_id, ActivityKind::Manufacturing)?;
    let invention =
        recipes.find_recipe_for_product(manufacturing.blueprint_id, ActivityKind::Invention)?;
    Some((manufacturing, invention))
}

/// A product is T2 when it can be manufactured and its blueprint can be invented.
pub fn is_t2(recipes: &dyn RecipeLookup, product_id: TypeId) -> bool {
    t2_recipes(recipes, product_id).is_some()
}

pub struct InventionEngine<'a> {
    recipes: &'a dyn RecipeLookup,
    prices: &'a dyn PriceLookup,
    costs: &'a dyn CostIndexLookup,
    settings: &'a PlannerSettings,
}

impl<'a> InventionEngine<'a> {
    pub fn new(
        recipes: &'a dyn RecipeLookup,
        prices: &'a dyn PriceLookup,
        costs: &'a dyn CostIndexLookup,
        settings: &'a PlannerSettings,
    ) -> Self {
        Self {
            recipes,
            prices,
            costs,
            settings,
        }
    }

    pub fn is_t2(&self, product_id: TypeId) -> bool {
        is_t2(self.recipes, product_id)
    }

    pub fn get_invention_data(&self, product_id: TypeId) -> Option<InventionData> {
        let (manufacturing, invention) = t2_recipes(self.recipes, product_id)?;
        let Some(base_probability) = invention.probability else {
            debug!(product_id, "invention recipe has no probability");
            return None;
        };

        Some(InventionData {
            t1_blueprint_id: invention.blueprint_id,
            t2_blueprint_id: manufacturing.blueprint_id,
            base_probability,
            base_runs: invention.output_per_run,
            materials: invention.materials,
            invention_time_seconds: invention.time_seconds,
        })
    }

    /// Cost `desired_successes` inventions of `product_id`'s blueprint.
    ///
    /// Returns `None` when the product is not inventable, the decryptor ID
    /// is unknown, or the effective probability is zero.
    pub fn calculate_invention_cost(
        &self,
        product_id: TypeId,
        facility_id: i64,
        decryptor_id: Option<TypeId>,
        desired_successes: u64,
    ) -> Option<InventionCostResult> {
        let decryptor = match decryptor_id {
            Some(id) => Some(decryptor_by_id(id)?),
            None => None,
        };
        let data = self.get_invention_data(product_id)?;
        self.cost_with(&data, product_id, facility_id, decryptor, desired_successes)
    }

    /// "No decryptor" plus every known decryptor, each fully costed.
    pub fn build_decryptor_options(
        &self,
        product_id: TypeId,
        facility_id: i64,
        desired_successes: u64,
    ) -> Vec<InventionCostResult> {
        let Some(data) = self.get_invention_data(product_id) else {
            return Vec::new();
        };

        std::iter::once(None)
            .chain(DECRYPTORS.iter().map(Some))
            .filter_map(|d| self.cost_with(&data, product_id, facility_id, d, desired_successes))
            .collect()
    }

    fn cost_with(
        &self,
        data: &InventionData,
        product_id: TypeId,
        facility_id: i64,
        decryptor: Option<&DecryptorOption>,
        desired_successes: u64,
    ) -> Option<InventionCostResult> {
        let applied = apply_decryptor(data.base_probability, data.base_runs, decryptor);
        let attempts = expected_attempts(desired_successes, applied.probability)?;

        let datacore_ids: Vec<TypeId> = data.materials.iter().map(|(id, _)| *id).collect();
        let datacore_prices = self.prices.get_prices(&datacore_ids);
        let datacore_cost = lookup::priced_total(&data.materials, &datacore_prices);

        let decryptor_cost = decryptor
            .and_then(|d| self.prices.get_prices(&[d.type_id]).get(&d.type_id).copied().flatten())
            .unwrap_or(0.0);

        // both jobs are charged on the value of the T1 product
        let t1_materials = self
            .recipes
            .find_materials(data.t1_blueprint_id, ActivityKind::Manufacturing);
        let eiv = lookup::estimated_item_value(self.prices, &t1_materials);
        let tax = self.costs.get_facility_tax(facility_id);
        let copy_per_attempt = lookup::install_cost(
            eiv * self.settings.copy_eiv_factor,
            self.costs.get_cost_index(facility_id, ActivityKind::Copying),
            tax,
        );
        let invention_per_attempt = lookup::install_cost(
            eiv * self.settings.invention_eiv_factor,
            self.costs.get_cost_index(facility_id, ActivityKind::Invention),
            tax,
        );

        let attempts_f = attempts as f64;
        let copy_job_cost = round2(copy_per_attempt * attempts_f);
        let invention_install_cost = round2(invention_per_attempt * attempts_f);
        let total_cost = round2(
            attempts_f * (datacore_cost + decryptor_cost) + copy_job_cost + invention_install_cost,
        );
        let produced_runs = applied.runs * desired_successes;
        let cost_per_run = if produced_runs == 0 {
            0.0
        } else {
            round2(total_cost / produced_runs as f64)
        };

        Some(InventionCostResult {
            product_id,
            t2_blueprint_id: data.t2_blueprint_id,
            decryptor_type_id: decryptor.map(|d| d.type_id),
            decryptor_name: decryptor.map(|d| d.name.to_string()),
            probability: applied.probability,
            expected_attempts: attempts,
            me_level: applied.me_level,
            te_level: applied.te_level,
            runs: applied.runs,
            datacore_cost_per_attempt: round2(datacore_cost),
            decryptor_cost_per_attempt: round2(decryptor_cost),
            copy_job_cost,
            invention_install_cost,
            total_cost,
            cost_per_run,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    const RIFTER: TypeId = 587;
    const RIFTER_BP: TypeId = 691;
    const WOLF: TypeId = 11371;
    const WOLF_BP: TypeId = 11372;
    const FACILITY: i64 = 1;

    fn catalog() -> Catalog {
        Catalog::new()
            .with_recipe(BlueprintRecipe {
                blueprint_id: RIFTER_BP,
                product_id: RIFTER,
                activity: ActivityKind::Manufacturing,
                output_per_run: 1,
                time_seconds: 6000,
                probability: None,
                materials: vec![(34, 1000)],
            })
            .with_recipe(BlueprintRecipe {
                blueprint_id: WOLF_BP,
                product_id: WOLF,
                activity: ActivityKind::Manufacturing,
                output_per_run: 1,
                time_seconds: 12_000,
                probability: None,
                materials: vec![(RIFTER, 1), (34, 500)],
            })
            .with_recipe(BlueprintRecipe {
                blueprint_id: RIFTER_BP,
                product_id: WOLF_BP,
                activity: ActivityKind::Invention,
                output_per_run: 10,
                time_seconds: 63_900,
                probability: Some(0.30),
                materials: vec![(20424, 2), (20172, 2)],
            })
            .with_price(34, Some(5.5), Some(5.0), Some(5.0))
            .with_price(20424, Some(100.0), None, None)
            .with_price(20172, Some(50.0), None, None)
            .with_price(34201, Some(1000.0), None, None)
            .with_cost_index(FACILITY, ActivityKind::Invention, 0.05)
            .with_cost_index(FACILITY, ActivityKind::Copying, 0.02)
            .with_facility_tax(FACILITY, 10.0)
    }

    #[test]
    fn detects_t2_products() {
        let catalog = catalog();
        assert!(is_t2(&catalog, WOLF));
        assert!(!is_t2(&catalog, RIFTER));
        assert!(!is_t2(&catalog, 34));
    }

    #[test]
    fn invention_data_comes_from_invention_recipe() {
        let catalog = catalog();
        let settings = PlannerSettings::default();
        let engine = InventionEngine::new(&catalog, &catalog, &catalog, &settings);
        let data = engine.get_invention_data(WOLF).unwrap();
        assert_eq!(data.t1_blueprint_id, RIFTER_BP);
        assert_eq!(data.t2_blueprint_id, WOLF_BP);
        assert_eq!(data.base_runs, 10);
        assert_eq!(data.materials.len(), 2);
        assert!(engine.get_invention_data(RIFTER).is_none());
    }

    #[test]
    fn decryptor_lookup_checks_numeric_ids() {
        assert_eq!(find_decryptor("34201").map(|d| d.name), Some("Accelerant Decryptor"));
        assert!(find_decryptor("12345").is_none());
        assert!(find_decryptor("parity").is_some());
    }

    #[test]
    fn accelerant_modifies_outcome() {
        let accelerant = find_decryptor("accelerant").unwrap();
        let applied = apply_decryptor(0.30, 10, Some(accelerant));
        assert!((applied.probability - 0.36).abs() < 1e-9);
        assert_eq!(applied.me_level, 4);
        assert_eq!(applied.te_level, 14);
        assert_eq!(applied.runs, 11);
        assert_eq!(expected_attempts(1, applied.probability), Some(3));
    }

    #[test]
    fn probability_is_capped_at_one() {
        let attainment = find_decryptor("Optimized Attainment Decryptor").unwrap();
        let applied = apply_decryptor(0.6, 1, Some(attainment));
        assert_eq!(applied.probability, 1.0);
    }

    #[test]
    fn expected_attempts_ignores_float_noise() {
        assert_eq!(expected_attempts(3, 0.3), Some(10));
        assert_eq!(expected_attempts(1, 0.0), None);
        assert_eq!(expected_attempts(0, 0.5), Some(0));
    }

    #[test]
    fn costs_without_decryptor() {
        let catalog = catalog();
        let settings = PlannerSettings::default();
        let engine = InventionEngine::new(&catalog, &catalog, &catalog, &settings);
        let result = engine.calculate_invention_cost(WOLF, FACILITY, None, 1).unwrap();

        assert_eq!(result.expected_attempts, 4);
        assert_eq!(result.runs, 10);
        assert_eq!(result.datacore_cost_per_attempt, 300.0);
        assert_eq!(result.decryptor_cost_per_attempt, 0.0);
        // EIV 5000: copy 5000 × 0.02 × 0.02 × 1.1 = 2.2, invention 5.5 per attempt
        assert!((result.copy_job_cost - 8.8).abs() < 1e-9);
        assert!((result.invention_install_cost - 22.0).abs() < 1e-9);
        assert!((result.total_cost - 1230.8).abs() < 1e-9);
        assert!((result.cost_per_run - 123.08).abs() < 1e-9);
    }

    #[test]
    fn costs_with_accelerant() {
        let catalog = catalog();
        let settings = PlannerSettings::default();
        let engine = InventionEngine::new(&catalog, &catalog, &catalog, &settings);
        let result = engine
            .calculate_invention_cost(WOLF, FACILITY, Some(34201), 1)
            .unwrap();

        assert_eq!(result.decryptor_name.as_deref(), Some("Accelerant Decryptor"));
        assert_eq!(result.expected_attempts, 3);
        assert_eq!(result.runs, 11);
        assert!((result.total_cost - 3923.1).abs() < 1e-9);
    }

    #[test]
    fn missing_prices_and_indices_degrade_to_zero() {
        let catalog = catalog();
        let settings = PlannerSettings::default();
        let engine = InventionEngine::new(&catalog, &catalog, &catalog, &settings);
        // Parity has no price and facility 99 has no indices
        let result = engine.calculate_invention_cost(WOLF, 99, Some(34204), 2).unwrap();
        assert_eq!(result.decryptor_cost_per_attempt, 0.0);
        assert_eq!(result.copy_job_cost, 0.0);
        assert_eq!(result.invention_install_cost, 0.0);
        // 0.45 probability, 2 successes -> 5 attempts of 300
        assert_eq!(result.expected_attempts, 5);
        assert!((result.total_cost - 1500.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_decryptor_is_rejected() {
        let catalog = catalog();
        let settings = PlannerSettings::default();
        let engine = InventionEngine::new(&catalog, &catalog, &catalog, &settings);
        assert!(engine.calculate_invention_cost(WOLF, FACILITY, Some(1), 1).is_none());
    }

    #[test]
    fn decryptor_options_cover_every_choice() {
        let catalog = catalog();
        let settings = PlannerSettings::default();
        let engine = InventionEngine::new(&catalog, &catalog, &catalog, &settings);
        let options = engine.build_decryptor_options(WOLF, FACILITY, 1);
        assert_eq!(options.len(), 9);
        assert!(options[0].decryptor_type_id.is_none());
        assert!(engine.build_decryptor_options(RIFTER, FACILITY, 1).is_empty());
    }
}
