//! Read-only collaborators the engine queries for reference data.
//!
//! Implementations may be backed by a database, a cache or a remote feed;
//! the engine only relies on these calls being synchronous and free of
//! side effects. A lookup that cannot answer returns `None` (or an empty
//! collection) and the engine treats the contribution as zero.

use std::collections::HashMap;

use crate::models::{ActivityKind, BlueprintRecipe, TypeId};

pub trait RecipeLookup {
    /// Recipe whose activity outputs `product_id`.
    fn find_recipe_for_product(
        &self,
        product_id: TypeId,
        activity: ActivityKind,
    ) -> Option<BlueprintRecipe>;

    fn find_materials(&self, blueprint_id: TypeId, activity: ActivityKind) -> Vec<(TypeId, u64)>;

    /// Manufacturing recipe first, then reaction.
    fn find_producing_recipe(&self, product_id: TypeId) -> Option<BlueprintRecipe> {
        self.find_recipe_for_product(product_id, ActivityKind::Manufacturing)
            .or_else(|| self.find_recipe_for_product(product_id, ActivityKind::Reaction))
    }
}

pub trait PriceLookup {
    /// Market sell prices.
    fn get_prices(&self, ids: &[TypeId]) -> HashMap<TypeId, Option<f64>>;

    /// Market buy prices.
    fn get_buy_prices(&self, ids: &[TypeId]) -> HashMap<TypeId, Option<f64>>;

    /// Adjusted reference price used for EIV.
    fn get_adjusted_price(&self, id: TypeId) -> Option<f64>;
}

pub trait CostIndexLookup {
    fn get_cost_index(&self, facility_id: i64, activity: ActivityKind) -> Option<f64>;

    /// Facility tax in percent.
    fn get_facility_tax(&self, facility_id: i64) -> Option<f64>;
}

pub trait StockLookup {
    fn get_aggregated_quantities(&self, owner_id: i64) -> HashMap<TypeId, u64>;
}

pub trait TypeMetadata {
    fn resolve_type_name(&self, id: TypeId) -> Option<String>;

    fn resolve_category(&self, id: TypeId) -> Option<String>;

    /// Name for display, falling back to the numeric ID.
    fn display_name(&self, id: TypeId) -> String {
        self.resolve_type_name(id)
            .unwrap_or_else(|| format!("Type {id}"))
    }
}

/// Sum of `adjusted price × quantity` over a recipe's materials.
/// Materials without an adjusted price contribute nothing.
pub fn estimated_item_value(prices: &dyn PriceLookup, materials: &[(TypeId, u64)]) -> f64 {
    materials
        .iter()
        .map(|(id, qty)| prices.get_adjusted_price(*id).unwrap_or(0.0) * *qty as f64)
        .sum()
}

/// Job installation cost: `eiv × cost index × (1 + facility tax / 100)`.
pub fn install_cost(eiv: f64, cost_index: Option<f64>, facility_tax_percent: Option<f64>) -> f64 {
    let index = cost_index.unwrap_or(0.0);
    let tax = facility_tax_percent.unwrap_or(0.0);
    eiv * index * (1.0 + tax / 100.0)
}

/// Price a bag of materials, treating missing prices as zero.
pub fn priced_total(quantities: &[(TypeId, u64)], prices: &HashMap<TypeId, Option<f64>>) -> f64 {
    quantities
        .iter()
        .map(|(id, qty)| prices.get(id).copied().flatten().unwrap_or(0.0) * *qty as f64)
        .sum()
}
