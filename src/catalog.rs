//! In-memory reference data.
//!
//! For callers that have already fetched recipes, prices and indices and
//! want to hand them to the engine as plain maps.

use std::collections::HashMap;

use crate::lookup::{CostIndexLookup, PriceLookup, RecipeLookup, StockLookup, TypeMetadata};
use crate::models::{ActivityKind, BlueprintRecipe, MarketPrice, TypeId, TypeInfo};

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    recipes: Vec<BlueprintRecipe>,
    types: HashMap<TypeId, TypeInfo>,
    prices: HashMap<TypeId, MarketPrice>,
    cost_indices: HashMap<(i64, ActivityKind), f64>,
    facility_taxes: HashMap<i64, f64>,
    stock: HashMap<i64, HashMap<TypeId, u64>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, id: TypeId, name: &str, category: Option<&str>) -> Self {
        self.types.insert(
            id,
            TypeInfo {
                id,
                name: name.to_string(),
                category: category.map(str::to_string),
            },
        );
        self
    }

    pub fn with_recipe(mut self, recipe: BlueprintRecipe) -> Self {
        self.recipes.push(recipe);
        self
    }

    pub fn with_price(
        mut self,
        type_id: TypeId,
        sell: Option<f64>,
        buy: Option<f64>,
        adjusted: Option<f64>,
    ) -> Self {
        self.prices.insert(
            type_id,
            MarketPrice {
                type_id,
                sell,
                buy,
                adjusted,
            },
        );
        self
    }

    pub fn with_cost_index(mut self, facility_id: i64, activity: ActivityKind, index: f64) -> Self {
        self.cost_indices.insert((facility_id, activity), index);
        self
    }

    pub fn with_facility_tax(mut self, facility_id: i64, tax_percent: f64) -> Self {
        self.facility_taxes.insert(facility_id, tax_percent);
        self
    }

    pub fn with_stock(mut self, owner_id: i64, type_id: TypeId, quantity: u64) -> Self {
        *self
            .stock
            .entry(owner_id)
            .or_default()
            .entry(type_id)
            .or_default() += quantity;
        self
    }

    fn price_map(
        &self,
        ids: &[TypeId],
        pick: impl Fn(&MarketPrice) -> Option<f64>,
    ) -> HashMap<TypeId, Option<f64>> {
        ids.iter()
            .map(|id| (*id, self.prices.get(id).and_then(&pick)))
            .collect()
    }
}

impl RecipeLookup for Catalog {
    fn find_recipe_for_product(
        &self,
        product_id: TypeId,
        activity: ActivityKind,
    ) -> Option<BlueprintRecipe> {
        self.recipes
            .iter()
            .find(|r| r.product_id == product_id && r.activity == activity)
            .cloned()
    }

    fn find_materials(&self, blueprint_id: TypeId, activity: ActivityKind) -> Vec<(TypeId, u64)> {
        self.recipes
            .iter()
            .find(|r| r.blueprint_id == blueprint_id && r.activity == activity)
            .map(|r| r.materials.clone())
            .unwrap_or_default()
    }
}

impl PriceLookup for Catalog {
    fn get_prices(&self, ids: &[TypeId]) -> HashMap<TypeId, Option<f64>> {
        self.price_map(ids, |p| p.sell)
    }

    fn get_buy_prices(&self, ids: &[TypeId]) -> HashMap<TypeId, Option<f64>> {
        self.price_map(ids, |p| p.buy)
    }

    fn get_adjusted_price(&self, id: TypeId) -> Option<f64> {
        self.prices.get(&id).and_then(|p| p.adjusted)
    }
}

impl CostIndexLookup for Catalog {
    fn get_cost_index(&self, facility_id: i64, activity: ActivityKind) -> Option<f64> {
        self.cost_indices.get(&(facility_id, activity)).copied()
    }

    fn get_facility_tax(&self, facility_id: i64) -> Option<f64> {
        self.facility_taxes.get(&facility_id).copied()
    }
}

impl StockLookup for Catalog {
    fn get_aggregated_quantities(&self, owner_id: i64) -> HashMap<TypeId, u64> {
        self.stock.get(&owner_id).cloned().unwrap_or_default()
    }
}

impl TypeMetadata for Catalog {
    fn resolve_type_name(&self, id: TypeId) -> Option<String> {
        self.types.get(&id).map(|t| t.name.clone())
    }

    fn resolve_category(&self, id: TypeId) -> Option<String> {
        self.types.get(&id).and_then(|t| t.category.clone())
    }
}
