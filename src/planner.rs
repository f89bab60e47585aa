//! End-to-end planning: tree, flattened jobs, invention and costs

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::calculator::{self, PlanSummary, TreeBuilder};
use crate::config::PlannerSettings;
use crate::error::PlannerError;
use crate::invention::{self, InventionCostResult, InventionEngine};
use crate::jobs;
use crate::lookup::{self, CostIndexLookup, PriceLookup, RecipeLookup, StockLookup, TypeMetadata};
use crate::models::{ProductionNode, StructureConfig, TypeId, round2};

#[derive(Debug, Clone, Default)]
pub struct PlanRequest {
    pub product_id: TypeId,
    pub quantity: u64,
    pub me_level: u8,
    pub excluded: Vec<TypeId>,
    pub structure: Option<StructureConfig>,
    /// Facility whose cost indices price the jobs. No facility, no install costs.
    pub facility_id: Option<i64>,
    pub decryptor_id: Option<TypeId>,
    /// Owner whose assets are checked for shortfalls.
    pub owner_id: Option<i64>,
    /// Overrides the configured maximum job duration.
    pub max_job_days: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductionPlan {
    pub tree: ProductionNode,
    pub summary: PlanSummary,
    pub invention: Option<InventionCostResult>,
    pub material_cost: f64,
    pub job_install_cost: f64,
    pub total_cost: f64,
}

impl std::fmt::Display for ProductionPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.summary)?;
        writeln!(f)?;
        if let Some(inv) = &self.invention {
            writeln!(
                f,
                "Invention: {} attempts at {:.1}% for {}-run copies (ME{} TE{}), {:.2} ISK",
                inv.expected_attempts,
                inv.probability * 100.0,
                inv.runs,
                inv.me_level,
                inv.te_level,
                inv.total_cost
            )?;
        }
        writeln!(
            f,
            "Longest job: {:>16.1} h",
            self.summary.longest_step_seconds() as f64 / 3600.0
        )?;
        writeln!(f, "Materials:   {:>16.2} ISK", self.material_cost)?;
        writeln!(f, "Job install: {:>16.2} ISK", self.job_install_cost)?;
        writeln!(f, "Total:       {:>16.2} ISK", self.total_cost)?;
        let per_unit = if self.summary.quantity == 0 {
            0.0
        } else {
            self.total_cost / self.summary.quantity as f64
        };
        writeln!(f, "Per unit:    {:>16.2} ISK", per_unit)
    }
}

pub struct Planner<'a> {
    recipes: &'a dyn RecipeLookup,
    prices: &'a dyn PriceLookup,
    costs: &'a dyn CostIndexLookup,
    types: &'a dyn TypeMetadata,
    stock: Option<&'a dyn StockLookup>,
    settings: &'a PlannerSettings,
}

impl<'a> Planner<'a> {
    pub fn new(
        recipes: &'a dyn RecipeLookup,
        prices: &'a dyn PriceLookup,
        costs: &'a dyn CostIndexLookup,
        types: &'a dyn TypeMetadata,
        settings: &'a PlannerSettings,
    ) -> Self {
        Self {
            recipes,
            prices,
            costs,
            types,
            stock: None,
            settings,
        }
    }

    pub fn with_stock(mut self, stock: &'a dyn StockLookup) -> Self {
        self.stock = Some(stock);
        self
    }

    pub fn plan(&self, request: &PlanRequest) -> Result<ProductionPlan, PlannerError> {
        if let Some(id) = request
            .decryptor_id
            .filter(|id| invention::decryptor_by_id(*id).is_none())
        {
            return Err(PlannerError::UnknownDecryptor(id));
        }

        let tree = TreeBuilder::new(self.recipes, self.types, self.settings).build_production_tree(
            request.product_id,
            request.quantity,
            request.me_level,
            &request.excluded,
            request.structure.as_ref(),
        )?;

        let mut summary = calculator::summarize(&tree, &self.settings.skills);
        let max_days = request
            .max_job_days
            .unwrap_or(self.settings.max_job_duration_days);
        summary.steps = jobs::split_steps(&summary.steps, max_days);

        if let (Some(stock), Some(owner)) = (self.stock, request.owner_id) {
            summary = summary.with_stock(&stock.get_aggregated_quantities(owner));
        }

        let invention = if tree.has_copy_step {
            let costed = self.invention_for(&tree, request);
            if costed.is_none() {
                warn!(product = request.product_id, "invention data incomplete, cost left out");
            }
            costed
        } else {
            None
        };

        let material_cost = summary.material_cost(self.prices);
        let job_install_cost = request
            .facility_id
            .map_or(0.0, |facility| self.job_install_cost(&summary, facility));
        let total_cost = round2(
            material_cost + job_install_cost + invention.as_ref().map_or(0.0, |i| i.total_cost),
        );

        info!(
            product = request.product_id,
            steps = summary.steps.len(),
            total_cost,
            "plan ready"
        );
        Ok(ProductionPlan {
            tree,
            summary,
            invention,
            material_cost,
            job_install_cost,
            total_cost,
        })
    }

    /// Enough successful inventions to cover the root's runs.
    fn invention_for(
        &self,
        tree: &ProductionNode,
        request: &PlanRequest,
    ) -> Option<InventionCostResult> {
        let engine = InventionEngine::new(self.recipes, self.prices, self.costs, self.settings);
        let facility = request.facility_id.unwrap_or_default();

        let single =
            engine.calculate_invention_cost(tree.product_id, facility, request.decryptor_id, 1)?;
        let successes = tree.runs.div_ceil(single.runs.max(1)).max(1);
        debug!(product = tree.product_id, successes, "costing invention");
        engine.calculate_invention_cost(tree.product_id, facility, request.decryptor_id, successes)
    }

    fn job_install_cost(&self, summary: &PlanSummary, facility_id: i64) -> f64 {
        let tax = self.costs.get_facility_tax(facility_id);
        let total: f64 = summary
            .steps
            .iter()
            .map(|step| {
                let materials = self.recipes.find_materials(step.blueprint_id, step.activity);
                let eiv = lookup::estimated_item_value(self.prices, &materials) * step.runs as f64;
                let index = self.costs.get_cost_index(facility_id, step.activity);
                lookup::install_cost(eiv, index, tax)
            })
            .sum();
        round2(total)
    }
}
