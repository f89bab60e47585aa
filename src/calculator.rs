//! Production tree calculator
//!
//! Expands a product into a tree of build steps and raw-material leaves,
//! then flattens and summarizes that tree.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, instrument};

use crate::bonus;
use crate::config::{PlannerSettings, SkillLevels};
use crate::error::PlannerError;
use crate::invention;
use crate::jobs;
use crate::lookup::{self, PriceLookup, RecipeLookup, TypeMetadata};
use crate::models::{
    ActivityKind, BlueprintRecipe, MaterialEdge, ProductionNode, ProductionStep, StructureConfig,
    TypeId, round2,
};

/// Quantity of one material needed for `runs` runs.
///
/// Manufacturing: `max(runs, ceil(round2(base × runs × (1 - me/100) × (1 - bonus/100))))`.
/// Reactions ignore ME and structure bonus and use `base × runs` exactly.
pub fn calculate_material(
    base_quantity: u64,
    runs: u64,
    me_level: u8,
    structure_bonus_percent: f64,
    activity: ActivityKind,
) -> u64 {
    if activity == ActivityKind::Reaction {
        return base_quantity.saturating_mul(runs);
    }
    let me_multiplier = 1.0 - me_level as f64 / 100.0;
    let structure_multiplier = 1.0 - structure_bonus_percent / 100.0;
    let reduced =
        round2(base_quantity as f64 * runs as f64 * me_multiplier * structure_multiplier).ceil();
    runs.max(reduced.max(0.0) as u64)
}

/// State shared by every level of one expansion.
struct Expansion<'s> {
    excluded: HashSet<TypeId>,
    structure: Option<&'s StructureConfig>,
}

/// Builds production trees from recipe and type lookups.
pub struct TreeBuilder<'a> {
    recipes: &'a dyn RecipeLookup,
    types: &'a dyn TypeMetadata,
    settings: &'a PlannerSettings,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(
        recipes: &'a dyn RecipeLookup,
        types: &'a dyn TypeMetadata,
        settings: &'a PlannerSettings,
    ) -> Self {
        Self {
            recipes,
            types,
            settings,
        }
    }

    /// Expand `product_id` into a full production tree.
    ///
    /// The root uses `me_level` and the configured root TE; every buildable
    /// intermediate assumes the configured intermediate ME/TE. Materials in
    /// `excluded_ids` stay leaves even when they could be built.
    #[instrument(skip(self, excluded_ids, structure))]
    pub fn build_production_tree(
        &self,
        product_id: TypeId,
        requested_quantity: u64,
        me_level: u8,
        excluded_ids: &[TypeId],
        structure: Option<&StructureConfig>,
    ) -> Result<ProductionNode, PlannerError> {
        let name = self
            .types
            .resolve_type_name(product_id)
            .ok_or(PlannerError::UnknownType(product_id))?;
        let recipe = self
            .recipes
            .find_producing_recipe(product_id)
            .ok_or(PlannerError::MissingRecipe { product_id })?;

        let expansion = Expansion {
            excluded: excluded_ids.iter().copied().collect(),
            structure,
        };
        let has_copy_step = invention::is_t2(self.recipes, product_id);

        self.expand(
            &expansion,
            recipe,
            name,
            requested_quantity,
            me_level,
            self.settings.root_te,
            0,
            has_copy_step,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn expand(
        &self,
        expansion: &Expansion<'_>,
        recipe: BlueprintRecipe,
        product_name: String,
        requested_quantity: u64,
        me_level: u8,
        te_level: u8,
        depth: usize,
        has_copy_step: bool,
    ) -> Result<ProductionNode, PlannerError> {
        if depth > self.settings.max_tree_depth {
            return Err(PlannerError::RecursionLimit {
                product_id: recipe.product_id,
                depth,
            });
        }

        let activity = recipe.activity;
        let output_per_run = recipe.output_per_run.max(1);
        let runs = requested_quantity.div_ceil(output_per_run);

        let (me_level, te_level) = match activity {
            ActivityKind::Reaction => (0, 0),
            _ => (me_level, te_level),
        };
        let category = self.types.resolve_category(recipe.product_id).unwrap_or_default();
        let (structure_bonus_percent, structure_time_bonus_percent) = match expansion.structure {
            Some(structure) => {
                let material = match activity {
                    ActivityKind::Reaction => 0.0,
                    _ => bonus::material_bonus(structure, &category).total,
                };
                (material, bonus::job_time_bonus(structure, &category, activity))
            }
            None => (0.0, 0.0),
        };

        debug!(
            product = recipe.product_id,
            %activity,
            runs,
            depth,
            bonus = structure_bonus_percent,
            "expanding node"
        );

        let mut materials = Vec::with_capacity(recipe.materials.len());
        for (material_id, base_quantity) in &recipe.materials {
            let quantity = calculate_material(
                *base_quantity,
                runs,
                me_level,
                structure_bonus_percent,
                activity,
            );
            let material_name = self.types.display_name(*material_id);
            let producing = self.recipes.find_producing_recipe(*material_id);
            let is_buildable = producing.is_some();

            let node = match producing {
                Some(child) if !expansion.excluded.contains(material_id) => {
                    Some(Box::new(self.expand(
                        expansion,
                        child,
                        material_name.clone(),
                        quantity,
                        self.settings.intermediate_me,
                        self.settings.intermediate_te,
                        depth + 1,
                        false,
                    )?))
                }
                _ => None,
            };

            materials.push(MaterialEdge {
                material_id: *material_id,
                material_name,
                quantity,
                is_buildable,
                node,
            });
        }

        Ok(ProductionNode {
            blueprint_id: recipe.blueprint_id,
            product_id: recipe.product_id,
            product_name,
            requested_quantity,
            runs,
            output_per_run,
            depth,
            activity,
            me_level,
            te_level,
            time_seconds: recipe.time_seconds,
            has_copy_step,
            materials,
            structure_bonus_percent,
            structure_time_bonus_percent,
            structure_name: expansion.structure.map(|s| s.name.clone()),
        })
    }
}

/// Consolidate the tree into one step per (product, activity).
///
/// Quantities of an intermediate used in several branches are summed and
/// its runs recomputed from the total. Steps come out deepest first, which
/// is a valid build order.
pub fn flatten_steps(tree: &ProductionNode, skills: &SkillLevels) -> Vec<ProductionStep> {
    let mut steps: BTreeMap<(TypeId, ActivityKind), ProductionStep> = BTreeMap::new();
    collect_steps(tree, skills, &mut steps);

    let mut steps: Vec<ProductionStep> = steps
        .into_values()
        .map(|mut step| {
            step.runs = step.quantity.div_ceil(step.output_per_run.max(1));
            step
        })
        .collect();
    steps.sort_by(|a, b| b.depth.cmp(&a.depth).then(a.product_id.cmp(&b.product_id)));
    steps
}

fn collect_steps(
    node: &ProductionNode,
    skills: &SkillLevels,
    steps: &mut BTreeMap<(TypeId, ActivityKind), ProductionStep>,
) {
    steps
        .entry((node.product_id, node.activity))
        .and_modify(|step| {
            step.quantity += node.requested_quantity;
            step.depth = step.depth.max(node.depth);
        })
        .or_insert_with(|| ProductionStep {
            activity: node.activity,
            blueprint_id: node.blueprint_id,
            product_id: node.product_id,
            product_name: node.product_name.clone(),
            runs: node.runs,
            quantity: node.requested_quantity,
            output_per_run: node.output_per_run,
            depth: node.depth,
            me_level: node.me_level,
            te_level: node.te_level,
            time_per_run_seconds: jobs::adjusted_time_per_run(
                node.time_seconds,
                node.te_level,
                node.structure_time_bonus_percent,
                skills.time_multiplier(node.activity),
            ),
            split_group_id: None,
            split_index: None,
        });

    for edge in &node.materials {
        if let Some(child) = &edge.node {
            collect_steps(child, skills, steps);
        }
    }
}

/// A leaf input the plan has to buy or already own.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawMaterial {
    pub type_id: TypeId,
    pub name: String,
    pub quantity: u64,
    /// Owned quantity, when stock was supplied.
    pub in_stock: Option<u64>,
}

impl RawMaterial {
    pub fn shortfall(&self) -> u64 {
        self.quantity.saturating_sub(self.in_stock.unwrap_or(0))
    }
}

/// Leaf quantities summed by type, including excluded buildables.
pub fn raw_materials(tree: &ProductionNode) -> Vec<RawMaterial> {
    let mut totals: BTreeMap<TypeId, RawMaterial> = BTreeMap::new();
    collect_raw(tree, &mut totals);
    totals.into_values().collect()
}

fn collect_raw(node: &ProductionNode, totals: &mut BTreeMap<TypeId, RawMaterial>) {
    for edge in &node.materials {
        match &edge.node {
            Some(child) => collect_raw(child, totals),
            None => {
                totals
                    .entry(edge.material_id)
                    .or_insert_with(|| RawMaterial {
                        type_id: edge.material_id,
                        name: edge.material_name.clone(),
                        quantity: 0,
                        in_stock: None,
                    })
                    .quantity += edge.quantity;
            }
        }
    }
}

/// Summary of a planned production chain
#[derive(Debug, Clone, Serialize)]
pub struct PlanSummary {
    pub product_id: TypeId,
    pub product_name: String,
    pub quantity: u64,
    pub has_copy_step: bool,
    pub steps: Vec<ProductionStep>,
    pub raw_materials: Vec<RawMaterial>,
}

/// Generate a summary of the production tree
pub fn summarize(tree: &ProductionNode, skills: &SkillLevels) -> PlanSummary {
    PlanSummary {
        product_id: tree.product_id,
        product_name: tree.product_name.clone(),
        quantity: tree.requested_quantity,
        has_copy_step: tree.has_copy_step,
        steps: flatten_steps(tree, skills),
        raw_materials: raw_materials(tree),
    }
}

impl PlanSummary {
    /// Attach owned quantities so shortfalls can be reported.
    pub fn with_stock(mut self, stock: &HashMap<TypeId, u64>) -> Self {
        for raw in &mut self.raw_materials {
            raw.in_stock = Some(stock.get(&raw.type_id).copied().unwrap_or(0));
        }
        self
    }

    /// Cost of buying every raw material at market sell prices.
    pub fn material_cost(&self, prices: &dyn PriceLookup) -> f64 {
        let quantities: Vec<(TypeId, u64)> = self
            .raw_materials
            .iter()
            .map(|r| (r.type_id, r.quantity))
            .collect();
        let ids: Vec<TypeId> = quantities.iter().map(|(id, _)| *id).collect();
        round2(lookup::priced_total(&quantities, &prices.get_prices(&ids)))
    }

    /// Longest single step, in seconds.
    pub fn longest_step_seconds(&self) -> u64 {
        self.steps
            .iter()
            .map(|s| s.runs * s.time_per_run_seconds)
            .max()
            .unwrap_or(0)
    }
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Production Plan ===")?;
        writeln!(f, "Target: {}x {} ({})", self.quantity, self.product_name, self.product_id)?;
        if self.has_copy_step {
            writeln!(f, "Requires blueprint copy + invention")?;
        }
        writeln!(f)?;

        writeln!(f, "Jobs (build order):")?;
        for step in &self.steps {
            let split = match (step.split_group_id, step.split_index) {
                (Some(group), Some(index)) => format!(" [split {}.{}]", group, index + 1),
                _ => String::new(),
            };
            writeln!(
                f,
                "  {:<13} {:>6} runs  {:>10}x {:<32} ME{:<2} TE{:<2} {:>8}s/run{}",
                step.activity.as_str(),
                step.runs,
                step.quantity,
                step.product_name,
                step.me_level,
                step.te_level,
                step.time_per_run_seconds,
                split
            )?;
        }
        writeln!(f)?;

        writeln!(f, "Raw materials:")?;
        for raw in &self.raw_materials {
            match raw.in_stock {
                Some(stock) => writeln!(
                    f,
                    "  {:>12}x {:<32} (have {}, need {})",
                    raw.quantity,
                    raw.name,
                    stock,
                    raw.shortfall()
                )?,
                None => writeln!(f, "  {:>12}x {}", raw.quantity, raw.name)?,
            }
        }

        Ok(())
    }
}

/// Format a production tree as an indented string
pub fn format_tree(node: &ProductionNode, indent: usize) -> String {
    let mut output = String::new();
    let prefix = "  ".repeat(indent);

    let bonus = if node.structure_bonus_percent > 0.0 {
        format!(", -{:.2}% materials", node.structure_bonus_percent)
    } else {
        String::new()
    };
    output.push_str(&format!(
        "{}{}x {} [{} {} runs, ME{} TE{}{}]\n",
        prefix,
        node.requested_quantity,
        node.product_name,
        node.activity,
        node.runs,
        node.me_level,
        node.te_level,
        bonus
    ));

    for edge in &node.materials {
        match &edge.node {
            Some(child) => output.push_str(&format_tree(child, indent + 1)),
            None => {
                let note = if edge.is_buildable { " (excluded)" } else { "" };
                output.push_str(&format!(
                    "{}  {}x {}{}\n",
                    prefix, edge.quantity, edge.material_name, note
                ));
            }
        }
    }

    output
}
