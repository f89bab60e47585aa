//! Realized profit from completed jobs and market sales
//!
//! Output of completed jobs is paired with sales first-in-first-out, per
//! product. Completion order is taken as production order, which is an
//! approximation when several builders make the same item in parallel; the
//! result is an estimate, not an accounting ledger.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;
use tracing::debug;

use crate::config::PlannerSettings;
use crate::lookup::{PriceLookup, RecipeLookup};
use crate::models::{
    IndustryJobRecord, ProfitMatch, SaleTransactionRecord, StaleDataWarning, TypeId, round2,
};

/// Job output that no sale consumed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnmatchedJob {
    pub job_id: i64,
    pub product_id: TypeId,
    pub remaining_units: u64,
}

/// Sold quantity that no job output explains.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnmatchedSale {
    pub transaction_id: i64,
    pub product_id: TypeId,
    pub remaining_units: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfitReport {
    pub subject_id: i64,
    pub matches: Vec<ProfitMatch>,
    pub unmatched_jobs: Vec<UnmatchedJob>,
    pub unmatched_sales: Vec<UnmatchedSale>,
    pub warnings: Vec<StaleDataWarning>,
}

impl ProfitReport {
    pub fn total_quantity_sold(&self) -> u64 {
        self.matches.iter().map(|m| m.quantity_sold).sum()
    }

    pub fn total_revenue(&self) -> f64 {
        round2(self.matches.iter().map(|m| m.revenue).sum())
    }

    pub fn total_cost(&self) -> f64 {
        round2(
            self.matches
                .iter()
                .map(|m| m.material_cost + m.job_install_cost + m.tax_amount)
                .sum(),
        )
    }

    pub fn total_profit(&self) -> f64 {
        round2(self.matches.iter().map(|m| m.profit).sum())
    }

    pub fn is_stale(&self) -> bool {
        !self.warnings.is_empty()
    }
}

impl std::fmt::Display for ProfitReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Realized Profit for {} ===", self.subject_id)?;
        writeln!(
            f,
            "{:>10} {:>12} {:>8} {:>14} {:>14} {:>14} {:>12} {:>14}",
            "Job", "Transaction", "Qty", "Revenue", "Materials", "Install", "Tax", "Profit"
        )?;
        for m in &self.matches {
            writeln!(
                f,
                "{:>10} {:>12} {:>8} {:>14.2} {:>14.2} {:>14.2} {:>12.2} {:>14.2}",
                m.job_id,
                m.transaction_id.map(|t| t.to_string()).unwrap_or_default(),
                m.quantity_sold,
                m.revenue,
                m.material_cost,
                m.job_install_cost,
                m.tax_amount,
                m.profit
            )?;
        }
        writeln!(f)?;
        writeln!(f, "Sold:    {} units", self.total_quantity_sold())?;
        writeln!(f, "Revenue: {:.2}", self.total_revenue())?;
        writeln!(f, "Cost:    {:.2}", self.total_cost())?;
        writeln!(f, "Profit:  {:.2}", self.total_profit())?;

        if !self.unmatched_jobs.is_empty() {
            let units: u64 = self.unmatched_jobs.iter().map(|j| j.remaining_units).sum();
            writeln!(
                f,
                "Unsold output: {} units across {} jobs",
                units,
                self.unmatched_jobs.len()
            )?;
        }
        for warning in &self.warnings {
            writeln!(f, "warning: {}", warning)?;
        }
        Ok(())
    }
}

/// Per-job figures needed while matching.
struct JobSupply<'j> {
    job: &'j IndustryJobRecord,
    output: u64,
    /// (material, total quantity consumed by the whole job)
    materials: Vec<(TypeId, u64)>,
}

/// Job supplies and sales of one product, both in FIFO order.
type ProductLots<'s, 'j> = (Vec<&'s JobSupply<'j>>, Vec<&'s SaleTransactionRecord>);

pub struct ProfitMatcher<'a> {
    recipes: &'a dyn RecipeLookup,
    prices: &'a dyn PriceLookup,
    settings: &'a PlannerSettings,
}

impl<'a> ProfitMatcher<'a> {
    pub fn new(
        recipes: &'a dyn RecipeLookup,
        prices: &'a dyn PriceLookup,
        settings: &'a PlannerSettings,
    ) -> Self {
        Self {
            recipes,
            prices,
            settings,
        }
    }

    /// FIFO-match `jobs` against `sales` independently for every product.
    pub fn compute_matches(
        &self,
        subject_id: i64,
        jobs: &[IndustryJobRecord],
        sales: &[SaleTransactionRecord],
    ) -> ProfitReport {
        let mut report = ProfitReport {
            subject_id,
            matches: Vec::new(),
            unmatched_jobs: Vec::new(),
            unmatched_sales: Vec::new(),
            warnings: Vec::new(),
        };

        let mut supplies: Vec<JobSupply<'_>> =
            jobs.iter().map(|job| self.supply_for(job, &mut report)).collect();
        supplies.sort_by(|a, b| {
            a.job
                .completed_at
                .cmp(&b.job.completed_at)
                .then(a.job.job_id.cmp(&b.job.job_id))
        });
        let mut sales: Vec<&SaleTransactionRecord> = sales.iter().collect();
        sales.sort_by(|a, b| {
            a.occurred_at
                .cmp(&b.occurred_at)
                .then(a.transaction_id.cmp(&b.transaction_id))
        });

        let buy_prices = self.material_prices(&supplies, &mut report);

        let mut by_product: BTreeMap<TypeId, ProductLots<'_, '_>> = BTreeMap::new();
        for supply in &supplies {
            by_product.entry(supply.job.product_id).or_default().0.push(supply);
        }
        for sale in sales {
            by_product.entry(sale.product_id).or_default().1.push(sale);
        }

        for (product_id, (product_jobs, product_sales)) in by_product {
            self.match_product(product_id, &product_jobs, &product_sales, &buy_prices, &mut report);
        }

        report
    }

    fn supply_for<'j>(
        &self,
        job: &'j IndustryJobRecord,
        report: &mut ProfitReport,
    ) -> JobSupply<'j> {
        let Some(recipe) = self.recipes.find_producing_recipe(job.product_id) else {
            report.warnings.push(StaleDataWarning::MissingRecipe {
                job_id: job.job_id,
                blueprint_id: job.blueprint_id,
            });
            return JobSupply {
                job,
                output: job.runs,
                materials: Vec::new(),
            };
        };

        let mut base = self.recipes.find_materials(job.blueprint_id, recipe.activity);
        if base.is_empty() {
            base = recipe.materials;
        }
        JobSupply {
            job,
            output: job.runs * recipe.output_per_run.max(1),
            materials: base
                .into_iter()
                .map(|(id, qty)| (id, qty * job.runs))
                .collect(),
        }
    }

    fn material_prices(
        &self,
        supplies: &[JobSupply<'_>],
        report: &mut ProfitReport,
    ) -> HashMap<TypeId, f64> {
        let ids: BTreeSet<TypeId> = supplies
            .iter()
            .flat_map(|s| s.materials.iter().map(|(id, _)| *id))
            .collect();
        let ids: Vec<TypeId> = ids.into_iter().collect();

        let mut prices = HashMap::with_capacity(ids.len());
        let found = self.prices.get_buy_prices(&ids);
        for id in ids {
            match found.get(&id).copied().flatten() {
                Some(price) => {
                    prices.insert(id, price);
                }
                None => report.warnings.push(StaleDataWarning::MissingPrice { type_id: id }),
            }
        }
        prices
    }

    fn match_product(
        &self,
        product_id: TypeId,
        jobs: &[&JobSupply<'_>],
        sales: &[&SaleTransactionRecord],
        buy_prices: &HashMap<TypeId, f64>,
        report: &mut ProfitReport,
    ) {
        let mut job_idx = 0;
        let mut sale_idx = 0;
        let mut job_left = jobs.first().map_or(0, |j| j.output);
        let mut sale_left = sales.first().map_or(0, |s| s.quantity);

        while job_idx < jobs.len() && sale_idx < sales.len() {
            if job_left == 0 {
                job_idx += 1;
                job_left = jobs.get(job_idx).map_or(0, |j| j.output);
                continue;
            }
            if sale_left == 0 {
                sale_idx += 1;
                sale_left = sales.get(sale_idx).map_or(0, |s| s.quantity);
                continue;
            }

            let supply = jobs[job_idx];
            let sale = sales[sale_idx];
            let quantity = job_left.min(sale_left);
            report.matches.push(self.price_match(supply, sale, quantity, buy_prices));
            debug!(
                product_id,
                job = supply.job.job_id,
                transaction = sale.transaction_id,
                quantity,
                "matched"
            );

            job_left -= quantity;
            sale_left -= quantity;
        }

        if job_idx < jobs.len() {
            if job_left > 0 {
                report.unmatched_jobs.push(UnmatchedJob {
                    job_id: jobs[job_idx].job.job_id,
                    product_id,
                    remaining_units: job_left,
                });
            }
            for supply in jobs.iter().skip(job_idx + 1).filter(|s| s.output > 0) {
                report.unmatched_jobs.push(UnmatchedJob {
                    job_id: supply.job.job_id,
                    product_id,
                    remaining_units: supply.output,
                });
            }
        }

        if sale_idx < sales.len() {
            let mut unexplained = 0;
            if sale_left > 0 {
                unexplained += sale_left;
                report.unmatched_sales.push(UnmatchedSale {
                    transaction_id: sales[sale_idx].transaction_id,
                    product_id,
                    remaining_units: sale_left,
                });
            }
            for sale in sales.iter().skip(sale_idx + 1).filter(|s| s.quantity > 0) {
                unexplained += sale.quantity;
                report.unmatched_sales.push(UnmatchedSale {
                    transaction_id: sale.transaction_id,
                    product_id,
                    remaining_units: sale.quantity,
                });
            }
            if unexplained > 0 {
                report.warnings.push(StaleDataWarning::UnexplainedSales {
                    product_id,
                    quantity: unexplained,
                });
            }
        }
    }

    fn price_match(
        &self,
        supply: &JobSupply<'_>,
        sale: &SaleTransactionRecord,
        quantity: u64,
        buy_prices: &HashMap<TypeId, f64>,
    ) -> ProfitMatch {
        let share = quantity as f64 / supply.output as f64;

        let revenue = round2(sale.unit_price * quantity as f64);
        let material_cost = round2(
            supply
                .materials
                .iter()
                .map(|(id, qty)| *qty as f64 * share * buy_prices.get(id).copied().unwrap_or(0.0))
                .sum(),
        );
        let job_install_cost = round2(supply.job.cost * share);
        let tax_amount = round2(revenue * self.settings.sales_tax_percent / 100.0);
        let profit = round2(revenue - material_cost - job_install_cost - tax_amount);

        ProfitMatch {
            job_id: supply.job.job_id,
            transaction_id: Some(sale.transaction_id),
            product_id: sale.product_id,
            quantity_sold: quantity,
            revenue,
            material_cost,
            job_install_cost,
            tax_amount,
            profit,
        }
    }
}
