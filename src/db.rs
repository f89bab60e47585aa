//! Database schema and operations
//!
//! SQLite holds the reference data (types, recipes, prices, cost indices)
//! and the history used for profit matching. `Database` answers the
//! engine's lookup traits; a failing query is logged and degrades to
//! "unknown" rather than reaching the engine.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::warn;

use crate::lookup::{CostIndexLookup, PriceLookup, RecipeLookup, StockLookup, TypeMetadata};
use crate::models::{
    ActivityKind, AssetRecord, BlueprintRecipe, CostIndexRecord, FacilityRecord, IndustryJobRecord,
    MarketPrice, SaleTransactionRecord, TypeId, TypeInfo,
};

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS types (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            category TEXT
        );

        -- One row per blueprint activity
        CREATE TABLE IF NOT EXISTS recipes (
            blueprint_id INTEGER NOT NULL,
            activity TEXT NOT NULL,
            product_id INTEGER NOT NULL,
            output_per_run INTEGER NOT NULL,
            time_seconds INTEGER NOT NULL DEFAULT 0,
            probability REAL,
            PRIMARY KEY (blueprint_id, activity)
        );

        CREATE TABLE IF NOT EXISTS recipe_materials (
            blueprint_id INTEGER NOT NULL,
            activity TEXT NOT NULL,
            position INTEGER NOT NULL,
            material_id INTEGER NOT NULL,
            quantity INTEGER NOT NULL,
            PRIMARY KEY (blueprint_id, activity, position)
        );

        CREATE TABLE IF NOT EXISTS prices (
            type_id INTEGER PRIMARY KEY,
            sell REAL,
            buy REAL,
            adjusted REAL
        );

        CREATE TABLE IF NOT EXISTS cost_indices (
            facility_id INTEGER NOT NULL,
            activity TEXT NOT NULL,
            cost_index REAL NOT NULL,
            PRIMARY KEY (facility_id, activity)
        );

        CREATE TABLE IF NOT EXISTS facilities (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            tax_percent REAL NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS industry_jobs (
            job_id INTEGER PRIMARY KEY,
            owner_id INTEGER NOT NULL,
            blueprint_id INTEGER NOT NULL,
            product_id INTEGER NOT NULL,
            runs INTEGER NOT NULL,
            cost REAL NOT NULL,
            completed_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sales (
            transaction_id INTEGER PRIMARY KEY,
            owner_id INTEGER NOT NULL,
            product_id INTEGER NOT NULL,
            quantity INTEGER NOT NULL,
            unit_price REAL NOT NULL,
            occurred_at TEXT NOT NULL
        );

        -- Several stacks of the same type may exist per owner
        CREATE TABLE IF NOT EXISTS assets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id INTEGER NOT NULL,
            type_id INTEGER NOT NULL,
            quantity INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_recipes_product ON recipes(product_id, activity);
        CREATE INDEX IF NOT EXISTS idx_types_name ON types(name COLLATE NOCASE);
        CREATE INDEX IF NOT EXISTS idx_jobs_owner ON industry_jobs(owner_id);
        CREATE INDEX IF NOT EXISTS idx_sales_owner ON sales(owner_id);
        CREATE INDEX IF NOT EXISTS idx_assets_owner ON assets(owner_id);
        "#,
    )?;
    Ok(())
}

/// Insert or replace a type
pub fn upsert_type(conn: &Connection, info: &TypeInfo) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO types (id, name, category) VALUES (?1, ?2, ?3)",
        params![info.id, info.name, info.category],
    )?;
    Ok(())
}

/// Insert or replace a recipe together with its materials
pub fn upsert_recipe(conn: &Connection, recipe: &BlueprintRecipe) -> Result<()> {
    let activity = recipe.activity.as_str();
    conn.execute(
        "INSERT OR REPLACE INTO recipes (blueprint_id, activity, product_id, output_per_run, time_seconds, probability)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            recipe.blueprint_id,
            activity,
            recipe.product_id,
            recipe.output_per_run as i64,
            recipe.time_seconds as i64,
            recipe.probability,
        ],
    )?;
    conn.execute(
        "DELETE FROM recipe_materials WHERE blueprint_id = ?1 AND activity = ?2",
        params![recipe.blueprint_id, activity],
    )?;

    let mut stmt = conn.prepare_cached(
        "INSERT INTO recipe_materials (blueprint_id, activity, position, material_id, quantity)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for (position, (material_id, quantity)) in recipe.materials.iter().enumerate() {
        stmt.execute(params![
            recipe.blueprint_id,
            activity,
            position as i64,
            material_id,
            *quantity as i64
        ])?;
    }
    Ok(())
}

pub fn upsert_price(conn: &Connection, price: &MarketPrice) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO prices (type_id, sell, buy, adjusted) VALUES (?1, ?2, ?3, ?4)",
        params![price.type_id, price.sell, price.buy, price.adjusted],
    )?;
    Ok(())
}

pub fn upsert_cost_index(conn: &Connection, record: &CostIndexRecord) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO cost_indices (facility_id, activity, cost_index) VALUES (?1, ?2, ?3)",
        params![record.facility_id, record.activity.as_str(), record.cost_index],
    )?;
    Ok(())
}

pub fn upsert_facility(conn: &Connection, facility: &FacilityRecord) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO facilities (id, name, tax_percent) VALUES (?1, ?2, ?3)",
        params![facility.id, facility.name, facility.tax_percent],
    )?;
    Ok(())
}

pub fn upsert_job(conn: &Connection, owner_id: i64, job: &IndustryJobRecord) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO industry_jobs (job_id, owner_id, blueprint_id, product_id, runs, cost, completed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            job.job_id,
            owner_id,
            job.blueprint_id,
            job.product_id,
            job.runs as i64,
            job.cost,
            job.completed_at,
        ],
    )?;
    Ok(())
}

pub fn upsert_sale(conn: &Connection, owner_id: i64, sale: &SaleTransactionRecord) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO sales (transaction_id, owner_id, product_id, quantity, unit_price, occurred_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            sale.transaction_id,
            owner_id,
            sale.product_id,
            sale.quantity as i64,
            sale.unit_price,
            sale.occurred_at,
        ],
    )?;
    Ok(())
}

pub fn insert_asset(conn: &Connection, asset: &AssetRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO assets (owner_id, type_id, quantity) VALUES (?1, ?2, ?3)",
        params![asset.owner_id, asset.type_id, asset.quantity as i64],
    )?;
    Ok(())
}

/// Clear all imported data (for re-import)
pub fn clear_data(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DELETE FROM assets;
        DELETE FROM sales;
        DELETE FROM industry_jobs;
        DELETE FROM facilities;
        DELETE FROM cost_indices;
        DELETE FROM prices;
        DELETE FROM recipe_materials;
        DELETE FROM recipes;
        DELETE FROM types;
        "#,
    )?;
    Ok(())
}

fn activity_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<ActivityKind> {
    let text: String = row.get(idx)?;
    text.parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

fn count_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    Ok(row.get::<_, i64>(idx)?.max(0) as u64)
}

/// Log a failed lookup and fall back to "unknown".
fn degrade<T: Default>(result: Result<T>, lookup: &str) -> T {
    result.unwrap_or_else(|e| {
        warn!(error = %e, lookup, "lookup failed, treating as missing");
        T::default()
    })
}

/// A product that can be planned.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductEntry {
    pub id: TypeId,
    pub name: String,
    pub activity: ActivityKind,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database at `path` and make sure the schema exists.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn recipe(
        &self,
        product_id: TypeId,
        activity: ActivityKind,
    ) -> Result<Option<BlueprintRecipe>> {
        let header = self
            .conn
            .prepare_cached(
                "SELECT blueprint_id, output_per_run, time_seconds, probability
                 FROM recipes
                 WHERE product_id = ?1 AND activity = ?2
                 ORDER BY blueprint_id
                 LIMIT 1",
            )?
            .query_row(params![product_id, activity.as_str()], |row| {
                Ok((
                    row.get::<_, TypeId>(0)?,
                    count_at(row, 1)?,
                    count_at(row, 2)?,
                    row.get::<_, Option<f64>>(3)?,
                ))
            })
            .optional()?;

        let Some((blueprint_id, output_per_run, time_seconds, probability)) = header else {
            return Ok(None);
        };
        Ok(Some(BlueprintRecipe {
            blueprint_id,
            product_id,
            activity,
            output_per_run,
            time_seconds,
            probability,
            materials: self.materials(blueprint_id, activity)?,
        }))
    }

    pub fn materials(
        &self,
        blueprint_id: TypeId,
        activity: ActivityKind,
    ) -> Result<Vec<(TypeId, u64)>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT material_id, quantity
             FROM recipe_materials
             WHERE blueprint_id = ?1 AND activity = ?2
             ORDER BY position",
        )?;
        let rows = stmt.query_map(params![blueprint_id, activity.as_str()], |row| {
            Ok((row.get::<_, TypeId>(0)?, count_at(row, 1)?))
        })?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    pub fn price(&self, type_id: TypeId) -> Result<Option<MarketPrice>> {
        let price = self
            .conn
            .prepare_cached("SELECT sell, buy, adjusted FROM prices WHERE type_id = ?1")?
            .query_row([type_id], |row| {
                Ok(MarketPrice {
                    type_id,
                    sell: row.get(0)?,
                    buy: row.get(1)?,
                    adjusted: row.get(2)?,
                })
            })
            .optional()?;
        Ok(price)
    }

    fn price_map(
        &self,
        ids: &[TypeId],
        pick: fn(&MarketPrice) -> Option<f64>,
    ) -> Result<HashMap<TypeId, Option<f64>>> {
        let mut prices = HashMap::with_capacity(ids.len());
        for id in ids {
            prices.insert(*id, self.price(*id)?.as_ref().and_then(pick));
        }
        Ok(prices)
    }

    pub fn cost_index(&self, facility_id: i64, activity: ActivityKind) -> Result<Option<f64>> {
        let index = self
            .conn
            .prepare_cached(
                "SELECT cost_index FROM cost_indices WHERE facility_id = ?1 AND activity = ?2",
            )?
            .query_row(params![facility_id, activity.as_str()], |row| row.get(0))
            .optional()?;
        Ok(index)
    }

    pub fn facility_tax(&self, facility_id: i64) -> Result<Option<f64>> {
        let tax = self
            .conn
            .prepare_cached("SELECT tax_percent FROM facilities WHERE id = ?1")?
            .query_row([facility_id], |row| row.get(0))
            .optional()?;
        Ok(tax)
    }

    pub fn type_info(&self, id: TypeId) -> Result<Option<TypeInfo>> {
        let info = self
            .conn
            .prepare_cached("SELECT id, name, category FROM types WHERE id = ?1")?
            .query_row([id], |row| {
                Ok(TypeInfo {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    category: row.get(2)?,
                })
            })
            .optional()?;
        Ok(info)
    }

    /// Case-insensitive exact name match.
    pub fn find_type_by_name(&self, name: &str) -> Result<Option<TypeId>> {
        let id = self
            .conn
            .prepare_cached(
                "SELECT id FROM types WHERE name = ?1 COLLATE NOCASE ORDER BY id LIMIT 1",
            )?
            .query_row([name], |row| row.get(0))
            .optional()?;
        Ok(id)
    }

    pub fn stock(&self, owner_id: i64) -> Result<HashMap<TypeId, u64>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT type_id, SUM(quantity) FROM assets WHERE owner_id = ?1 GROUP BY type_id",
        )?;
        let rows =
            stmt.query_map([owner_id], |row| Ok((row.get::<_, TypeId>(0)?, count_at(row, 1)?)))?;

        let mut results = HashMap::new();
        for row in rows {
            let (id, qty) = row?;
            results.insert(id, qty);
        }
        Ok(results)
    }

    pub fn jobs_for_owner(&self, owner_id: i64) -> Result<Vec<IndustryJobRecord>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT job_id, blueprint_id, product_id, runs, cost, completed_at
             FROM industry_jobs
             WHERE owner_id = ?1
             ORDER BY completed_at, job_id",
        )?;
        let rows = stmt.query_map([owner_id], |row| {
            Ok(IndustryJobRecord {
                job_id: row.get(0)?,
                blueprint_id: row.get(1)?,
                product_id: row.get(2)?,
                runs: count_at(row, 3)?,
                cost: row.get(4)?,
                completed_at: row.get(5)?,
            })
        })?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    pub fn sales_for_owner(&self, owner_id: i64) -> Result<Vec<SaleTransactionRecord>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT transaction_id, product_id, quantity, unit_price, occurred_at
             FROM sales
             WHERE owner_id = ?1
             ORDER BY occurred_at, transaction_id",
        )?;
        let rows = stmt.query_map([owner_id], |row| {
            Ok(SaleTransactionRecord {
                transaction_id: row.get(0)?,
                product_id: row.get(1)?,
                quantity: count_at(row, 2)?,
                unit_price: row.get(3)?,
                occurred_at: row.get(4)?,
            })
        })?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    /// Everything with a manufacturing or reaction recipe, by name.
    pub fn list_products(&self) -> Result<Vec<ProductEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT r.product_id, COALESCE(t.name, ''), r.activity
             FROM recipes r
             LEFT JOIN types t ON t.id = r.product_id
             WHERE r.activity IN ('manufacturing', 'reaction')
             ORDER BY t.name, r.product_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ProductEntry {
                id: row.get(0)?,
                name: row.get(1)?,
                activity: activity_at(row, 2)?,
            })
        })?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }
}

impl RecipeLookup for Database {
    fn find_recipe_for_product(
        &self,
        product_id: TypeId,
        activity: ActivityKind,
    ) -> Option<BlueprintRecipe> {
        degrade(self.recipe(product_id, activity), "recipe")
    }

    fn find_materials(&self, blueprint_id: TypeId, activity: ActivityKind) -> Vec<(TypeId, u64)> {
        degrade(self.materials(blueprint_id, activity), "materials")
    }
}

impl PriceLookup for Database {
    fn get_prices(&self, ids: &[TypeId]) -> HashMap<TypeId, Option<f64>> {
        degrade(self.price_map(ids, |p| p.sell), "sell prices")
    }

    fn get_buy_prices(&self, ids: &[TypeId]) -> HashMap<TypeId, Option<f64>> {
        degrade(self.price_map(ids, |p| p.buy), "buy prices")
    }

    fn get_adjusted_price(&self, id: TypeId) -> Option<f64> {
        degrade(self.price(id), "adjusted price").and_then(|p| p.adjusted)
    }
}

impl CostIndexLookup for Database {
    fn get_cost_index(&self, facility_id: i64, activity: ActivityKind) -> Option<f64> {
        degrade(self.cost_index(facility_id, activity), "cost index")
    }

    fn get_facility_tax(&self, facility_id: i64) -> Option<f64> {
        degrade(self.facility_tax(facility_id), "facility tax")
    }
}

impl StockLookup for Database {
    fn get_aggregated_quantities(&self, owner_id: i64) -> HashMap<TypeId, u64> {
        degrade(self.stock(owner_id), "stock")
    }
}

impl TypeMetadata for Database {
    fn resolve_type_name(&self, id: TypeId) -> Option<String> {
        degrade(self.type_info(id), "type name").map(|t| t.name)
    }

    fn resolve_category(&self, id: TypeId) -> Option<String> {
        degrade(self.type_info(id), "category").and_then(|t| t.category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn recipe() -> BlueprintRecipe {
        BlueprintRecipe {
            blueprint_id: 691,
            product_id: 587,
            activity: ActivityKind::Manufacturing,
            output_per_run: 1,
            time_seconds: 6000,
            probability: None,
            materials: vec![(35, 8000), (34, 32000), (36, 2400)],
        }
    }

    #[test]
    fn recipe_round_trips_in_material_order() {
        let db = Database::open_in_memory().unwrap();
        upsert_recipe(db.conn(), &recipe()).unwrap();

        let loaded = db.find_recipe_for_product(587, ActivityKind::Manufacturing).unwrap();
        assert_eq!(loaded, recipe());
        assert!(db.find_recipe_for_product(587, ActivityKind::Reaction).is_none());
        assert_eq!(db.find_materials(691, ActivityKind::Manufacturing)[1], (34, 32000));
    }

    #[test]
    fn replacing_a_recipe_replaces_its_materials() {
        let db = Database::open_in_memory().unwrap();
        upsert_recipe(db.conn(), &recipe()).unwrap();
        upsert_recipe(
            db.conn(),
            &BlueprintRecipe {
                materials: vec![(34, 10)],
                ..recipe()
            },
        )
        .unwrap();
        assert_eq!(db.find_materials(691, ActivityKind::Manufacturing), vec![(34, 10)]);
    }

    #[test]
    fn prices_and_indices() {
        let db = Database::open_in_memory().unwrap();
        upsert_price(
            db.conn(),
            &MarketPrice {
                type_id: 34,
                sell: Some(5.0),
                buy: Some(4.5),
                adjusted: None,
            },
        )
        .unwrap();
        upsert_cost_index(
            db.conn(),
            &CostIndexRecord {
                facility_id: 1,
                activity: ActivityKind::Invention,
                cost_index: 0.07,
            },
        )
        .unwrap();
        upsert_facility(
            db.conn(),
            &FacilityRecord {
                id: 1,
                name: "Jita IV - Moon 4".to_string(),
                tax_percent: 10.0,
            },
        )
        .unwrap();

        assert_eq!(db.get_prices(&[34, 35]), HashMap::from([(34, Some(5.0)), (35, None)]));
        assert_eq!(db.get_buy_prices(&[34])[&34], Some(4.5));
        assert_eq!(db.get_adjusted_price(34), None);
        assert_eq!(db.get_cost_index(1, ActivityKind::Invention), Some(0.07));
        assert_eq!(db.get_cost_index(1, ActivityKind::Copying), None);
        assert_eq!(db.get_facility_tax(1), Some(10.0));
    }

    #[test]
    fn history_and_stock_per_owner() {
        let db = Database::open_in_memory().unwrap();
        let completed_at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let job = IndustryJobRecord {
            job_id: 1,
            blueprint_id: 691,
            product_id: 587,
            runs: 10,
            cost: 1000.0,
            completed_at,
        };
        upsert_job(db.conn(), 7, &job).unwrap();
        upsert_sale(
            db.conn(),
            8,
            &SaleTransactionRecord {
                transaction_id: 1,
                product_id: 587,
                quantity: 1,
                unit_price: 1.0,
                occurred_at: completed_at,
            },
        )
        .unwrap();
        insert_asset(db.conn(), &AssetRecord { owner_id: 7, type_id: 34, quantity: 100 }).unwrap();
        insert_asset(db.conn(), &AssetRecord { owner_id: 7, type_id: 34, quantity: 50 }).unwrap();

        assert_eq!(db.jobs_for_owner(7).unwrap(), vec![job]);
        assert!(db.sales_for_owner(7).unwrap().is_empty());
        assert_eq!(db.get_aggregated_quantities(7)[&34], 150);
    }

    #[test]
    fn type_lookup_by_name_ignores_case() {
        let db = Database::open_in_memory().unwrap();
        upsert_type(
            db.conn(),
            &TypeInfo {
                id: 587,
                name: "Rifter".to_string(),
                category: Some("frigate".to_string()),
            },
        )
        .unwrap();
        upsert_recipe(db.conn(), &recipe()).unwrap();

        assert_eq!(db.find_type_by_name("rifter").unwrap(), Some(587));
        assert_eq!(db.resolve_category(587).as_deref(), Some("frigate"));
        assert_eq!(db.display_name(9999), "Type 9999");
        let products = db.list_products().unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, "Rifter");
    }

    #[test]
    fn clear_empties_everything() {
        let db = Database::open_in_memory().unwrap();
        upsert_recipe(db.conn(), &recipe()).unwrap();
        clear_data(db.conn()).unwrap();
        assert!(db.list_products().unwrap().is_empty());
    }
}
