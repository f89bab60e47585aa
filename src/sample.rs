//! Built-in sample dataset
//!
//! A small, self-consistent slice of reference data for trying the planner
//! without an import: minerals, a T1 frigate and its inventable T2 hull, a
//! component built from a reaction product, market prices, one facility
//! and a short trading history.

use anyhow::Result;
use chrono::{TimeZone, Utc};
use rusqlite::Connection;
use tracing::info;

use crate::db;
use crate::invention::DECRYPTORS;
use crate::models::{
    ActivityKind, AssetRecord, BlueprintRecipe, CostIndexRecord, FacilityRecord, IndustryJobRecord,
    MarketPrice, SaleTransactionRecord, TypeId, TypeInfo,
};

pub const SAMPLE_FACILITY_ID: i64 = 1_035_466_617_946;
pub const SAMPLE_OWNER_ID: i64 = 90_000_001;

pub const RIFTER: TypeId = 587;
pub const WOLF: TypeId = 11371;
pub const PLASMA_THRUSTER: TypeId = 11532;
pub const CRYSTALLINE_CARBONIDE: TypeId = 16670;

const TYPES: &[(TypeId, &str, Option<&str>)] = &[
    (34, "Tritanium", None),
    (35, "Pyerite", None),
    (36, "Mexallon", None),
    (37, "Isogen", None),
    (38, "Nocxium", None),
    (39, "Zydrine", None),
    (40, "Megacyte", None),
    (16634, "Atmospheric Gases", None),
    (16640, "Cobalt", None),
    (4051, "Nitrogen Fuel Block", None),
    (20424, "Datacore - Mechanical Engineering", None),
    (20172, "Datacore - Minmatar Starship Engineering", None),
    (RIFTER, "Rifter", Some("frigate")),
    (691, "Rifter Blueprint", None),
    (WOLF, "Wolf", Some("frigate")),
    (11372, "Wolf Blueprint", None),
    (PLASMA_THRUSTER, "Plasma Thruster", Some("component")),
    (11533, "Plasma Thruster Blueprint", None),
    (CRYSTALLINE_CARBONIDE, "Crystalline Carbonide", Some("composite")),
    (46166, "Crystalline Carbonide Reaction Formula", None),
];

/// (sell, buy, adjusted)
const PRICES: &[(TypeId, f64, f64, f64)] = &[
    (34, 4.02, 3.85, 3.96),
    (35, 8.10, 7.60, 7.80),
    (36, 61.50, 58.00, 59.20),
    (37, 72.00, 68.50, 70.10),
    (38, 820.00, 790.00, 805.00),
    (39, 1_150.00, 1_090.00, 1_120.00),
    (40, 2_480.00, 2_390.00, 2_430.00),
    (16634, 70.00, 62.00, 66.00),
    (16640, 95.00, 88.00, 91.00),
    (4051, 17_500.00, 16_900.00, 17_100.00),
    (20424, 62_000.00, 58_500.00, 60_100.00),
    (20172, 71_000.00, 67_000.00, 69_300.00),
    (RIFTER, 560_000.00, 520_000.00, 495_000.00),
    (WOLF, 24_500_000.00, 22_800_000.00, 21_900_000.00),
    (PLASMA_THRUSTER, 34_000.00, 31_000.00, 32_500.00),
    (CRYSTALLINE_CARBONIDE, 310.00, 290.00, 300.00),
];

/// Decryptor market prices, in table order.
const DECRYPTOR_PRICES: [f64; 8] = [
    1_650_000.0,
    1_120_000.0,
    590_000.0,
    2_300_000.0,
    960_000.0,
    1_480_000.0,
    4_100_000.0,
    1_950_000.0,
];

fn recipes() -> Vec<BlueprintRecipe> {
    vec![
        BlueprintRecipe {
            blueprint_id: 691,
            product_id: RIFTER,
            activity: ActivityKind::Manufacturing,
            output_per_run: 1,
            time_seconds: 6000,
            probability: None,
            materials: vec![(34, 32_000), (35, 6_000), (36, 2_500), (37, 500)],
        },
        BlueprintRecipe {
            blueprint_id: 11372,
            product_id: WOLF,
            activity: ActivityKind::Manufacturing,
            output_per_run: 1,
            time_seconds: 18_000,
            probability: None,
            materials: vec![(RIFTER, 1), (PLASMA_THRUSTER, 15), (38, 90), (39, 40), (40, 16)],
        },
        BlueprintRecipe {
            blueprint_id: 691,
            product_id: 11372,
            activity: ActivityKind::Invention,
            output_per_run: 10,
            time_seconds: 63_900,
            probability: Some(0.34),
            materials: vec![(20424, 2), (20172, 2)],
        },
        BlueprintRecipe {
            blueprint_id: 11533,
            product_id: PLASMA_THRUSTER,
            activity: ActivityKind::Manufacturing,
            output_per_run: 1,
            time_seconds: 3600,
            probability: None,
            materials: vec![(CRYSTALLINE_CARBONIDE, 44), (38, 3)],
        },
        BlueprintRecipe {
            blueprint_id: 46166,
            product_id: CRYSTALLINE_CARBONIDE,
            activity: ActivityKind::Reaction,
            output_per_run: 10_000,
            time_seconds: 10_800,
            probability: None,
            materials: vec![(16634, 100), (16640, 100), (4051, 5)],
        },
    ]
}

/// Load sample reference data and history, replacing whatever is there
pub fn load_sample_data(conn: &Connection) -> Result<usize> {
    db::clear_data(conn)?;

    for (id, name, category) in TYPES {
        db::upsert_type(
            conn,
            &TypeInfo {
                id: *id,
                name: name.to_string(),
                category: category.map(str::to_string),
            },
        )?;
    }
    for decryptor in &DECRYPTORS {
        db::upsert_type(
            conn,
            &TypeInfo {
                id: decryptor.type_id,
                name: decryptor.name.to_string(),
                category: None,
            },
        )?;
    }

    for recipe in recipes() {
        db::upsert_recipe(conn, &recipe)?;
    }

    for (type_id, sell, buy, adjusted) in PRICES {
        db::upsert_price(
            conn,
            &MarketPrice {
                type_id: *type_id,
                sell: Some(*sell),
                buy: Some(*buy),
                adjusted: Some(*adjusted),
            },
        )?;
    }
    for (decryptor, price) in DECRYPTORS.iter().zip(DECRYPTOR_PRICES) {
        db::upsert_price(
            conn,
            &MarketPrice {
                type_id: decryptor.type_id,
                sell: Some(price),
                buy: Some(price * 0.9),
                adjusted: None,
            },
        )?;
    }

    db::upsert_facility(
        conn,
        &FacilityRecord {
            id: SAMPLE_FACILITY_ID,
            name: "Sample Azbel".to_string(),
            tax_percent: 1.0,
        },
    )?;
    for (activity, cost_index) in [
        (ActivityKind::Manufacturing, 0.0451),
        (ActivityKind::Reaction, 0.0312),
        (ActivityKind::Invention, 0.0697),
        (ActivityKind::Copying, 0.0521),
    ] {
        db::upsert_cost_index(
            conn,
            &CostIndexRecord {
                facility_id: SAMPLE_FACILITY_ID,
                activity,
                cost_index,
            },
        )?;
    }

    load_history(conn)?;

    let count = TYPES.len() + DECRYPTORS.len();
    info!(types = count, "sample data loaded");
    Ok(count)
}

fn load_history(conn: &Connection) -> Result<()> {
    // (job, runs, cost, day completed)
    let jobs = [
        (1_001, 5, 1_250_000.0, 3),
        (1_002, 10, 2_480_000.0, 9),
        (1_003, 4, 1_010_000.0, 20),
    ];
    for (job_id, runs, cost, day) in jobs {
        db::upsert_job(
            conn,
            SAMPLE_OWNER_ID,
            &IndustryJobRecord {
                job_id,
                blueprint_id: 11372,
                product_id: WOLF,
                runs,
                cost,
                completed_at: Utc
                    .with_ymd_and_hms(2026, 5, day, 14, 30, 0)
                    .single()
                    .unwrap_or_default(),
            },
        )?;
    }

    // (transaction, quantity, unit price, day)
    let sales = [
        (7_001, 3, 24_900_000.0, 4),
        (7_002, 4, 24_650_000.0, 8),
        (7_003, 6, 24_300_000.0, 12),
        (7_004, 2, 24_750_000.0, 15),
    ];
    for (transaction_id, quantity, unit_price, day) in sales {
        db::upsert_sale(
            conn,
            SAMPLE_OWNER_ID,
            &SaleTransactionRecord {
                transaction_id,
                product_id: WOLF,
                quantity,
                unit_price,
                occurred_at: Utc
                    .with_ymd_and_hms(2026, 5, day, 18, 0, 0)
                    .single()
                    .unwrap_or_default(),
            },
        )?;
    }

    for (type_id, quantity) in [(34, 1_500_000), (35, 120_000), (38, 400)] {
        db::insert_asset(
            conn,
            &AssetRecord {
                owner_id: SAMPLE_OWNER_ID,
                type_id,
                quantity,
            },
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::invention;
    use crate::lookup::{CostIndexLookup, StockLookup, TypeMetadata};

    #[test]
    fn sample_is_self_consistent() {
        let db = Database::open_in_memory().unwrap();
        let count = load_sample_data(db.conn()).unwrap();
        assert_eq!(count, TYPES.len() + 8);

        assert!(invention::is_t2(&db, WOLF));
        assert!(!invention::is_t2(&db, RIFTER));
        assert_eq!(db.resolve_category(CRYSTALLINE_CARBONIDE).as_deref(), Some("composite"));
        assert_eq!(db.get_cost_index(SAMPLE_FACILITY_ID, ActivityKind::Copying), Some(0.0521));
        assert_eq!(db.jobs_for_owner(SAMPLE_OWNER_ID).unwrap().len(), 3);
        assert_eq!(db.sales_for_owner(SAMPLE_OWNER_ID).unwrap().len(), 4);
        assert_eq!(db.resolve_type_name(34201).as_deref(), Some("Accelerant Decryptor"));
    }

    #[test]
    fn reloading_replaces_previous_data() {
        let db = Database::open_in_memory().unwrap();
        load_sample_data(db.conn()).unwrap();
        load_sample_data(db.conn()).unwrap();
        assert_eq!(db.list_products().unwrap().len(), 4);
        assert_eq!(db.get_aggregated_quantities(SAMPLE_OWNER_ID)[&34], 1_500_000);
    }
}
