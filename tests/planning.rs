use industry_planner::config::PlannerSettings;
use industry_planner::db::Database;
use industry_planner::invention::{InventionEngine, find_decryptor};
use industry_planner::models::{ActivityKind, SecurityClass, StructureConfig, StructureKind};
use industry_planner::planner::{PlanRequest, Planner};
use industry_planner::profit::ProfitMatcher;
use industry_planner::sample::{
    self, CRYSTALLINE_CARBONIDE, PLASMA_THRUSTER, RIFTER, SAMPLE_FACILITY_ID, SAMPLE_OWNER_ID, WOLF,
};

fn sample_db() -> Database {
    let db = Database::open_in_memory().unwrap();
    sample::load_sample_data(db.conn()).unwrap();
    db
}

fn wolf_request() -> PlanRequest {
    PlanRequest {
        product_id: WOLF,
        quantity: 10,
        me_level: 2,
        ..PlanRequest::default()
    }
}

#[test]
fn plans_t2_hull_down_to_reactions() {
    let db = sample_db();
    let settings = PlannerSettings::default();
    let plan = Planner::new(&db, &db, &db, &db, &settings)
        .plan(&wolf_request())
        .unwrap();

    let steps = &plan.summary.steps;
    assert_eq!(steps.len(), 4);
    assert_eq!(steps[0].product_id, CRYSTALLINE_CARBONIDE);
    assert_eq!(steps[0].activity, ActivityKind::Reaction);
    assert_eq!(steps[0].runs, 1);
    assert_eq!(steps.last().unwrap().product_id, WOLF);

    let thrusters = steps.iter().find(|s| s.product_id == PLASMA_THRUSTER).unwrap();
    assert_eq!(thrusters.quantity, 147);
    let rifters = steps.iter().find(|s| s.product_id == RIFTER).unwrap();
    assert_eq!(rifters.runs, 10);

    let nocxium = plan.summary.raw_materials.iter().find(|r| r.type_id == 38).unwrap();
    // 882 for the hulls, 397 for the thrusters
    assert_eq!(nocxium.quantity, 1279);

    let invention = plan.invention.as_ref().unwrap();
    assert_eq!(invention.expected_attempts, 3);
    assert!(plan.total_cost > plan.material_cost);
}

#[test]
fn structure_and_rigs_reduce_materials() {
    let db = sample_db();
    let settings = PlannerSettings::default();
    let planner = Planner::new(&db, &db, &db, &db, &settings);
    let plan = planner
        .plan(&PlanRequest {
            structure: Some(StructureConfig {
                name: "Sample Raitaru".to_string(),
                kind: StructureKind::EngineeringComplex,
                security: SecurityClass::Nullsec,
                rigs: vec![
                    "Standup M-Set Basic Small Ship Manufacturing Material Efficiency II".to_string(),
                ],
            }),
            ..wolf_request()
        })
        .unwrap();

    // 1% base plus 2.4% × 2.1
    assert!((plan.tree.structure_bonus_percent - 6.04).abs() < 1e-9);
    assert_eq!(plan.tree.structure_name.as_deref(), Some("Sample Raitaru"));
    let nocxium_edge = plan.tree.materials.iter().find(|m| m.material_id == 38).unwrap();
    assert_eq!(nocxium_edge.quantity, 829);

    let reaction = plan
        .summary
        .steps
        .iter()
        .find(|s| s.activity == ActivityKind::Reaction)
        .unwrap();
    assert_eq!(reaction.me_level, 0);
}

#[test]
fn decryptor_options_are_fully_costed() {
    let db = sample_db();
    let settings = PlannerSettings::default();
    let engine = InventionEngine::new(&db, &db, &db, &settings);

    let options = engine.build_decryptor_options(WOLF, SAMPLE_FACILITY_ID, 1);
    assert_eq!(options.len(), 9);
    assert!(options.iter().all(|o| o.copy_job_cost > 0.0 && o.invention_install_cost > 0.0));

    let accelerant = find_decryptor("accelerant").unwrap();
    let with = engine
        .calculate_invention_cost(WOLF, SAMPLE_FACILITY_ID, Some(accelerant.type_id), 1)
        .unwrap();
    assert_eq!(with.runs, 11);
    assert_eq!(with.me_level, 4);
    assert!(with.decryptor_cost_per_attempt > 0.0);
}

#[test]
fn sample_history_matches_fifo() {
    let db = sample_db();
    let settings = PlannerSettings::default();
    let jobs = db.jobs_for_owner(SAMPLE_OWNER_ID).unwrap();
    let sales = db.sales_for_owner(SAMPLE_OWNER_ID).unwrap();

    let report =
        ProfitMatcher::new(&db, &db, &settings).compute_matches(SAMPLE_OWNER_ID, &jobs, &sales);
    assert_eq!(report.matches.len(), 5);
    assert_eq!(report.total_quantity_sold(), 15);
    let unsold: u64 = report.unmatched_jobs.iter().map(|j| j.remaining_units).sum();
    assert_eq!(unsold, 4);
    assert!(report.unmatched_sales.is_empty());
    assert!(report.warnings.is_empty());

    let first = &report.matches[0];
    assert_eq!((first.job_id, first.transaction_id), (1_001, Some(7_001)));
    assert_eq!(first.revenue, 74_700_000.0);
}

#[test]
fn plan_serializes_to_json() {
    let db = sample_db();
    let settings = PlannerSettings::default();
    let plan = Planner::new(&db, &db, &db, &db, &settings)
        .with_stock(&db)
        .plan(&PlanRequest {
            owner_id: Some(SAMPLE_OWNER_ID),
            facility_id: Some(SAMPLE_FACILITY_ID),
            ..wolf_request()
        })
        .unwrap();

    assert!(plan.job_install_cost > 0.0);
    let value = serde_json::to_value(&plan).unwrap();
    assert_eq!(value["tree"]["product_name"], "Wolf");
    assert_eq!(value["summary"]["steps"][0]["activity"], "reaction");
    let tritanium = plan.summary.raw_materials.iter().find(|r| r.type_id == 34).unwrap();
    assert_eq!(tritanium.in_stock, Some(1_500_000));
    assert_eq!(tritanium.shortfall(), 0);
}
