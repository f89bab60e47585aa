//! Industry Planner
//!
//! Production planning and costing for blueprint-based industry.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use industry_planner::bonus;
use industry_planner::calculator;
use industry_planner::config::PlannerSettings;
use industry_planner::db::{self, Database};
use industry_planner::import;
use industry_planner::invention::{self, InventionEngine};
use industry_planner::models::{SecurityClass, StructureConfig, StructureKind, TypeId};
use industry_planner::planner::{PlanRequest, Planner};
use industry_planner::profit::ProfitMatcher;
use industry_planner::sample;

#[derive(Parser)]
#[command(name = "industry-planner")]
#[command(about = "Production planning and costing for blueprint-based industry")]
struct Cli {
    /// Path to the SQLite database
    #[arg(short, long, default_value = "industry.db")]
    database: PathBuf,

    /// Planner settings (JSON); defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct StructureArgs {
    /// Name shown in reports
    #[arg(long)]
    structure_name: Option<String>,

    /// station, engineering_complex or refinery
    #[arg(long)]
    structure_kind: Option<StructureKind>,

    /// highsec, lowsec or nullsec
    #[arg(long, default_value = "highsec")]
    security: SecurityClass,

    /// Installed rig, e.g. "Standup M-Set Equipment Manufacturing Material Efficiency II"
    #[arg(long = "rig")]
    rigs: Vec<String>,
}

impl StructureArgs {
    fn to_config(&self) -> Option<StructureConfig> {
        if self.structure_kind.is_none() && self.rigs.is_empty() {
            return None;
        }
        Some(StructureConfig {
            name: self
                .structure_name
                .clone()
                .unwrap_or_else(|| "Structure".to_string()),
            kind: self.structure_kind.unwrap_or(StructureKind::Station),
            security: self.security,
            rigs: self.rigs.clone(),
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize empty database with schema
    Init,

    /// Load sample data for testing (without an import)
    LoadSample,

    /// Import reference data and history from *.jsonl files
    Import {
        /// Directory to scan
        dir: PathBuf,

        /// Clear existing data before import
        #[arg(long)]
        clear: bool,
    },

    /// Plan and cost the production of a product
    Plan {
        /// Product name or type ID
        product: String,

        #[arg(short, long, default_value_t = 1)]
        quantity: u64,

        /// ME of the root blueprint
        #[arg(long, default_value_t = 0)]
        me: u8,

        /// Buy these instead of building them (name or type ID, repeatable)
        #[arg(long)]
        exclude: Vec<String>,

        #[command(flatten)]
        structure: StructureArgs,

        /// Facility whose cost indices price the jobs
        #[arg(long)]
        facility: Option<i64>,

        /// Decryptor for the invention step (name or type ID)
        #[arg(long)]
        decryptor: Option<String>,

        /// Owner whose assets count towards the materials
        #[arg(long)]
        owner: Option<i64>,

        /// Maximum job duration in days
        #[arg(long)]
        max_days: Option<f64>,

        /// Show the full production tree
        #[arg(short, long)]
        verbose: bool,

        #[arg(long)]
        json: bool,
    },

    /// Cost the invention of a T2 blueprint
    Invention {
        /// Product name or type ID
        product: String,

        #[arg(long)]
        facility: i64,

        /// Decryptor name or type ID
        #[arg(long, conflicts_with = "all")]
        decryptor: Option<String>,

        /// Cost every decryptor option
        #[arg(long)]
        all: bool,

        #[arg(long, default_value_t = 1)]
        successes: u64,

        #[arg(long)]
        json: bool,
    },

    /// Show structure material and time bonuses
    Bonuses {
        #[command(flatten)]
        structure: StructureArgs,
    },

    /// Match completed jobs to sales and report realized profit
    Profit {
        /// Character or corporation ID
        subject: i64,

        #[arg(long)]
        json: bool,
    },

    /// List all products that can be planned
    ListProducts,
}

fn resolve_product(db: &Database, key: &str) -> Result<TypeId> {
    if let Ok(id) = key.parse::<TypeId>() {
        return Ok(id);
    }
    match db.find_type_by_name(key)? {
        Some(id) => Ok(id),
        None => bail!("Unknown product '{}'", key),
    }
}

fn resolve_decryptor(key: &str) -> Result<TypeId> {
    invention::find_decryptor(key)
        .map(|d| d.type_id)
        .with_context(|| format!("Unknown decryptor '{}'", key))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = PlannerSettings::load(cli.config.as_deref())?;
    let db = Database::open(&cli.database)?;

    match cli.command {
        Commands::Init => {
            println!("Database initialized at: {}", cli.database.display());
        }

        Commands::LoadSample => {
            let count = sample::load_sample_data(db.conn())?;
            println!("Loaded {} sample types", count);
        }

        Commands::Import { dir, clear } => {
            if clear {
                info!("clearing existing data");
                db::clear_data(db.conn())?;
            }
            let stats = import::import_directory(db.conn(), &dir)?;
            println!("{}", stats);
        }

        Commands::Plan {
            product,
            quantity,
            me,
            exclude,
            structure,
            facility,
            decryptor,
            owner,
            max_days,
            verbose,
            json,
        } => {
            let request = PlanRequest {
                product_id: resolve_product(&db, &product)?,
                quantity,
                me_level: me,
                excluded: exclude
                    .iter()
                    .map(|e| resolve_product(&db, e))
                    .collect::<Result<_>>()?,
                structure: structure.to_config(),
                facility_id: facility,
                decryptor_id: decryptor.as_deref().map(resolve_decryptor).transpose()?,
                owner_id: owner,
                max_job_days: max_days,
            };

            let planner = Planner::new(&db, &db, &db, &db, &settings).with_stock(&db);
            let plan = planner.plan(&request)?;

            if json {
                print_json(&plan)?;
            } else {
                if verbose {
                    println!("Production tree:\n");
                    println!("{}", calculator::format_tree(&plan.tree, 0));
                }
                print!("{}", plan);
            }
        }

        Commands::Invention {
            product,
            facility,
            decryptor,
            all,
            successes,
            json,
        } => {
            let product_id = resolve_product(&db, &product)?;
            let engine = InventionEngine::new(&db, &db, &db, &settings);
            if !engine.is_t2(product_id) {
                bail!("{} cannot be invented", product);
            }

            let mut options = if all {
                engine.build_decryptor_options(product_id, facility, successes)
            } else {
                let decryptor_id = decryptor.as_deref().map(resolve_decryptor).transpose()?;
                engine
                    .calculate_invention_cost(product_id, facility, decryptor_id, successes)
                    .into_iter()
                    .collect()
            };
            options.sort_by(|a, b| a.cost_per_run.total_cmp(&b.cost_per_run));

            if json {
                print_json(&options)?;
            } else {
                println!(
                    "{:<24} {:>7} {:>8} {:>4} {:>4} {:>5} {:>16} {:>14}",
                    "Decryptor", "Chance", "Attempts", "ME", "TE", "Runs", "Total (ISK)", "Per run"
                );
                println!("{}", "-".repeat(90));
                for o in options {
                    println!(
                        "{:<24} {:>6.1}% {:>8} {:>4} {:>4} {:>5} {:>16.2} {:>14.2}",
                        o.decryptor_name.as_deref().unwrap_or("(none)"),
                        o.probability * 100.0,
                        o.expected_attempts,
                        o.me_level,
                        o.te_level,
                        o.runs,
                        o.total_cost,
                        o.cost_per_run
                    );
                }
            }
        }

        Commands::Bonuses { structure } => {
            let Some(config) = structure.to_config() else {
                bail!("Pass --structure-kind and/or --rig to describe a structure");
            };
            println!("{:<20} {:>10} {:>10}", "Category", "Material", "Time");
            println!("{}", "-".repeat(42));
            for (category, material) in bonus::all_material_bonuses(&config) {
                println!(
                    "{:<20} {:>9.2}% {:>9.2}%",
                    category,
                    material,
                    bonus::time_bonus(&config, &category)
                );
            }
        }

        Commands::Profit { subject, json } => {
            let jobs = db.jobs_for_owner(subject)?;
            let sales = db.sales_for_owner(subject)?;
            if jobs.is_empty() && sales.is_empty() {
                println!("No jobs or sales for {}. Run 'import' or 'load-sample' first.", subject);
                return Ok(());
            }

            let report =
                ProfitMatcher::new(&db, &db, &settings).compute_matches(subject, &jobs, &sales);
            if json {
                print_json(&report)?;
            } else {
                print!("{}", report);
            }
        }

        Commands::ListProducts => {
            let products = db.list_products()?;
            if products.is_empty() {
                println!("No products in database. Run 'import' or 'load-sample' first.");
            } else {
                println!("{:<10} {:<40} {}", "Type ID", "Product", "Activity");
                println!("{}", "-".repeat(64));
                for p in products {
                    println!("{:<10} {:<40} {}", p.id, p.name, p.activity);
                }
            }
        }
    }

    Ok(())
}
