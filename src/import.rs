//! Reference data import from JSON Lines files
//!
//! Walks a directory for `*.jsonl` files and loads each one according to its
//! file stem (`types.jsonl`, `recipes.jsonl`, ...). Every line is one JSON
//! record. Lines that fail to parse are counted and skipped.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::db;
use crate::models::{
    AssetRecord, BlueprintRecipe, CostIndexRecord, FacilityRecord, IndustryJobRecord, MarketPrice,
    SaleTransactionRecord, TypeInfo,
};

/// History lines carry the owner next to the record itself.
#[derive(Debug, Deserialize)]
struct Owned<T> {
    owner_id: i64,
    #[serde(flatten)]
    record: T,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    Types,
    Recipes,
    Prices,
    CostIndices,
    Facilities,
    Jobs,
    Sales,
    Assets,
}

impl FileKind {
    fn from_path(path: &Path) -> Option<Self> {
        let stem = path.file_stem()?.to_str()?;
        match stem {
            "types" => Some(FileKind::Types),
            "recipes" => Some(FileKind::Recipes),
            "prices" => Some(FileKind::Prices),
            "cost_indices" => Some(FileKind::CostIndices),
            "facilities" => Some(FileKind::Facilities),
            "jobs" => Some(FileKind::Jobs),
            "sales" => Some(FileKind::Sales),
            "assets" => Some(FileKind::Assets),
            _ => None,
        }
    }
}

/// Find all *.jsonl files below `dir`, sorted by path
pub fn find_data_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        anyhow::bail!("{} is not a directory", dir.display());
    }

    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "jsonl"))
        .collect();
    files.sort();
    Ok(files)
}

/// Parse each non-blank line and hand it to `store`.
fn load_lines<T, F>(
    conn: &Connection,
    path: &Path,
    stats: &mut ImportStats,
    mut store: F,
) -> Result<usize>
where
    T: DeserializeOwned,
    F: FnMut(&Connection, T) -> Result<()>,
{
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let mut loaded = 0;
    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(line) {
            Ok(record) => {
                store(conn, record)?;
                loaded += 1;
            }
            Err(e) => {
                warn!(file = %path.display(), line = line_no + 1, error = %e, "skipping bad line");
                stats.bad_lines += 1;
            }
        }
    }
    Ok(loaded)
}

/// Import every recognised file below `dir` into the database
pub fn import_directory(conn: &Connection, dir: &Path) -> Result<ImportStats> {
    let mut stats = ImportStats::default();

    info!(dir = %dir.display(), "scanning for data files");
    let files = find_data_files(dir)?;
    info!(count = files.len(), "found data files");

    let tx = conn.unchecked_transaction()?;
    for path in &files {
        let Some(kind) = FileKind::from_path(path) else {
            debug!(file = %path.display(), "unrecognised file name");
            stats.skipped_files += 1;
            continue;
        };

        let loaded = match kind {
            FileKind::Types => {
                let n = load_lines(&tx, path, &mut stats, |c, t: TypeInfo| db::upsert_type(c, &t))?;
                stats.types += n;
                n
            }
            FileKind::Recipes => {
                let n = load_lines(&tx, path, &mut stats, |c, r: BlueprintRecipe| {
                    db::upsert_recipe(c, &r)
                })?;
                stats.recipes += n;
                n
            }
            FileKind::Prices => {
                let n = load_lines(&tx, path, &mut stats, |c, p: MarketPrice| {
                    db::upsert_price(c, &p)
                })?;
                stats.prices += n;
                n
            }
            FileKind::CostIndices => {
                let n = load_lines(&tx, path, &mut stats, |c, r: CostIndexRecord| {
                    db::upsert_cost_index(c, &r)
                })?;
                stats.cost_indices += n;
                n
            }
            FileKind::Facilities => {
                let n = load_lines(&tx, path, &mut stats, |c, f: FacilityRecord| {
                    db::upsert_facility(c, &f)
                })?;
                stats.facilities += n;
                n
            }
            FileKind::Jobs => {
                let n = load_lines(&tx, path, &mut stats, |c, j: Owned<IndustryJobRecord>| {
                    db::upsert_job(c, j.owner_id, &j.record)
                })?;
                stats.jobs += n;
                n
            }
            FileKind::Sales => {
                let n = load_lines(&tx, path, &mut stats, |c, s: Owned<SaleTransactionRecord>| {
                    db::upsert_sale(c, s.owner_id, &s.record)
                })?;
                stats.sales += n;
                n
            }
            FileKind::Assets => {
                let n = load_lines(&tx, path, &mut stats, |c, a: AssetRecord| {
                    db::insert_asset(c, &a)
                })?;
                stats.assets += n;
                n
            }
        };
        info!(file = %path.display(), records = loaded, "imported");
    }
    tx.commit()?;

    Ok(stats)
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub types: usize,
    pub recipes: usize,
    pub prices: usize,
    pub cost_indices: usize,
    pub facilities: usize,
    pub jobs: usize,
    pub sales: usize,
    pub assets: usize,
    pub skipped_files: usize,
    pub bad_lines: usize,
}

impl std::fmt::Display for ImportStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Imported {} types, {} recipes, {} prices, {} cost indices, {} facilities, {} jobs, {} sales, {} assets. Skipped files: {}, Bad lines: {}",
            self.types,
            self.recipes,
            self.prices,
            self.cost_indices,
            self.facilities,
            self.jobs,
            self.sales,
            self.assets,
            self.skipped_files,
            self.bad_lines
        )
    }
}
