//! Production planning and costing engine
//!
//! Expands products into production trees, applies structure and rig
//! bonuses, costs invention, splits over-long jobs and matches completed
//! jobs against sales. Reference data comes in through the traits in
//! [`lookup`]; [`db::Database`] and [`catalog::Catalog`] implement them.

pub mod bonus;
pub mod calculator;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod import;
pub mod invention;
pub mod jobs;
pub mod lookup;
pub mod models;
pub mod planner;
pub mod profit;
pub mod sample;

pub use error::PlannerError;
