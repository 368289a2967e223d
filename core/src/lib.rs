//! Behavioral driver analysis: correlations, tipping points, personas
//! and demographic summaries over a flat per-user table.

pub mod analyzer;
pub mod config;
pub mod error;
pub mod persona;
pub mod record;
pub mod rng;
pub mod schema;
pub mod stats;
pub mod store;
pub mod summary;
pub mod synthetic;
pub mod tipping;
pub mod types;
