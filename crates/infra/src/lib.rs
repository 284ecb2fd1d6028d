//! # Landfall Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - SQLite landing store (rusqlite + r2d2)
//! - HTTP client for the upstream catalogue
//! - Read-query cache and its invalidator
//! - Configuration loader
//! - The scheduled reconciliation worker
//!
//! ## Architecture
//! - Implements traits defined in `landfall-core`
//! - Depends on `landfall-common`, `landfall-domain` and `landfall-core`
//! - Contains all "impure" code (I/O, timers)

pub mod cache;
pub mod config;
pub mod database;
pub mod errors;
pub mod integrations;
pub mod scheduling;

// Re-export commonly used items
pub use cache::LandingQueryCache;
pub use database::{CommitSummary, DbManager, SqliteLandingRepository};
pub use errors::InfraError;
pub use integrations::nasa::NasaLandingsClient;
pub use scheduling::{
    ReconciliationScheduler, ReconciliationSchedulerConfig, SchedulerError, SchedulerResult,
};
