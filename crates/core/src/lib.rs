//! # Landfall Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port interfaces (traits) for the upstream catalogue, the local store
//!   and the read-cache invalidator
//! - Record validation and the reconciliation diff
//! - The reconciliation pass service
//!
//! ## Architecture Principles
//! - Only depends on `landfall-common` and `landfall-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits

pub mod sync;

pub use sync::diff::{compute_diff, ChangeSet, Diff, DiffStats};
pub use sync::errors::SyncError;
pub use sync::ports::{CacheInvalidator, LandingRepository, LandingSource};
pub use sync::service::{PassReport, ReconciliationService, UpstreamRetryPolicy};
pub use sync::validator::RecordValidator;
