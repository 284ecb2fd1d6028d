//! Scheduling infrastructure for the reconciliation worker
//!
//! The scheduler follows the runtime rules used across the workspace:
//! - Explicit lifecycle management (start/stop)
//! - Join handles for spawned tasks
//! - Cancellation token support
//! - Bounded waits on locks and joins
//! - Structured tracing

pub mod error;
pub mod reconciliation_scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use reconciliation_scheduler::{ReconciliationScheduler, ReconciliationSchedulerConfig};
