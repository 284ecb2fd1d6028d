//! Scheduler error types

use std::time::Duration;

use landfall_core::SyncError;
use landfall_domain::LandfallError;
use thiserror::Error;

use crate::errors::InfraError;

/// Scheduler-specific errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Scheduler is already running
    #[error("Scheduler already running")]
    AlreadyRunning,

    /// Scheduler is not running
    #[error("Scheduler not running")]
    NotRunning,

    /// Another pass holds the run lock
    #[error("A reconciliation pass is already in progress")]
    RunInProgress,

    /// Operation timed out
    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Task join failed
    #[error("Task join failed: {0}")]
    TaskJoinFailed(#[from] tokio::task::JoinError),

    /// A manually triggered pass failed
    #[error("Reconciliation pass failed: {0}")]
    Pass(#[from] SyncError),
}

impl From<SchedulerError> for InfraError {
    fn from(err: SchedulerError) -> Self {
        let landfall_err = match err {
            SchedulerError::AlreadyRunning
            | SchedulerError::NotRunning
            | SchedulerError::RunInProgress => LandfallError::InvalidInput(err.to_string()),
            _ => LandfallError::Internal(err.to_string()),
        };
        InfraError(landfall_err)
    }
}

impl From<SchedulerError> for LandfallError {
    fn from(err: SchedulerError) -> Self {
        InfraError::from(err).into()
    }
}

/// Convenience type alias for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;
