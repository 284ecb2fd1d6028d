//! Pass-level error taxonomy

use landfall_common::resilience::RetryError;
use landfall_domain::LandfallError;
use thiserror::Error;

/// Why a reconciliation pass ended early
#[derive(Debug, Error)]
pub enum SyncError {
    /// Transient upstream failure that survived every retry
    #[error("upstream '{dependency}' failed after {attempts} attempts: {source}")]
    Upstream {
        dependency: String,
        attempts: u32,
        #[source]
        source: LandfallError,
    },

    /// Upstream payload could not be used; never retried
    #[error("upstream '{dependency}' returned an unusable payload: {source}")]
    Format {
        dependency: String,
        #[source]
        source: LandfallError,
    },

    /// Breaker rejected the call; upstream was not contacted
    #[error("circuit for '{dependency}' is open, upstream not contacted")]
    CircuitOpen { dependency: String },

    /// Local store failed while reading or applying changes
    #[error("storage failure during {stage}: {source}")]
    Storage {
        stage: &'static str,
        #[source]
        source: LandfallError,
    },

    #[error("reconciliation pass cancelled")]
    Cancelled,
}

impl SyncError {
    /// Stable label for logs
    pub fn category(&self) -> &'static str {
        match self {
            Self::Upstream { .. } => "upstream",
            Self::Format { .. } => "format",
            Self::CircuitOpen { .. } => "circuit_open",
            Self::Storage { .. } => "storage",
            Self::Cancelled => "cancelled",
        }
    }

    /// Map the outcome of a retried upstream call
    pub fn from_retry(dependency: &str, error: RetryError<LandfallError>) -> Self {
        let dependency = dependency.to_string();
        match error {
            RetryError::Cancelled { .. } => Self::Cancelled,
            RetryError::NonRetryable { source: source @ LandfallError::Format(_), .. } => {
                Self::Format { dependency, source }
            }
            RetryError::NonRetryable { attempt, source } => {
                Self::Upstream { dependency, attempts: attempt, source }
            }
            RetryError::Exhausted { attempts, source } => {
                Self::Upstream { dependency, attempts, source }
            }
        }
    }

    pub(crate) fn storage(stage: &'static str) -> impl FnOnce(LandfallError) -> Self {
        move |source| Self::Storage { stage, source }
    }
}
