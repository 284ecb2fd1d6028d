//! One reconciliation pass: fetch, diff, apply, invalidate
//!
//! The upstream fetch runs inside the dependency's circuit breaker, and the
//! breaker call wraps a full retry sequence, so an exhausted sequence counts
//! as a single breaker failure. Phases never overlap: the diff starts only
//! after the fetch has finished, storage is touched only after the diff, and
//! the cache is invalidated only after a successful commit.

use std::sync::Arc;

use chrono::Utc;
use landfall_common::resilience::{
    CircuitBreakerRegistry, Clock, ResilienceError, RetryConfig, RetryDecision, RetryError,
    RetryExecutor, RetryPolicy, SystemClock,
};
use landfall_domain::constants::UPSTREAM_DEPENDENCY;
use landfall_domain::{ExternalLanding, LandfallError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::diff::{compute_diff, ChangeSet, DiffStats};
use super::errors::SyncError;
use super::ports::{CacheInvalidator, LandingRepository, LandingSource};
use super::validator::RecordValidator;

/// Retry classification for upstream fetches.
///
/// Malformed payloads stop immediately. Transport and timeout failures are
/// retried, and so is everything else for now; tighten the catch-all arm to
/// blacklist further error kinds.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpstreamRetryPolicy;

impl RetryPolicy<LandfallError> for UpstreamRetryPolicy {
    fn should_retry(&self, error: &LandfallError, attempt: u32) -> RetryDecision {
        match error {
            LandfallError::Format(_) => RetryDecision::Stop,
            e if e.is_transient() => RetryDecision::Retry,
            other => {
                debug!(attempt, error = %other, "non-transient upstream error, retrying anyway");
                RetryDecision::Retry
            }
        }
    }
}

/// Summary of one completed pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Items in the upstream snapshot (0 for an empty or null fetch)
    pub fetched: usize,
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
    pub stats: DiffStats,
    pub cache_invalidated: bool,
}

impl PassReport {
    /// Whether the pass changed nothing in storage
    pub fn is_noop(&self) -> bool {
        self.added == 0 && self.updated == 0 && self.deleted == 0
    }
}

/// Reconciles the local store against the upstream catalogue
pub struct ReconciliationService<C: Clock = SystemClock> {
    source: Arc<dyn LandingSource>,
    repository: Arc<dyn LandingRepository>,
    invalidator: Arc<dyn CacheInvalidator>,
    breakers: Arc<CircuitBreakerRegistry<C>>,
    retry: RetryExecutor<UpstreamRetryPolicy>,
    validator: RecordValidator,
    dependency: String,
}

impl<C: Clock> ReconciliationService<C> {
    pub fn new(
        source: Arc<dyn LandingSource>,
        repository: Arc<dyn LandingRepository>,
        invalidator: Arc<dyn CacheInvalidator>,
        breakers: Arc<CircuitBreakerRegistry<C>>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            source,
            repository,
            invalidator,
            breakers,
            retry: RetryExecutor::new(retry, UpstreamRetryPolicy),
            validator: RecordValidator::new(),
            dependency: UPSTREAM_DEPENDENCY.to_string(),
        }
    }

    /// Use a different breaker / log name for the upstream dependency
    #[must_use]
    pub fn with_dependency_name(mut self, name: impl Into<String>) -> Self {
        self.dependency = name.into();
        self
    }

    /// Name under which the upstream breaker is registered
    pub fn dependency(&self) -> &str {
        &self.dependency
    }

    /// Breaker registry shared with operators for inspection and reset
    pub fn breakers(&self) -> &Arc<CircuitBreakerRegistry<C>> {
        &self.breakers
    }

    /// Run one full pass.
    ///
    /// An empty or null upstream snapshot is a no-op: nothing is deleted and
    /// the cache is left alone. If applying changes fails, staged work is
    /// discarded and the cache is not invalidated.
    #[instrument(skip_all, fields(dependency = %self.dependency))]
    pub async fn run_pass(&self, cancel: &CancellationToken) -> Result<PassReport, SyncError> {
        let upstream = match self.fetch(cancel).await? {
            Some(items) if !items.is_empty() => items,
            _ => {
                info!("upstream returned no data, pass skipped");
                return Ok(PassReport::default());
            }
        };

        let local =
            self.repository.read_all().await.map_err(SyncError::storage("read local snapshot"))?;
        debug!(upstream = upstream.len(), local = local.len(), "snapshots loaded, diffing");

        let diff = compute_diff(&upstream, &local, Utc::now(), &self.validator, cancel)?;
        let mut report = PassReport {
            fetched: upstream.len(),
            added: diff.changes.to_add.len(),
            updated: diff.changes.to_update.len(),
            deleted: diff.changes.to_delete.len(),
            stats: diff.stats,
            cache_invalidated: false,
        };

        if diff.changes.is_empty() {
            info!(
                fetched = report.fetched,
                unchanged = report.stats.unchanged,
                validation_errors = report.stats.validation_errors,
                "no changes to apply"
            );
            return Ok(report);
        }

        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        self.apply(&diff.changes).await?;
        self.invalidator.invalidate_all().await;
        report.cache_invalidated = true;

        info!(
            fetched = report.fetched,
            added = report.added,
            updated = report.updated,
            deleted = report.deleted,
            unchanged = report.stats.unchanged,
            skipped_missing_id = report.stats.skipped_missing_id,
            duplicates = report.stats.duplicates,
            validation_errors = report.stats.validation_errors,
            "reconciliation pass applied"
        );
        Ok(report)
    }

    async fn fetch(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<ExternalLanding>>, SyncError> {
        let result = self
            .breakers
            .execute_classified(
                &self.dependency,
                || self.retry.execute(|| self.source.fetch_snapshot(), cancel),
                |e: &RetryError<LandfallError>| !e.is_cancelled(),
            )
            .await;

        match result {
            Ok(items) => Ok(items),
            Err(ResilienceError::CircuitOpen { .. }) => {
                Err(SyncError::CircuitOpen { dependency: self.dependency.clone() })
            }
            Err(ResilienceError::OperationFailed { source }) => {
                Err(SyncError::from_retry(&self.dependency, source))
            }
        }
    }

    async fn apply(&self, changes: &ChangeSet) -> Result<(), SyncError> {
        let staged = async {
            let repo = &self.repository;
            if !changes.to_add.is_empty() {
                repo.bulk_insert(&changes.to_add).await.map_err(SyncError::storage("insert"))?;
            }
            if !changes.to_update.is_empty() {
                repo.bulk_update(&changes.to_update).await.map_err(SyncError::storage("update"))?;
            }
            if !changes.to_delete.is_empty() {
                repo.bulk_delete(&changes.to_delete).await.map_err(SyncError::storage("delete"))?;
            }
            self.repository.commit().await.map_err(SyncError::storage("commit"))
        };

        if let Err(err) = staged.await {
            error!(
                error = %err,
                changes = changes.len(),
                "applying changes failed, discarding staged work"
            );
            if let Err(discard) = self.repository.discard_pending().await {
                warn!(error = %discard, "failed to discard staged changes");
            }
            return Err(err);
        }
        Ok(())
    }
}
