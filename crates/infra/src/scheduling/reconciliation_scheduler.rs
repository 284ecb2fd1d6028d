//! Scheduled reconciliation worker
//!
//! Runs one reconciliation pass immediately after `start()` and then once
//! per interval until stopped. Every pass, scheduled or manual, goes through
//! a single run lock acquired with a bounded wait, so passes never overlap:
//! a tick that cannot get the lock in time is skipped and logged, and a
//! manual `run_now()` fails with [`SchedulerError::RunInProgress`].
//!
//! Pass failures are logged and never stop the loop.

use std::sync::Arc;
use std::time::Duration;

use landfall_common::resilience::{CircuitBreakerRegistry, CircuitState, Clock, SystemClock};
use landfall_core::{PassReport, ReconciliationService, SyncError};
use landfall_domain::SyncConfig;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// Type alias for task handle to avoid complexity warnings
type TaskHandle = Arc<Mutex<Option<JoinHandle<()>>>>;

/// Configuration for the reconciliation scheduler
#[derive(Debug, Clone)]
pub struct ReconciliationSchedulerConfig {
    /// Delay between the end of one tick and the start of the next
    pub interval: Duration,
    /// How long a tick waits for the run lock before skipping
    pub run_lock_timeout: Duration,
    /// How long `stop()` waits for the loop to finish
    pub join_timeout: Duration,
}

impl Default for ReconciliationSchedulerConfig {
    fn default() -> Self {
        Self::from_sync_config(&SyncConfig::default())
    }
}

impl ReconciliationSchedulerConfig {
    /// Derive the schedule from the `sync` config section.
    pub fn from_sync_config(config: &SyncConfig) -> Self {
        Self {
            interval: config.interval(),
            run_lock_timeout: config.run_lock_timeout(),
            join_timeout: Duration::from_secs(5),
        }
    }
}

/// Periodic driver for [`ReconciliationService`]
pub struct ReconciliationScheduler<C: Clock = SystemClock> {
    service: Arc<ReconciliationService<C>>,
    config: ReconciliationSchedulerConfig,
    run_lock: Arc<Mutex<()>>,
    cancellation_token: CancellationToken,
    task_handle: TaskHandle,
}

impl<C: Clock> ReconciliationScheduler<C> {
    /// Create a stopped scheduler.
    pub fn new(
        service: Arc<ReconciliationService<C>>,
        config: ReconciliationSchedulerConfig,
    ) -> Self {
        Self {
            service,
            config,
            run_lock: Arc::new(Mutex::new(())),
            cancellation_token: CancellationToken::new(),
            task_handle: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the scheduler
    ///
    /// Spawns the background loop; the first pass runs right away.
    ///
    /// # Errors
    ///
    /// Returns error if scheduler is already running
    #[instrument(skip(self), fields(interval_secs = self.config.interval.as_secs()))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        info!("Starting reconciliation scheduler");

        // Fresh token so the scheduler can be restarted after stop()
        self.cancellation_token = CancellationToken::new();

        let service = Arc::clone(&self.service);
        let run_lock = Arc::clone(&self.run_lock);
        let config = self.config.clone();
        let cancel = self.cancellation_token.clone();

        let handle = tokio::spawn(async move {
            Self::run_loop(service, run_lock, config, cancel).await;
        });

        *self.task_handle.lock().await = Some(handle);

        info!("Reconciliation scheduler started");
        Ok(())
    }

    /// Stop the scheduler gracefully
    ///
    /// Cancels the background task (including an in-flight pass) and awaits
    /// completion.
    ///
    /// # Errors
    ///
    /// Returns error if scheduler is not running, or if the loop does not
    /// finish within the join timeout
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        info!("Stopping reconciliation scheduler");
        self.cancellation_token.cancel();

        if let Some(handle) = self.task_handle.lock().await.take() {
            let duration = self.config.join_timeout;
            tokio::time::timeout(duration, handle)
                .await
                .map_err(|_| SchedulerError::Timeout { duration })??;
        }

        info!("Reconciliation scheduler stopped");
        Ok(())
    }

    /// Check if scheduler is running
    ///
    /// A scheduler is considered running if it has an active task handle that
    /// hasn't finished.
    pub fn is_running(&self) -> bool {
        self.task_handle
            .try_lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    /// Trigger one pass outside the schedule.
    ///
    /// Waits at most the run-lock timeout for a scheduled pass to finish.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::RunInProgress`] when the lock is still held, or
    /// [`SchedulerError::Pass`] when the pass itself fails
    #[instrument(skip(self))]
    pub async fn run_now(&self) -> SchedulerResult<PassReport> {
        let cancel = if self.cancellation_token.is_cancelled() {
            CancellationToken::new()
        } else {
            self.cancellation_token.child_token()
        };

        let _guard = tokio::time::timeout(self.config.run_lock_timeout, self.run_lock.lock())
            .await
            .map_err(|_| SchedulerError::RunInProgress)?;

        info!("Manual reconciliation pass triggered");
        Ok(self.service.run_pass(&cancel).await?)
    }

    /// Breaker registry shared with the service
    pub fn breakers(&self) -> &Arc<CircuitBreakerRegistry<C>> {
        self.service.breakers()
    }

    /// Current state of the upstream circuit
    pub fn circuit_state(&self) -> CircuitState {
        self.breakers().state(self.service.dependency())
    }

    /// Force the upstream circuit closed. Returns `false` if it was never
    /// used.
    pub fn reset_circuit(&self) -> bool {
        let reset = self.breakers().reset(self.service.dependency());
        if reset {
            info!(dependency = self.service.dependency(), "upstream circuit reset by operator");
        }
        reset
    }

    async fn run_loop(
        service: Arc<ReconciliationService<C>>,
        run_lock: Arc<Mutex<()>>,
        config: ReconciliationSchedulerConfig,
        cancel: CancellationToken,
    ) {
        loop {
            Self::tick(&service, &run_lock, config.run_lock_timeout, &cancel).await;

            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("Reconciliation loop cancelled");
                    break;
                }
                () = tokio::time::sleep(config.interval) => {}
            }
        }
    }

    async fn tick(
        service: &ReconciliationService<C>,
        run_lock: &Mutex<()>,
        lock_timeout: Duration,
        cancel: &CancellationToken,
    ) {
        let Ok(_guard) = tokio::time::timeout(lock_timeout, run_lock.lock()).await else {
            warn!(
                wait_ms = u64::try_from(lock_timeout.as_millis()).unwrap_or(u64::MAX),
                "previous pass still running, tick skipped"
            );
            return;
        };

        match service.run_pass(cancel).await {
            Ok(report) => debug!(
                added = report.added,
                updated = report.updated,
                deleted = report.deleted,
                "scheduled pass finished"
            ),
            Err(err) => log_pass_error(service.dependency(), &err),
        }
    }
}

fn log_pass_error(dependency: &str, err: &SyncError) {
    match err {
        SyncError::CircuitOpen { .. } => {
            warn!(dependency, category = err.category(), "circuit open, pass skipped");
        }
        SyncError::Cancelled => info!(dependency, "pass cancelled"),
        SyncError::Upstream { attempts, .. } => error!(
            dependency,
            category = err.category(),
            attempts,
            error = %err,
            "pass failed"
        ),
        SyncError::Format { .. } | SyncError::Storage { .. } => {
            error!(dependency, category = err.category(), error = %err, "pass failed");
        }
    }
}

/// Ensure scheduler is stopped when dropped
impl<C: Clock> Drop for ReconciliationScheduler<C> {
    fn drop(&mut self) {
        if !self.cancellation_token.is_cancelled() && self.is_running() {
            warn!("ReconciliationScheduler dropped while running; cancelling");
        }
        self.cancellation_token.cancel();
    }
}
