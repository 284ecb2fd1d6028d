//! Application context - dependency injection container

use std::sync::Arc;

use landfall_common::resilience::{CircuitBreakerConfig, CircuitBreakerRegistry, RetryConfig};
use landfall_core::{PassReport, ReconciliationService};
use landfall_domain::{Config, LandfallError, ResilienceConfig, Result};
use landfall_infra::{
    DbManager, LandingQueryCache, NasaLandingsClient, ReconciliationScheduler,
    ReconciliationSchedulerConfig, SchedulerResult, SqliteLandingRepository,
};
use tracing::info;

/// Application context - holds all services and dependencies
pub struct AppContext {
    pub config: Config,
    pub db: Arc<DbManager>,
    pub repository: Arc<SqliteLandingRepository>,
    pub cache: Arc<LandingQueryCache>,
    pub service: Arc<ReconciliationService>,
    pub scheduler: ReconciliationScheduler,
}

impl AppContext {
    /// Wire the store, upstream client, cache and worker from `config`.
    ///
    /// Opens the database and applies the schema; nothing is scheduled until
    /// [`AppContext::start`].
    pub fn new(config: Config) -> Result<Self> {
        let db = Arc::new(DbManager::from_config(&config.database)?);
        let repository = Arc::new(SqliteLandingRepository::new(Arc::clone(&db)));
        let cache = Arc::new(LandingQueryCache::new(&config.cache));
        let client = Arc::new(NasaLandingsClient::from_config(&config.upstream)?);

        let (breaker, retry) = resilience_settings(&config.resilience)?;
        let breakers = Arc::new(
            CircuitBreakerRegistry::with_defaults(breaker)
                .map_err(|err| LandfallError::Config(err.to_string()))?,
        );

        let service = Arc::new(ReconciliationService::new(
            client,
            repository.clone(),
            cache.clone(),
            breakers,
            retry,
        ));
        let scheduler = ReconciliationScheduler::new(
            Arc::clone(&service),
            ReconciliationSchedulerConfig::from_sync_config(&config.sync),
        );

        info!(
            db_path = %db.path().display(),
            upstream = %config.upstream.url,
            interval_secs = config.sync.interval().as_secs(),
            "application context initialised"
        );

        Ok(Self { config, db, repository, cache, service, scheduler })
    }

    /// Start the scheduled worker.
    pub async fn start(&mut self) -> SchedulerResult<()> {
        self.scheduler.start().await
    }

    /// Run exactly one pass outside the schedule.
    pub async fn run_once(&self) -> SchedulerResult<PassReport> {
        self.scheduler.run_now().await
    }

    /// Stop the worker if it is running.
    pub async fn shutdown(&mut self) -> SchedulerResult<()> {
        if self.scheduler.is_running() {
            self.scheduler.stop().await?;
        }
        Ok(())
    }
}

fn resilience_settings(config: &ResilienceConfig) -> Result<(CircuitBreakerConfig, RetryConfig)> {
    let breaker = CircuitBreakerConfig::builder()
        .failure_threshold(config.circuit_breaker.failure_threshold)
        .open_duration(config.circuit_breaker.open_duration())
        .build()
        .map_err(|err| LandfallError::Config(err.to_string()))?;

    let retry = RetryConfig::builder()
        .max_attempts(config.retry.max_attempts)
        .initial_delay(config.retry.initial_delay())
        .build()
        .map_err(LandfallError::Config)?;

    Ok((breaker, retry))
}
