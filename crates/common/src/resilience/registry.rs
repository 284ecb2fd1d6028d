//! Named circuit breakers, one per external dependency
//!
//! Breakers are created lazily on first use. A dependency can be given its
//! own configuration up front with [`CircuitBreakerRegistry::configure`];
//! otherwise the registry defaults apply. Distinct names never share state.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, CircuitState, Clock, ConfigResult,
    ResilienceResult, SystemClock,
};

/// Registry of circuit breakers keyed by dependency name
pub struct CircuitBreakerRegistry<C: Clock = SystemClock> {
    breakers: DashMap<String, Arc<CircuitBreaker<C>>>,
    overrides: DashMap<String, CircuitBreakerConfig>,
    defaults: CircuitBreakerConfig,
    clock: Arc<C>,
}

impl<C: Clock> std::fmt::Debug for CircuitBreakerRegistry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerRegistry")
            .field("defaults", &self.defaults)
            .field("breakers", &self.breakers.len())
            .finish()
    }
}

impl CircuitBreakerRegistry<SystemClock> {
    /// Registry with the default policy (5 failures, 60 seconds open)
    pub fn new() -> Self {
        Self {
            breakers: DashMap::new(),
            overrides: DashMap::new(),
            defaults: CircuitBreakerConfig::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Registry whose lazily created breakers use `defaults`
    pub fn with_defaults(defaults: CircuitBreakerConfig) -> ConfigResult<Self> {
        Self::with_clock(defaults, Arc::new(SystemClock))
    }
}

impl Default for CircuitBreakerRegistry<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> CircuitBreakerRegistry<C> {
    /// Registry sharing `clock` with every breaker it creates
    pub fn with_clock(defaults: CircuitBreakerConfig, clock: Arc<C>) -> ConfigResult<Self> {
        defaults.validate()?;
        Ok(Self { breakers: DashMap::new(), overrides: DashMap::new(), defaults, clock })
    }

    /// Set the configuration used when `name`'s breaker is first created.
    ///
    /// Has no effect on a breaker that already exists.
    pub fn configure(&self, name: &str, config: CircuitBreakerConfig) -> ConfigResult<()> {
        config.validate()?;
        self.overrides.insert(name.to_string(), config);
        Ok(())
    }

    /// Fetch the breaker for `name`, creating it on first use
    pub fn get_or_create(&self, name: &str) -> Arc<CircuitBreaker<C>> {
        if let Some(existing) = self.breakers.get(name) {
            return Arc::clone(existing.value());
        }

        let config = self.overrides.get(name).map_or_else(|| self.defaults.clone(), |c| c.clone());
        let entry = self.breakers.entry(name.to_string()).or_insert_with(|| {
            debug!(
                dependency = name,
                threshold = config.failure_threshold,
                "creating circuit breaker"
            );
            Arc::new(CircuitBreaker::from_validated(name, config, Arc::clone(&self.clock)))
        });
        Arc::clone(entry.value())
    }

    /// Run `operation` through the breaker for `name`; every error counts
    /// as a failure.
    pub async fn execute<F, Fut, T, E>(&self, name: &str, operation: F) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let breaker = self.get_or_create(name);
        breaker.execute(operation).await
    }

    /// Run `operation` through the breaker for `name`, counting only errors
    /// that `is_failure` accepts.
    pub async fn execute_classified<F, Fut, T, E, P>(
        &self,
        name: &str,
        operation: F,
        is_failure: P,
    ) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
        P: FnOnce(&E) -> bool,
    {
        let breaker = self.get_or_create(name);
        breaker.execute_classified(operation, is_failure).await
    }

    /// State of `name`'s breaker; unknown names report `Closed`
    pub fn state(&self, name: &str) -> CircuitState {
        self.breakers.get(name).map_or(CircuitState::Closed, |b| b.state())
    }

    /// Manually close `name`'s breaker. Returns `false` if it never existed.
    pub fn reset(&self, name: &str) -> bool {
        match self.breakers.get(name) {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }

    /// Metrics for every breaker created so far, sorted by name
    pub fn snapshot(&self) -> Vec<(String, CircuitBreakerMetrics)> {
        let mut all: Vec<_> =
            self.breakers.iter().map(|e| (e.key().clone(), e.value().metrics())).collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }
}
