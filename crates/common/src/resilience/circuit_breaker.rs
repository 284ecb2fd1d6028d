//! Circuit breaker guarding calls to a single external dependency
//!
//! A breaker starts `Closed`. Every failed call increments a consecutive
//! failure counter and stamps the failure time; reaching the configured
//! threshold trips the breaker `Open`. While open, calls are rejected with
//! [`ResilienceError::CircuitOpen`] without running the operation. Once the
//! open duration has elapsed since the last failure, the next caller is
//! admitted as the single `HalfOpen` probe: success closes the circuit, a
//! failure re-opens it and restarts the open window.
//!
//! All transitions happen under one short-lived lock per breaker, so
//! concurrent callers observe a consistent state and at most one probe is in
//! flight at a time.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

//==============================================================================
// Time Abstraction for Testability
//==============================================================================

/// Trait for time operations to enable deterministic testing
///
/// Circuit breakers use real monotonic time in production and controlled
/// mock time in tests, so open-window expiry can be tested without sleeping.
pub trait Clock: Send + Sync + 'static {
    /// Get current instant (monotonic time)
    fn now(&self) -> Instant;
}

/// Real system clock implementation for production use
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl<T: Clock> Clock for Arc<T> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Mock clock for deterministic testing
///
/// Clones share the same elapsed offset, so a test can hand one clone to a
/// registry and advance time through another.
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    elapsed: Arc<Mutex<Duration>>,
}

impl MockClock {
    /// Create a new mock clock starting at the current instant
    pub fn new() -> Self {
        Self { start: Instant::now(), elapsed: Arc::new(Mutex::new(Duration::ZERO)) }
    }

    /// Advance the mock clock by a duration
    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock() += duration;
    }

    /// Advance the mock clock by seconds (convenience method)
    pub fn advance_secs(&self, secs: u64) {
        self.advance(Duration::from_secs(secs));
    }

    /// Set the mock clock to a specific elapsed time
    pub fn set_elapsed(&self, duration: Duration) {
        *self.elapsed.lock() = duration;
    }

    /// Get the current elapsed time
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.start + *self.elapsed.lock()
    }
}

//==============================================================================
// Error Types
//==============================================================================

/// Simple configuration error for validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Errors that can occur in resilience operations
///
/// Generic over the underlying operation error `E` so the original error is
/// preserved when the breaker lets a call through and it fails.
#[derive(Debug, Error)]
pub enum ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Circuit breaker is open, rejecting calls
    #[error("Circuit breaker '{name}' is open, rejecting calls")]
    CircuitOpen { name: String },

    /// The underlying operation failed
    #[error("Operation failed: {source}")]
    OperationFailed {
        #[source]
        source: E,
    },
}

impl<E> ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Whether the call was rejected without running
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    /// Unwrap the operation error, if the operation ran
    pub fn into_source(self) -> Option<E> {
        match self {
            Self::CircuitOpen { .. } => None,
            Self::OperationFailed { source } => Some(source),
        }
    }
}

/// Result type for resilience operations
pub type ResilienceResult<T, E> = Result<T, ResilienceError<E>>;

/// Configuration result type using simple config errors
pub type ConfigResult<T> = Result<T, ConfigError>;

//==============================================================================
// State and Configuration
//==============================================================================

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, allowing requests
    Closed,
    /// Circuit is open, rejecting requests
    Open,
    /// Circuit is half-open, admitting a single probe to test recovery
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Time to wait after the last failure before admitting a probe
    pub open_duration: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, open_duration: Duration::from_secs(60) }
    }
}

impl CircuitBreakerConfig {
    /// Create a configuration builder
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::Invalid {
                message: "failure_threshold must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

/// Builder for CircuitBreakerConfig
#[derive(Debug, Default)]
pub struct CircuitBreakerConfigBuilder {
    config: CircuitBreakerConfig,
}

impl CircuitBreakerConfigBuilder {
    pub fn new() -> Self {
        Self { config: CircuitBreakerConfig::default() }
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    pub fn open_duration(mut self, duration: Duration) -> Self {
        self.config.open_duration = duration;
        self
    }

    pub fn build(self) -> ConfigResult<CircuitBreakerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Circuit breaker metrics for monitoring
#[derive(Debug, Clone)]
pub struct CircuitBreakerMetrics {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub total_calls: u64,
    pub rejected_calls: u64,
    pub last_failure_time: Option<Instant>,
}

//==============================================================================
// Circuit Breaker
//==============================================================================

#[derive(Debug)]
struct CircuitInner {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure: Option<Instant>,
    probe_in_flight: bool,
    total_calls: u64,
    rejected_calls: u64,
}

impl CircuitInner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure: None,
            probe_in_flight: false,
            total_calls: 0,
            rejected_calls: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Normal,
    Probe,
}

/// Circuit breaker for one named dependency
pub struct CircuitBreaker<C: Clock = SystemClock> {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<CircuitInner>,
    clock: Arc<C>,
}

impl<C: Clock> fmt::Debug for CircuitBreaker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &inner.state)
            .field("consecutive_failures", &inner.consecutive_failures)
            .finish()
    }
}

impl CircuitBreaker<SystemClock> {
    /// Create a new circuit breaker using the system clock
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> ConfigResult<Self> {
        Self::with_clock(name, config, Arc::new(SystemClock))
    }
}

impl<C: Clock> CircuitBreaker<C> {
    /// Create a circuit breaker sharing the given clock
    pub fn with_clock(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: Arc<C>,
    ) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self::from_validated(name, config, clock))
    }

    pub(crate) fn from_validated(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: Arc<C>,
    ) -> Self {
        Self { name: name.into(), config, inner: Mutex::new(CircuitInner::new()), clock }
    }

    /// Dependency name this breaker guards
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Active configuration
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current recorded state
    ///
    /// An `Open` breaker whose window has elapsed still reports `Open` until
    /// the next call is admitted as a probe.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Snapshot of counters for monitoring
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let inner = self.inner.lock();
        CircuitBreakerMetrics {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            total_calls: inner.total_calls,
            rejected_calls: inner.rejected_calls,
            last_failure_time: inner.last_failure,
        }
    }

    /// Force the breaker back to `Closed` with a cleared failure count
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        let previous = inner.state;
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.last_failure = None;
        inner.probe_in_flight = false;
        drop(inner);
        info!(dependency = %self.name, from = %previous, "circuit breaker manually reset");
    }

    /// Execute an operation through the breaker; every error counts as a
    /// failure.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        self.execute_classified(operation, |_| true).await
    }

    /// Execute an operation, counting only errors for which `is_failure`
    /// returns `true`.
    ///
    /// Errors that are not failures (for example cancellation) are passed
    /// through without touching the failure count. If such an error ends a
    /// probe, the breaker stays `HalfOpen` and the next caller probes.
    #[instrument(skip(self, operation, is_failure), fields(dependency = %self.name))]
    pub async fn execute_classified<F, Fut, T, E, P>(
        &self,
        operation: F,
        is_failure: P,
    ) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
        P: FnOnce(&E) -> bool,
    {
        let Some(admission) = self.try_acquire() else {
            debug!("call rejected, circuit is open");
            return Err(ResilienceError::CircuitOpen { name: self.name.clone() });
        };

        let mut guard = ProbeGuard { breaker: self, armed: admission == Admission::Probe };
        let result = operation().await;
        guard.armed = false;

        match result {
            Ok(value) => {
                self.on_success(admission);
                Ok(value)
            }
            Err(error) => {
                if is_failure(&error) {
                    self.on_failure(admission);
                } else {
                    self.on_neutral(admission);
                }
                Err(ResilienceError::OperationFailed { source: error })
            }
        }
    }

    fn open_window_elapsed(&self, inner: &CircuitInner) -> bool {
        inner.last_failure.map_or(true, |failed_at| {
            self.clock.now().saturating_duration_since(failed_at) >= self.config.open_duration
        })
    }

    fn try_acquire(&self) -> Option<Admission> {
        let mut inner = self.inner.lock();
        inner.total_calls += 1;
        let state = inner.state;

        match state {
            CircuitState::Closed => Some(Admission::Normal),
            CircuitState::Open if !inner.probe_in_flight && self.open_window_elapsed(&inner) => {
                inner.state = CircuitState::HalfOpen;
                inner.probe_in_flight = true;
                drop(inner);
                info!(dependency = %self.name, "circuit half-open, admitting probe");
                Some(Admission::Probe)
            }
            CircuitState::HalfOpen if !inner.probe_in_flight => {
                inner.probe_in_flight = true;
                Some(Admission::Probe)
            }
            CircuitState::Open | CircuitState::HalfOpen => {
                inner.rejected_calls += 1;
                None
            }
        }
    }

    /// Record a success.
    ///
    /// A call admitted while `Closed` that completes after the circuit has
    /// tripped does not close it; only the probe decides a recovery.
    fn on_success(&self, admission: Admission) {
        let mut inner = self.inner.lock();
        let previous = inner.state;

        if admission == Admission::Normal && previous != CircuitState::Closed {
            drop(inner);
            debug!(dependency = %self.name, state = %previous, "late success ignored");
            return;
        }

        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.last_failure = None;
        if admission == Admission::Probe {
            inner.probe_in_flight = false;
        }
        drop(inner);

        if previous != CircuitState::Closed {
            info!(dependency = %self.name, from = %previous, "circuit closed");
        }
    }

    /// Record a failure.
    ///
    /// Late failures from calls admitted while `Closed` only bump the
    /// counter once the circuit has left `Closed`; they never touch the probe
    /// slot or restart the open window.
    fn on_failure(&self, admission: Admission) {
        let mut inner = self.inner.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        let failures = inner.consecutive_failures;
        let state = inner.state;

        match (admission, state) {
            (Admission::Probe, CircuitState::HalfOpen) => {
                inner.probe_in_flight = false;
                inner.last_failure = Some(self.clock.now());
                inner.state = CircuitState::Open;
                drop(inner);
                warn!(dependency = %self.name, failures, "probe failed, circuit re-opened");
            }
            (_, CircuitState::Closed) => {
                if admission == Admission::Probe {
                    inner.probe_in_flight = false;
                }
                inner.last_failure = Some(self.clock.now());
                if failures >= self.config.failure_threshold {
                    inner.state = CircuitState::Open;
                    drop(inner);
                    warn!(
                        dependency = %self.name,
                        failures,
                        open_secs = self.config.open_duration.as_secs(),
                        "failure threshold reached, circuit opened"
                    );
                } else {
                    drop(inner);
                    debug!(dependency = %self.name, failures, "failure recorded");
                }
            }
            _ => {
                drop(inner);
                debug!(dependency = %self.name, failures, state = %state, "late failure recorded");
            }
        }
    }

    fn on_neutral(&self, admission: Admission) {
        if admission == Admission::Probe {
            self.inner.lock().probe_in_flight = false;
        }
    }

    fn abandon_probe(&self) {
        let mut inner = self.inner.lock();
        inner.probe_in_flight = false;
        if inner.state == CircuitState::HalfOpen {
            inner.state = CircuitState::Open;
        }
        drop(inner);
        debug!(dependency = %self.name, "probe dropped before completion, circuit back to open");
    }
}

/// Releases the probe slot if the probing future is dropped mid-flight
struct ProbeGuard<'a, C: Clock> {
    breaker: &'a CircuitBreaker<C>,
    armed: bool,
}

impl<C: Clock> Drop for ProbeGuard<'_, C> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.abandon_probe();
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for circuit breaker state transitions
    //!
    //! Time is driven by `MockClock`, so open-window expiry is exercised
    //! without real delays.

    use std::io;

    use super::*;

    fn breaker(threshold: u32, open_secs: u64) -> (CircuitBreaker<MockClock>, MockClock) {
        let clock = MockClock::new();
        let config = CircuitBreakerConfig::builder()
            .failure_threshold(threshold)
            .open_duration(Duration::from_secs(open_secs))
            .build()
            .unwrap();
        let breaker =
            CircuitBreaker::with_clock("upstream", config, Arc::new(clock.clone())).unwrap();
        (breaker, clock)
    }

    async fn fail(breaker: &CircuitBreaker<MockClock>) -> ResilienceResult<(), io::Error> {
        breaker.execute(|| async { Err::<(), _>(io::Error::other("boom")) }).await
    }

    async fn succeed(breaker: &CircuitBreaker<MockClock>) -> ResilienceResult<u32, io::Error> {
        breaker.execute(|| async { Ok::<_, io::Error>(7) }).await
    }

    /// Validates `CircuitBreakerConfig::builder` behavior for the zero
    /// threshold scenario.
    ///
    /// Assertions:
    /// - Ensures a zero failure threshold is rejected.
    #[test]
    fn config_rejects_zero_threshold() {
        let result = CircuitBreakerConfig::builder().failure_threshold(0).build();
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn state_display_uses_screaming_case() {
        assert_eq!(CircuitState::Closed.to_string(), "CLOSED");
        assert_eq!(CircuitState::Open.to_string(), "OPEN");
        assert_eq!(CircuitState::HalfOpen.to_string(), "HALF_OPEN");
    }

    /// Validates `CircuitBreaker::execute` behavior for the threshold trip
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms the breaker stays closed below the threshold.
    /// - Confirms it opens exactly at the threshold.
    /// - Ensures the next call is rejected without running.
    #[tokio::test]
    async fn opens_at_threshold_and_rejects() {
        let (breaker, _clock) = breaker(3, 60);

        for _ in 0..2 {
            assert!(fail(&breaker).await.is_err());
        }
        assert_eq!(breaker.state(), CircuitState::Closed);

        assert!(fail(&breaker).await.is_err());
        assert_eq!(breaker.state(), CircuitState::Open);

        let ran = std::sync::atomic::AtomicBool::new(false);
        let result = breaker
            .execute(|| async {
                ran.store(true, std::sync::atomic::Ordering::SeqCst);
                Ok::<_, io::Error>(())
            })
            .await;
        assert!(result.unwrap_err().is_circuit_open());
        assert!(!ran.load(std::sync::atomic::Ordering::SeqCst));
        assert_eq!(breaker.metrics().rejected_calls, 1);
    }

    /// Validates success handling for the counter reset scenario.
    ///
    /// Assertions:
    /// - Confirms a success in between failures resets the consecutive count.
    #[tokio::test]
    async fn success_resets_consecutive_failures() {
        let (breaker, _clock) = breaker(2, 60);

        assert!(fail(&breaker).await.is_err());
        assert_eq!(succeed(&breaker).await.unwrap(), 7);
        assert!(fail(&breaker).await.is_err());

        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.metrics().consecutive_failures, 1);
    }

    /// Validates the half-open probe for the recovery scenario.
    ///
    /// Assertions:
    /// - Ensures calls are rejected before the open window elapses.
    /// - Confirms a successful probe after the window closes the circuit.
    #[tokio::test]
    async fn successful_probe_closes_circuit() {
        let (breaker, clock) = breaker(1, 30);

        assert!(fail(&breaker).await.is_err());
        clock.advance_secs(29);
        assert!(succeed(&breaker).await.unwrap_err().is_circuit_open());

        clock.advance_secs(1);
        assert_eq!(succeed(&breaker).await.unwrap(), 7);
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.metrics().consecutive_failures, 0);
    }

    /// Validates the half-open probe for the relapse scenario.
    ///
    /// Assertions:
    /// - Confirms a failed probe re-opens the circuit.
    /// - Confirms the open window restarts from the probe failure.
    #[tokio::test]
    async fn failed_probe_reopens_and_restarts_window() {
        let (breaker, clock) = breaker(1, 30);

        assert!(fail(&breaker).await.is_err());
        clock.advance_secs(30);
        let probe = fail(&breaker).await.unwrap_err();
        assert!(!probe.is_circuit_open());
        assert_eq!(breaker.state(), CircuitState::Open);

        clock.advance_secs(29);
        assert!(succeed(&breaker).await.unwrap_err().is_circuit_open());
        clock.advance_secs(1);
        assert!(succeed(&breaker).await.is_ok());
    }

    #[tokio::test]
    async fn unclassified_errors_do_not_count() {
        let (breaker, _clock) = breaker(1, 30);

        let result = breaker
            .execute_classified(
                || async { Err::<(), _>(io::Error::new(io::ErrorKind::Interrupted, "cancelled")) },
                |e| e.kind() != io::ErrorKind::Interrupted,
            )
            .await;

        assert!(matches!(result, Err(ResilienceError::OperationFailed { .. })));
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.metrics().consecutive_failures, 0);
    }

    #[tokio::test]
    async fn reset_closes_open_circuit() {
        let (breaker, _clock) = breaker(1, 3600);
        assert!(fail(&breaker).await.is_err());
        assert_eq!(breaker.state(), CircuitState::Open);

        breaker.reset();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(succeed(&breaker).await.is_ok());
    }

    /// Validates probe exclusivity for the dropped probe scenario.
    ///
    /// Assertions:
    /// - Ensures a second caller is rejected while a probe is in flight.
    /// - Confirms dropping the probe future returns the circuit to open and
    ///   frees the probe slot.
    #[tokio::test]
    async fn dropped_probe_releases_slot() {
        let (breaker, clock) = breaker(1, 10);
        assert!(fail(&breaker).await.is_err());
        clock.advance_secs(10);

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        {
            let probe = breaker.execute(|| async move {
                let _ = rx.await;
                Ok::<_, io::Error>(())
            });
            tokio::pin!(probe);
            // Poll once so the probe is admitted and parked on the channel
            assert!(futures_poll_once(probe.as_mut()).await);
            assert_eq!(breaker.state(), CircuitState::HalfOpen);
            assert!(succeed(&breaker).await.unwrap_err().is_circuit_open());
        }
        drop(tx);

        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(succeed(&breaker).await.is_ok());
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    /// Polls a future exactly once, returning `true` if it is still pending.
    async fn futures_poll_once<F: Future + Unpin>(mut fut: F) -> bool {
        std::future::poll_fn(|cx| {
            let pending = std::pin::Pin::new(&mut fut).poll(cx).is_pending();
            std::task::Poll::Ready(pending)
        })
        .await
    }
}
