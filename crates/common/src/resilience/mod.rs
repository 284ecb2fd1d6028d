//! Resilience patterns for calls to external dependencies
//!
//! - **Retry**: repeats a failed operation with multiplicative backoff,
//!   aborting promptly when a cancellation token fires
//! - **Circuit Breaker**: stops calling a dependency after repeated failures
//!   and admits a single probe once the open window has elapsed
//! - **Registry**: one breaker per named dependency, created lazily
//!
//! The two compose: wrapping a retry sequence in a breaker call means one
//! exhausted sequence counts as one breaker failure.

pub mod circuit_breaker;
pub mod registry;
pub mod retry;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerConfigBuilder, CircuitBreakerMetrics,
    CircuitState, Clock, ConfigError, ConfigResult, MockClock, ResilienceError, ResilienceResult,
    SystemClock,
};
pub use registry::CircuitBreakerRegistry;
pub use retry::{
    policies, retry_with_policy, RetryConfig, RetryConfigBuilder, RetryContext, RetryDecision,
    RetryError, RetryExecutor, RetryPolicy, RetryResult,
};
