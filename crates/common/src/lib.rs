//! Modular common utilities shared across Landfall crates.
//!
//! # Safety and Quality
//!
//! This crate enforces strict safety and quality standards to ensure
//! reliability across all Landfall components.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: field-level validation framework
//! - `runtime`: async resilience primitives (retry, circuit breaker, registry)
//! - `observability`: optional tracing (pulled in by `runtime`)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod validation;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod resilience;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "runtime")]
pub use resilience::{
    retry_with_policy, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics,
    CircuitBreakerRegistry, CircuitState, Clock, MockClock, ResilienceError, ResilienceResult,
    RetryConfig, RetryDecision, RetryError, RetryExecutor, RetryPolicy, RetryResult, SystemClock,
};
#[cfg(feature = "foundation")]
pub use validation::{FieldError, ValidationError, ValidationResult, Validator};
