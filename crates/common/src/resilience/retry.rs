//! Retry executor with multiplicative backoff and cooperative cancellation
//!
//! An operation is attempted up to `max_attempts` times. After the k-th
//! failed attempt (1-based) the executor waits `initial_delay * multiplier^(k-1)`
//! before trying again; there is no cap and no jitter. The wait, and the
//! attempt itself, are raced against a [`CancellationToken`], so a shutdown
//! aborts a retry sequence immediately instead of sleeping it out.
//!
//! A [`RetryPolicy`] decides whether a given error is worth retrying at all.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Errors that can occur during retry operations
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every attempt failed; carries the error from the final attempt
    #[error("All {attempts} retry attempts exhausted: {source}")]
    Exhausted { attempts: u32, source: E },

    /// The policy refused to retry this error
    #[error("Operation failed with non-retryable error: {source}")]
    NonRetryable { attempt: u32, source: E },

    /// The cancellation token fired before the sequence finished
    #[error("Retry cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },
}

impl<E> RetryError<E> {
    /// Number of attempts that were started
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } | Self::Cancelled { attempts } => *attempts,
            Self::NonRetryable { attempt, .. } => *attempt,
        }
    }

    /// Whether the sequence ended because of cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// The last operation error, if any attempt completed
    pub fn into_source(self) -> Option<E> {
        match self {
            Self::Exhausted { source, .. } | Self::NonRetryable { source, .. } => Some(source),
            Self::Cancelled { .. } => None,
        }
    }
}

/// Result type for retry operations
pub type RetryResult<T, E> = Result<T, RetryError<E>>;

/// Trait for determining whether an error should trigger a retry
pub trait RetryPolicy<E> {
    /// Decide what to do after `attempt` (1-based) failed with `error`
    fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision;
}

/// Decision made by a retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the configured backoff delay
    Retry,
    /// Retry after a specific delay instead of the backoff schedule
    RetryAfter(Duration),
    /// Give up and surface the error
    Stop,
}

/// Retry configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay after the first failure
    pub initial_delay: Duration,
    /// Factor applied to the delay after every further failure
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 3, initial_delay: Duration::from_secs(1), multiplier: 1.5 }
    }
}

impl RetryConfig {
    /// Create a configuration builder
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".to_string());
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(format!(
                "multiplier must be a finite value >= 1.0, got {}",
                self.multiplier
            ));
        }
        Ok(())
    }

    /// Delay to wait after the given 1-based failed attempt
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}

/// Builder for RetryConfig
#[derive(Debug, Default)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl RetryConfigBuilder {
    pub fn new() -> Self {
        Self { config: RetryConfig::default() }
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.config.initial_delay = delay;
        self
    }

    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.config.multiplier = multiplier;
        self
    }

    pub fn build(self) -> Result<RetryConfig, String> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// State carried across the attempts of one retry sequence
#[derive(Debug, Clone, Default)]
pub struct RetryContext {
    /// Attempts started so far
    pub attempt: u32,
    /// Accumulated time spent waiting between attempts
    pub total_delay: Duration,
    /// Display form of the most recent error
    pub last_error: Option<String>,
}

/// The main retry executor
#[derive(Debug, Clone)]
pub struct RetryExecutor<P> {
    config: RetryConfig,
    policy: P,
}

impl<P> RetryExecutor<P> {
    /// Create a new retry executor with the given configuration and policy
    pub fn new(config: RetryConfig, policy: P) -> Self {
        Self { config, policy }
    }

    /// Create with default configuration
    pub fn with_policy(policy: P) -> Self {
        Self::new(RetryConfig::default(), policy)
    }

    /// Active configuration
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute `operation` until it succeeds, the policy stops it, attempts
    /// run out, or `cancel` fires.
    #[instrument(skip(self, operation, cancel), fields(max_attempts = self.config.max_attempts))]
    pub async fn execute<F, Fut, T, E>(
        &self,
        mut operation: F,
        cancel: &CancellationToken,
    ) -> RetryResult<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut context = RetryContext::default();

        loop {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled { attempts: context.attempt });
            }

            context.attempt += 1;
            debug!("Executing operation (attempt {}/{})", context.attempt, max_attempts);

            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!(attempt = context.attempt, "attempt abandoned on cancellation");
                    return Err(RetryError::Cancelled { attempts: context.attempt });
                }
                result = operation() => result,
            };

            let error = match result {
                Ok(value) => {
                    if context.attempt > 1 {
                        info!(attempt = context.attempt, "operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };
            context.last_error = Some(error.to_string());

            let delay = match self.policy.should_retry(&error, context.attempt) {
                RetryDecision::Stop => {
                    warn!(attempt = context.attempt, error = %error, "error is not retryable");
                    return Err(RetryError::NonRetryable {
                        attempt: context.attempt,
                        source: error,
                    });
                }
                RetryDecision::Retry => self.config.delay_after(context.attempt),
                RetryDecision::RetryAfter(delay) => delay,
            };

            if context.attempt >= max_attempts {
                let total_delay_ms =
                    u64::try_from(context.total_delay.as_millis()).unwrap_or(u64::MAX);
                warn!(
                    attempts = context.attempt,
                    total_delay_ms,
                    error = %error,
                    "all retry attempts exhausted"
                );
                return Err(RetryError::Exhausted { attempts: context.attempt, source: error });
            }

            warn!(
                attempt = context.attempt,
                max_attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %error,
                "operation failed, retrying"
            );

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!(attempt = context.attempt, "retry wait cancelled");
                    return Err(RetryError::Cancelled { attempts: context.attempt });
                }
                () = tokio::time::sleep(delay) => {}
            }
            context.total_delay += delay;
        }
    }
}

/// Convenience function to create a retry executor and execute an operation
pub async fn retry_with_policy<F, Fut, T, E, P>(
    config: RetryConfig,
    policy: P,
    cancel: &CancellationToken,
    operation: F,
) -> RetryResult<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: RetryPolicy<E>,
    E: fmt::Display,
{
    RetryExecutor::new(config, policy).execute(operation, cancel).await
}

/// Pre-defined retry policies for common scenarios
pub mod policies {
    use super::{RetryDecision, RetryPolicy};

    /// Always retry policy - retries on any error
    #[derive(Debug, Clone, Copy, Default)]
    pub struct AlwaysRetry;

    impl<E> RetryPolicy<E> for AlwaysRetry {
        fn should_retry(&self, _error: &E, _attempt: u32) -> RetryDecision {
            RetryDecision::Retry
        }
    }

    /// Never retry policy - never retries
    #[derive(Debug, Clone, Copy, Default)]
    pub struct NeverRetry;

    impl<E> RetryPolicy<E> for NeverRetry {
        fn should_retry(&self, _error: &E, _attempt: u32) -> RetryDecision {
            RetryDecision::Stop
        }
    }

    /// Predicate-based retry policy
    #[derive(Debug, Clone)]
    pub struct PredicateRetry<F> {
        predicate: F,
    }

    impl<F> PredicateRetry<F> {
        pub fn new(predicate: F) -> Self {
            Self { predicate }
        }
    }

    impl<F, E> RetryPolicy<E> for PredicateRetry<F>
    where
        F: Fn(&E, u32) -> bool,
    {
        fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision {
            if (self.predicate)(error, attempt) {
                RetryDecision::Retry
            } else {
                RetryDecision::Stop
            }
        }
    }
}
