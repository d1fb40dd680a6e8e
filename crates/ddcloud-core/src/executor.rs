//! Bounded retry execution
//!
//! [`RetryExecutor::run`] drives an action up to `max_attempts` times. Each
//! invocation gets a fresh [`RetryContext`] and reports an [`Attempt`]:
//!
//! - `Done` ends the run successfully,
//! - `Fail` ends it immediately with the action's error,
//! - `Retry` sleeps for the configured delay and goes round again, or ends
//!   with [`RetryError::Exhausted`] once the last attempt has been used.

use crate::context::{Attempt, RetryContext};
use crate::error::{CoreError, Result, RetryError};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Retry configuration for remote mutating operations
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first one)
    pub max_attempts: u32,

    /// Delay before the second attempt
    pub initial_delay: Duration,

    /// Upper bound for the delay between attempts
    pub max_delay: Duration,

    /// Backoff multiplier; 1.0 gives a constant delay
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 1.0,
        }
    }
}

impl RetryConfig {
    /// Longest delay a configuration may ask for
    pub const DELAY_LIMIT: Duration = Duration::from_secs(24 * 60 * 60);

    /// Same delay between every attempt
    pub fn constant(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay: delay,
            max_delay: delay,
            backoff_multiplier: 1.0,
        }
    }

    /// Exponentially growing delay, capped at `max_delay`
    pub fn exponential(
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay,
            backoff_multiplier,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(CoreError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if !(self.backoff_multiplier >= 1.0) {
            return Err(CoreError::InvalidConfig(format!(
                "backoff_multiplier must be >= 1.0 (got {})",
                self.backoff_multiplier
            )));
        }
        if self.initial_delay > Self::DELAY_LIMIT || self.max_delay > Self::DELAY_LIMIT {
            return Err(CoreError::InvalidConfig(format!(
                "retry delays must not exceed {:?} (got initial_delay {:?}, max_delay {:?})",
                Self::DELAY_LIMIT,
                self.initial_delay,
                self.max_delay
            )));
        }
        if self.max_delay < self.initial_delay {
            return Err(CoreError::InvalidConfig(format!(
                "max_delay ({:?}) is shorter than initial_delay ({:?})",
                self.max_delay, self.initial_delay
            )));
        }
        Ok(())
    }

    /// Delay to wait after the given (1-based) attempt asked for a retry
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        // Products too large for a Duration fall back to the cap.
        Duration::try_from_secs_f64(delay.max(0.0))
            .map(|delay| delay.min(self.max_delay))
            .unwrap_or(self.max_delay)
    }
}

/// Runs retry actions according to a [`RetryConfig`]
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `action` until it succeeds, fails, or runs out of attempts.
    ///
    /// The action should issue exactly one remote call per invocation and
    /// classify its result. Locking is the action's job; the executor never
    /// touches the async operation lock.
    pub async fn run<T, E, F, Fut>(
        &self,
        description: impl Into<String>,
        mut action: F,
    ) -> std::result::Result<T, RetryError<E>>
    where
        E: std::error::Error + 'static,
        F: FnMut(RetryContext) -> Fut,
        Fut: Future<Output = Attempt<T, E>>,
    {
        let description: Arc<str> = Arc::from(description.into());
        let max_attempts = self.config.max_attempts;
        let mut last_cause: Option<E> = None;

        for attempt in 1..=max_attempts {
            tracing::debug!(
                attempt,
                max_attempts,
                "{}: starting attempt",
                description
            );

            let context = RetryContext::new(attempt, max_attempts, Arc::clone(&description));
            match action(context).await {
                Attempt::Done(value) => {
                    if attempt > 1 {
                        tracing::info!(
                            attempt,
                            max_attempts,
                            "{}: succeeded after retrying",
                            description
                        );
                    }
                    return Ok(value);
                }
                Attempt::Fail(err) => {
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        "{}: failed: {}",
                        description,
                        err
                    );
                    return Err(RetryError::Failed(err));
                }
                Attempt::Retry(cause) => {
                    if cause.is_some() {
                        last_cause = cause;
                    }

                    if attempt < max_attempts {
                        let delay = self.config.delay_for_attempt(attempt);
                        tracing::info!(
                            attempt,
                            max_attempts,
                            delay_ms = delay.as_millis() as u64,
                            "{}: retrying",
                            description
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        tracing::warn!(
            attempts = max_attempts,
            "{}: giving up, attempts exhausted",
            description
        );
        Err(RetryError::Exhausted {
            description: description.to_string(),
            attempts: max_attempts,
            last: last_cause,
        })
    }
}
