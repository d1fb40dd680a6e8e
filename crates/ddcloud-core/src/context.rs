//! Per-attempt signaling for retry actions

use std::sync::Arc;

/// Outcome of a single attempt, as reported by the action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T, E> {
    /// The call went through; stop and hand back the value
    Done(T),

    /// Transient condition; sleep and run the action again.
    /// The optional error is kept for the exhaustion report.
    Retry(Option<E>),

    /// Terminal failure; stop without further attempts
    Fail(E),
}

impl<T, E> Attempt<T, E> {
    pub fn is_done(&self) -> bool {
        matches!(self, Attempt::Done(_))
    }

    pub fn is_retry(&self) -> bool {
        matches!(self, Attempt::Retry(_))
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, Attempt::Fail(_))
    }

    /// Combine two classifications made within the same attempt.
    ///
    /// `Fail` takes precedence over `Retry`, which takes precedence over
    /// `Done`. When both sides carry the same kind of signal, the later one
    /// (`other`) wins.
    pub fn merge(self, other: Attempt<T, E>) -> Attempt<T, E> {
        match (self, other) {
            (Attempt::Fail(err), Attempt::Done(_) | Attempt::Retry(_)) => Attempt::Fail(err),
            (Attempt::Retry(cause), Attempt::Done(_)) => Attempt::Retry(cause),
            (_, other) => other,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Attempt<U, E> {
        match self {
            Attempt::Done(value) => Attempt::Done(f(value)),
            Attempt::Retry(cause) => Attempt::Retry(cause),
            Attempt::Fail(err) => Attempt::Fail(err),
        }
    }
}

/// An action that simply returns `Ok` succeeded; any `Err` is terminal.
///
/// Unclassified errors are never retried.
impl<T, E> From<Result<T, E>> for Attempt<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Attempt::Done(value),
            Err(err) => Attempt::Fail(err),
        }
    }
}

/// Information about the attempt in progress
///
/// Created by the executor right before each attempt and handed to the
/// action by value. The action reports back through the [`Attempt`] it
/// returns; the helper methods here only build those values (and log).
#[derive(Debug, Clone)]
pub struct RetryContext {
    attempt: u32,
    max_attempts: u32,
    description: Arc<str>,
}

impl RetryContext {
    pub(crate) fn new(attempt: u32, max_attempts: u32, description: Arc<str>) -> Self {
        Self {
            attempt,
            max_attempts,
            description,
        }
    }

    /// 1-based attempt number
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn is_last_attempt(&self) -> bool {
        self.attempt >= self.max_attempts
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Ask for another attempt without recording a cause
    pub fn retry<T, E>(&self) -> Attempt<T, E> {
        tracing::debug!(
            attempt = self.attempt,
            "{}: attempt requested retry",
            self.description
        );
        Attempt::Retry(None)
    }

    /// Ask for another attempt, remembering the transient error
    pub fn retry_because<T, E: std::fmt::Display>(&self, cause: E) -> Attempt<T, E> {
        tracing::debug!(
            attempt = self.attempt,
            "{}: attempt requested retry ({})",
            self.description,
            cause
        );
        Attempt::Retry(Some(cause))
    }

    /// Stop retrying and surface `err`
    pub fn fail<T, E: std::fmt::Display>(&self, err: E) -> Attempt<T, E> {
        tracing::debug!(
            attempt = self.attempt,
            "{}: attempt failed ({})",
            self.description,
            err
        );
        Attempt::Fail(err)
    }

    /// Report success
    pub fn done<T, E>(&self, value: T) -> Attempt<T, E> {
        tracing::debug!(
            attempt = self.attempt,
            "{}: attempt completed",
            self.description
        );
        Attempt::Done(value)
    }
}
