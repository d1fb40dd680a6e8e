//! Retry core error types

use thiserror::Error;

/// Errors raised by the core itself (configuration problems)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid retry configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// Terminal outcome of [`RetryExecutor::run`](crate::RetryExecutor::run)
///
/// `Failed` carries the action's own error untouched, so callers can match on
/// it. `Exhausted` is synthesized by the executor when every attempt asked to
/// be retried.
#[derive(Error, Debug)]
pub enum RetryError<E>
where
    E: std::error::Error + 'static,
{
    #[error(transparent)]
    Failed(E),

    #[error(
        "{description}: gave up after {attempts} attempt(s){}",
        describe_last(.last)
    )]
    Exhausted {
        description: String,
        attempts: u32,
        last: Option<E>,
    },
}

fn describe_last<E: std::fmt::Display>(last: &Option<E>) -> String {
    match last {
        Some(cause) => format!(" (last error: {})", cause),
        None => " (timed out waiting for the operation to be accepted)".to_string(),
    }
}

impl<E> RetryError<E>
where
    E: std::error::Error + 'static,
{
    /// True when the executor ran out of attempts rather than hitting a hard failure
    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }

    /// Number of attempts made before giving up, if exhausted
    pub fn attempts(&self) -> Option<u32> {
        match self {
            RetryError::Exhausted { attempts, .. } => Some(*attempts),
            RetryError::Failed(_) => None,
        }
    }

    /// The underlying action error: the terminal one, or the last transient one
    pub fn into_inner(self) -> Option<E> {
        match self {
            RetryError::Failed(err) => Some(err),
            RetryError::Exhausted { last, .. } => last,
        }
    }
}
