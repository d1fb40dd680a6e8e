//! Classification of remote API errors
//!
//! Only two CloudControl response codes are worth retrying. Everything else
//! is terminal: retrying an unknown failure risks looping forever against a
//! configuration the platform will never accept.

use crate::context::{Attempt, RetryContext};

/// Response code returned while another operation is in progress on the resource
pub const RESPONSE_CODE_RESOURCE_BUSY: &str = "RESOURCE_BUSY";

/// Response code returned when no public IPv4 address is free in the network domain
pub const RESPONSE_CODE_NO_IP_ADDRESS_AVAILABLE: &str = "NO_IP_ADDRESS_AVAILABLE";

/// Errors that may carry a CloudControl response code
pub trait ApiResponseCode {
    fn response_code(&self) -> Option<&str>;
}

impl<T: ApiResponseCode + ?Sized> ApiResponseCode for &T {
    fn response_code(&self) -> Option<&str> {
        (**self).response_code()
    }
}

/// How a retry action should treat an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Another operation is in flight; retry as-is
    ResourceBusy,
    /// Out of public addresses; allocate more, then retry
    NoIpAddressAvailable,
    /// Anything else; fail
    Terminal,
}

impl ErrorClass {
    pub fn is_transient(self) -> bool {
        !matches!(self, ErrorClass::Terminal)
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorClass::ResourceBusy => write!(f, "resource busy"),
            ErrorClass::NoIpAddressAvailable => write!(f, "no IP address available"),
            ErrorClass::Terminal => write!(f, "terminal"),
        }
    }
}

pub fn classify<E: ApiResponseCode + ?Sized>(err: &E) -> ErrorClass {
    match err.response_code() {
        Some(RESPONSE_CODE_RESOURCE_BUSY) => ErrorClass::ResourceBusy,
        Some(RESPONSE_CODE_NO_IP_ADDRESS_AVAILABLE) => ErrorClass::NoIpAddressAvailable,
        _ => ErrorClass::Terminal,
    }
}

pub fn is_resource_busy_error<E: ApiResponseCode + ?Sized>(err: &E) -> bool {
    classify(err) == ErrorClass::ResourceBusy
}

pub fn is_no_ip_address_available_error<E: ApiResponseCode + ?Sized>(err: &E) -> bool {
    classify(err) == ErrorClass::NoIpAddressAvailable
}

/// Map the result of a single remote call onto an attempt outcome.
///
/// Busy errors are retried; every other error (including "no IP address
/// available", which needs remediation the caller must perform) fails.
pub fn busy_or_fail<T, E>(context: &RetryContext, result: Result<T, E>) -> Attempt<T, E>
where
    E: ApiResponseCode + std::fmt::Display,
{
    match result {
        Ok(value) => context.done(value),
        Err(err) if is_resource_busy_error(&err) => context.retry_because(err),
        Err(err) => context.fail(err),
    }
}
