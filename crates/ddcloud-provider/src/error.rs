//! Provider error types

use crate::compute::{ApiError, ResourceType};
use ddcloud_core::{ApiResponseCode, RetryError};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(
        "{description}: gave up after {attempts} attempt(s){}",
        describe_last(.last)
    )]
    RetriesExhausted {
        description: String,
        attempts: u32,
        last: Option<Box<ProviderError>>,
    },

    #[error(
        "cannot {operation} server '{server_id}' because server reboots have not been enabled via the 'allow_server_reboot' provider setting or 'DDCLOUD_ALLOW_SERVER_REBOOT' environment variable"
    )]
    RebootsNotAllowed {
        operation: &'static str,
        server_id: String,
    },

    #[error("cannot find {resource_type} '{id}'")]
    NotFound {
        resource_type: ResourceType,
        id: String,
    },

    #[error("{resource_type} '{id}' entered failed state: {reason}")]
    ProvisioningFailed {
        resource_type: ResourceType,
        id: String,
        reason: String,
    },

    #[error("timed out after {timeout:?} waiting for {resource_type} '{id}' ({action})")]
    Timeout {
        resource_type: ResourceType,
        id: String,
        action: String,
        timeout: Duration,
    },

    #[error(
        "server '{server1_id}' is in network domain '{network_domain1_id}', but server '{server2_id}' is in network domain '{network_domain2_id}'"
    )]
    NetworkDomainMismatch {
        server1_id: String,
        network_domain1_id: String,
        server2_id: String,
        network_domain2_id: String,
    },

    #[error("invalid address type '{0}'")]
    InvalidAddressType(String),

    #[error("invalid base IP address '{0}'")]
    InvalidAddress(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ddcloud_config::ConfigError),

    #[error("Retry configuration error: {0}")]
    Core(#[from] ddcloud_core::CoreError),
}

pub type Result<T> = std::result::Result<T, ProviderError>;

fn describe_last(last: &Option<Box<ProviderError>>) -> String {
    match last {
        Some(cause) => format!(" (last error: {})", cause),
        None => " (timed out waiting for the operation to be accepted)".to_string(),
    }
}

impl ProviderError {
    pub fn is_retries_exhausted(&self) -> bool {
        matches!(self, ProviderError::RetriesExhausted { .. })
    }

    /// The CloudControl error behind this one, if any
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            ProviderError::Api(err) => Some(err),
            _ => None,
        }
    }
}

impl ApiResponseCode for ProviderError {
    fn response_code(&self) -> Option<&str> {
        self.api_error().and_then(|err| err.response_code())
    }
}

impl From<RetryError<ProviderError>> for ProviderError {
    fn from(err: RetryError<ProviderError>) -> Self {
        match err {
            RetryError::Failed(err) => err,
            RetryError::Exhausted {
                description,
                attempts,
                last,
            } => ProviderError::RetriesExhausted {
                description,
                attempts,
                last: last.map(Box::new),
            },
        }
    }
}
