//! ddcloud retry core
//!
//! Coordination layer used by the ddcloud resource handlers when they issue
//! asynchronous mutating calls against CloudControl.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │              resource handler                    │
//! │   (create NAT rule, shut down server, ...)       │
//! └─────────────────┬────────────────────────────────┘
//!                   │ run(description, action)
//! ┌─────────────────▼────────────────────────────────┐
//! │               RetryExecutor                      │
//! │  attempt 1..=max ──► action(RetryContext)        │
//! │                        │                         │
//! │        ┌───────────────▼─────────────┐           │
//! │        │ AsyncOperationLocks.acquire │ per key   │
//! │        │ one remote call             │           │
//! │        │ classify ─► Done/Retry/Fail │           │
//! │        │ release                     │           │
//! │        └─────────────────────────────┘           │
//! └──────────────────────────────────────────────────┘
//! ```

pub mod classify;
pub mod context;
pub mod error;
pub mod executor;
pub mod lock;

// Re-exports
pub use classify::{
    ApiResponseCode, ErrorClass, RESPONSE_CODE_NO_IP_ADDRESS_AVAILABLE,
    RESPONSE_CODE_RESOURCE_BUSY, busy_or_fail, classify, is_no_ip_address_available_error,
    is_resource_busy_error,
};
pub use context::{Attempt, RetryContext};
pub use error::{CoreError, Result, RetryError};
pub use executor::{RetryConfig, RetryExecutor};
pub use lock::{AsyncOperationLock, AsyncOperationLocks, LockHolder};
