//! Provider root context
//!
//! One [`ProviderState`] is built when the provider is configured and handed
//! by reference to every resource handler. It owns the API client, the
//! settings, the retry executor and the shared async operation lock registry.

use crate::compute::ComputeApi;
use crate::error::{ProviderError, Result};
use ddcloud_config::ProviderSettings;
use ddcloud_core::{AsyncOperationLock, AsyncOperationLocks, Attempt, RetryContext, RetryExecutor};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Default interval between completion polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

pub struct ProviderState {
    client: Arc<dyn ComputeApi>,
    settings: ProviderSettings,
    executor: RetryExecutor,
    locks: Arc<AsyncOperationLocks>,
    poll_interval: Duration,
}

impl ProviderState {
    pub fn new(client: Arc<dyn ComputeApi>, settings: ProviderSettings) -> Result<Self> {
        settings.validate()?;
        let executor = RetryExecutor::new(settings.retry_config())?;

        tracing::debug!(
            region = %settings.region,
            max_attempts = executor.config().max_attempts,
            allow_server_reboots = settings.allow_server_reboots,
            "Configured provider state"
        );

        Ok(Self {
            client,
            settings,
            executor,
            locks: Arc::new(AsyncOperationLocks::new()),
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Share an existing lock registry (e.g. between several provider instances
    /// talking to the same account)
    pub fn with_locks(mut self, locks: Arc<AsyncOperationLocks>) -> Self {
        self.locks = locks;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn client(&self) -> &dyn ComputeApi {
        self.client.as_ref()
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    pub fn locks(&self) -> &Arc<AsyncOperationLocks> {
        &self.locks
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Run `action` under the provider's retry policy
    pub async fn retry_action<T, F, Fut>(&self, description: &str, action: F) -> Result<T>
    where
        F: FnMut(RetryContext) -> Fut,
        Fut: Future<Output = Attempt<T, ProviderError>>,
    {
        self.executor
            .run(description, action)
            .await
            .map_err(ProviderError::from)
    }

    /// Serialize against other asynchronous operations on `key`
    pub async fn acquire_async_operation_lock(&self, key: &str) -> AsyncOperationLock {
        self.locks.acquire(key).await
    }

    /// Same as [`acquire_async_operation_lock`](Self::acquire_async_operation_lock),
    /// recording `holder` for diagnostics
    pub async fn acquire_async_operation_lock_for(
        &self,
        key: &str,
        holder: &str,
    ) -> AsyncOperationLock {
        self.locks.acquire_as(key, holder).await
    }
}

/// Lock key shared by every mutating call against a network domain.
///
/// CloudControl rejects a second outstanding asynchronous operation anywhere
/// in the domain, so servers and VLAN reservations use their domain's key
/// too.
pub fn network_domain_lock_key(network_domain_id: &str) -> String {
    format!("networkdomain/{}", network_domain_id)
}
