//! Completion polling for asynchronous CloudControl operations
//!
//! Called after the mutating call has been accepted and its async operation
//! lock released, so that a long wait never blocks other operations on the
//! same network domain.

use crate::compute::{ResourceState, ResourceType};
use crate::error::{ProviderError, Result};
use crate::state::ProviderState;
use std::time::Duration;
use tokio::time::{Instant, sleep};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WaitTarget {
    /// Resource exists and is NORMAL
    Settled,
    /// Resource no longer exists
    Gone,
}

/// Wait for a newly created resource to reach NORMAL
pub async fn wait_for_deploy(
    state: &ProviderState,
    resource_type: ResourceType,
    id: &str,
    timeout: Duration,
) -> Result<()> {
    wait_for(state, resource_type, id, "deploy", WaitTarget::Settled, timeout).await
}

/// Wait for a change to an existing resource to complete
pub async fn wait_for_change(
    state: &ProviderState,
    resource_type: ResourceType,
    id: &str,
    action: &str,
    timeout: Duration,
) -> Result<()> {
    wait_for(state, resource_type, id, action, WaitTarget::Settled, timeout).await
}

/// Wait for a resource to disappear
pub async fn wait_for_delete(
    state: &ProviderState,
    resource_type: ResourceType,
    id: &str,
    timeout: Duration,
) -> Result<()> {
    wait_for(state, resource_type, id, "delete", WaitTarget::Gone, timeout).await
}

async fn wait_for(
    state: &ProviderState,
    resource_type: ResourceType,
    id: &str,
    action: &str,
    target: WaitTarget,
    timeout: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    let poll_interval = state.poll_interval();

    loop {
        let status = state.client().resource_status(resource_type, id).await?;

        match (target, status) {
            (WaitTarget::Gone, None) => {
                tracing::debug!("{} '{}' has been deleted", resource_type, id);
                return Ok(());
            }
            (WaitTarget::Settled, None) => {
                return Err(ProviderError::NotFound {
                    resource_type,
                    id: id.to_string(),
                });
            }
            (_, Some(ResourceState::Failed(reason))) => {
                return Err(ProviderError::ProvisioningFailed {
                    resource_type,
                    id: id.to_string(),
                    reason,
                });
            }
            (WaitTarget::Settled, Some(ResourceState::Normal)) => {
                tracing::debug!("{} '{}' is ready ({})", resource_type, id, action);
                return Ok(());
            }
            (_, Some(pending)) => {
                tracing::debug!(
                    "{} '{}' is {} ({}); checking again in {:?}",
                    resource_type,
                    id,
                    pending,
                    action,
                    poll_interval
                );
            }
        }

        if Instant::now() + poll_interval > deadline {
            return Err(ProviderError::Timeout {
                resource_type,
                id: id.to_string(),
                action: action.to_string(),
                timeout,
            });
        }
        sleep(poll_interval).await;
    }
}
