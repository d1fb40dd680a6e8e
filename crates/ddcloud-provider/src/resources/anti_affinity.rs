//! Server anti-affinity rules
//!
//! CloudControl addresses a rule by `{network domain}/{rule}` when polling.

use crate::compute::{ResourceType, Server};
use crate::error::{ProviderError, Result};
use crate::resources::ANTI_AFFINITY_RULE_TIMEOUT;
use crate::state::{ProviderState, network_domain_lock_key};
use crate::wait::{wait_for_change, wait_for_delete};
use ddcloud_core::busy_or_fail;

fn qualified_rule_id(network_domain_id: &str, rule_id: &str) -> String {
    format!("{}/{}", network_domain_id, rule_id)
}

async fn get_server(state: &ProviderState, server_id: &str) -> Result<Server> {
    state
        .client()
        .get_server(server_id)
        .await?
        .ok_or_else(|| ProviderError::NotFound {
            resource_type: ResourceType::Server,
            id: server_id.to_string(),
        })
}

/// Keep two servers on different physical hosts. Both servers must be in the
/// same network domain. Returns the new rule's id.
pub async fn create_server_anti_affinity_rule(
    state: &ProviderState,
    server1_id: &str,
    server2_id: &str,
) -> Result<String> {
    let server1 = get_server(state, server1_id).await?;
    let server2 = get_server(state, server2_id).await?;
    if server1.network_domain_id != server2.network_domain_id {
        return Err(ProviderError::NetworkDomainMismatch {
            server1_id: server1.id,
            network_domain1_id: server1.network_domain_id,
            server2_id: server2.id,
            network_domain2_id: server2.network_domain_id,
        });
    }
    let network_domain_id = server1.network_domain_id.as_str();

    let description = format!(
        "Create anti-affinity rule between servers '{}' and '{}'",
        server1_id, server2_id
    );
    let lock_key = network_domain_lock_key(network_domain_id);
    let (description_ref, lock_key) = (description.as_str(), lock_key.as_str());

    let rule_id = state
        .retry_action(&description, move |context| async move {
            let lock = state
                .acquire_async_operation_lock_for(lock_key, description_ref)
                .await;
            let result = state
                .client()
                .create_server_anti_affinity_rule(server1_id, server2_id)
                .await
                .map_err(ProviderError::Api);
            lock.release();

            busy_or_fail(&context, result)
        })
        .await?;

    wait_for_change(
        state,
        ResourceType::ServerAntiAffinityRule,
        &qualified_rule_id(network_domain_id, &rule_id),
        "create",
        ANTI_AFFINITY_RULE_TIMEOUT,
    )
    .await?;

    tracing::info!(
        "Created server anti-affinity rule '{}' in network domain '{}'",
        rule_id,
        network_domain_id
    );
    Ok(rule_id)
}

pub async fn delete_server_anti_affinity_rule(
    state: &ProviderState,
    network_domain_id: &str,
    rule_id: &str,
) -> Result<()> {
    tracing::info!(
        "Delete server anti-affinity rule '{}' in network domain '{}'",
        rule_id,
        network_domain_id
    );

    let description = format!("Delete anti-affinity rule '{}'", rule_id);
    let lock_key = network_domain_lock_key(network_domain_id);
    let (description_ref, lock_key) = (description.as_str(), lock_key.as_str());

    state
        .retry_action(&description, move |context| async move {
            let lock = state
                .acquire_async_operation_lock_for(lock_key, description_ref)
                .await;
            let result = state
                .client()
                .delete_server_anti_affinity_rule(rule_id, network_domain_id)
                .await
                .map_err(ProviderError::Api);
            lock.release();

            busy_or_fail(&context, result)
        })
        .await?;

    wait_for_delete(
        state,
        ResourceType::ServerAntiAffinityRule,
        &qualified_rule_id(network_domain_id, rule_id),
        ANTI_AFFINITY_RULE_TIMEOUT,
    )
    .await
}
