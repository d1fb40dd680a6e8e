//! NAT rules

use crate::compute::{NatRule, ResourceType};
use crate::error::{ProviderError, Result};
use crate::resources::public_ip::add_public_ip_block;
use crate::resources::{NAT_CREATE_TIMEOUT, NAT_DELETE_TIMEOUT};
use crate::state::{ProviderState, network_domain_lock_key};
use crate::wait::{wait_for_delete, wait_for_deploy};
use ddcloud_core::{ErrorClass, busy_or_fail, classify};

/// Create a NAT rule mapping `public_ip` (or a CloudControl-allocated
/// address when `None`) to `private_ip`.
///
/// When the network domain has run out of public addresses, a new public IP
/// block is allocated and the rule creation is retried against it.
pub async fn create_nat_rule(
    state: &ProviderState,
    network_domain_id: &str,
    private_ip: &str,
    public_ip: Option<&str>,
) -> Result<NatRule> {
    let public_ip_description = public_ip.unwrap_or("<computed>");
    tracing::info!(
        "Create NAT rule (from public IP '{}' to private IP '{}') in network domain '{}'",
        public_ip_description,
        private_ip,
        network_domain_id
    );

    let description = format!(
        "Create NAT rule (from public IP '{}' to private IP '{}')",
        public_ip_description, private_ip
    );
    let lock_key = network_domain_lock_key(network_domain_id);
    let (description_ref, lock_key) = (description.as_str(), lock_key.as_str());

    let nat_rule_id = state
        .retry_action(&description, move |context| async move {
            let lock = state
                .acquire_async_operation_lock_for(lock_key, description_ref)
                .await;

            let result = state
                .client()
                .add_nat_rule(network_domain_id, private_ip, public_ip)
                .await
                .map_err(ProviderError::Api);

            let attempt = match result {
                Err(err) if classify(&err) == ErrorClass::NoIpAddressAvailable => {
                    tracing::info!(
                        "There are no free public IPv4 addresses in network domain '{}'; requesting allocation of a new address block",
                        network_domain_id
                    );
                    match add_public_ip_block(state, network_domain_id).await {
                        // The new block is picked up on the next attempt.
                        Ok(_) => context.retry_because(err),
                        Err(block_err) => context.fail(block_err),
                    }
                }
                result => busy_or_fail(&context, result),
            };

            lock.release();
            attempt
        })
        .await?;

    tracing::info!("NAT rule '{}' is being provisioned", nat_rule_id);
    wait_for_deploy(state, ResourceType::NatRule, &nat_rule_id, NAT_CREATE_TIMEOUT).await?;

    let nat_rule = state
        .client()
        .get_nat_rule(&nat_rule_id)
        .await?
        .ok_or_else(|| ProviderError::NotFound {
            resource_type: ResourceType::NatRule,
            id: nat_rule_id.clone(),
        })?;

    tracing::info!(
        "Successfully created NAT rule '{}' ('{}' -> '{}')",
        nat_rule.id,
        nat_rule.external_ip_address,
        nat_rule.internal_ip_address
    );
    Ok(nat_rule)
}

/// Current state of a NAT rule, `None` if it has been deleted
pub async fn read_nat_rule(state: &ProviderState, id: &str) -> Result<Option<NatRule>> {
    let nat_rule = state.client().get_nat_rule(id).await?;
    if nat_rule.is_none() {
        tracing::info!("NAT rule '{}' has been deleted", id);
    }
    Ok(nat_rule)
}

pub async fn delete_nat_rule(state: &ProviderState, network_domain_id: &str, id: &str) -> Result<()> {
    tracing::info!(
        "Delete NAT rule '{}' in network domain '{}'",
        id,
        network_domain_id
    );

    let description = format!("Delete NAT rule '{}'", id);
    let lock_key = network_domain_lock_key(network_domain_id);
    let (description_ref, lock_key) = (description.as_str(), lock_key.as_str());

    state
        .retry_action(&description, move |context| async move {
            let lock = state
                .acquire_async_operation_lock_for(lock_key, description_ref)
                .await;
            let result = state
                .client()
                .delete_nat_rule(id)
                .await
                .map_err(ProviderError::Api);
            lock.release();

            busy_or_fail(&context, result)
        })
        .await?;

    wait_for_delete(state, ResourceType::NatRule, id, NAT_DELETE_TIMEOUT).await
}
