//! Load-balancer virtual listeners

use crate::compute::{NewVirtualListener, ResourceType};
use crate::error::{ProviderError, Result};
use crate::resources::VIRTUAL_LISTENER_TIMEOUT;
use crate::resources::public_ip::add_public_ip_block;
use crate::state::{ProviderState, network_domain_lock_key};
use crate::wait::{wait_for_delete, wait_for_deploy};
use ddcloud_core::{ErrorClass, busy_or_fail, classify};

/// Create a virtual listener, returning its id.
///
/// A listener without an explicit address takes a public IPv4 address from
/// the network domain; if none is free, a new block is allocated and the
/// creation is retried.
pub async fn create_virtual_listener(
    state: &ProviderState,
    listener: &NewVirtualListener,
) -> Result<String> {
    let network_domain_id = listener.network_domain_id.as_str();
    tracing::info!(
        "Create virtual listener '{}' ('{}') in network domain '{}'",
        listener.name,
        listener.description,
        network_domain_id
    );

    let description = format!("Create virtual listener '{}'", listener.name);
    let lock_key = network_domain_lock_key(network_domain_id);
    let (description_ref, lock_key) = (description.as_str(), lock_key.as_str());

    let listener_id = state
        .retry_action(&description, move |context| async move {
            let lock = state
                .acquire_async_operation_lock_for(lock_key, description_ref)
                .await;

            let result = state
                .client()
                .create_virtual_listener(listener)
                .await
                .map_err(ProviderError::Api);

            let attempt = match result {
                Ok(id) => context.done(id),
                Err(err) => match classify(&err) {
                    ErrorClass::ResourceBusy => context.retry_because(err),
                    ErrorClass::NoIpAddressAvailable => {
                        tracing::info!(
                            "There are no free public IPv4 addresses in network domain '{}'; requesting allocation of a new address block",
                            network_domain_id
                        );
                        match add_public_ip_block(state, network_domain_id).await {
                            Ok(_) => context.retry_because(err),
                            Err(block_err) => context.fail(block_err),
                        }
                    }
                    ErrorClass::Terminal => context.fail(err),
                },
            };

            lock.release();
            attempt
        })
        .await?;

    tracing::info!("Virtual listener '{}' is being provisioned", listener_id);
    wait_for_deploy(
        state,
        ResourceType::VirtualListener,
        &listener_id,
        VIRTUAL_LISTENER_TIMEOUT,
    )
    .await?;

    tracing::info!("Successfully created virtual listener '{}'", listener_id);
    Ok(listener_id)
}

pub async fn delete_virtual_listener(
    state: &ProviderState,
    network_domain_id: &str,
    id: &str,
) -> Result<()> {
    tracing::info!(
        "Delete virtual listener '{}' from network domain '{}'",
        id,
        network_domain_id
    );

    let description = format!("Delete virtual listener '{}'", id);
    let lock_key = network_domain_lock_key(network_domain_id);
    let (description_ref, lock_key) = (description.as_str(), lock_key.as_str());

    state
        .retry_action(&description, move |context| async move {
            let lock = state
                .acquire_async_operation_lock_for(lock_key, description_ref)
                .await;
            let result = state
                .client()
                .delete_virtual_listener(id)
                .await
                .map_err(ProviderError::Api);
            lock.release();

            busy_or_fail(&context, result)
        })
        .await?;

    wait_for_delete(state, ResourceType::VirtualListener, id, VIRTUAL_LISTENER_TIMEOUT).await
}
