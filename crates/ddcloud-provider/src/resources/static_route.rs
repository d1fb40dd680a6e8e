//! Network domain static routes

use crate::compute::{NewStaticRoute, ResourceType, StaticRoute};
use crate::error::{ProviderError, Result};
use crate::resources::STATIC_ROUTE_TIMEOUT;
use crate::state::{ProviderState, network_domain_lock_key};
use crate::wait::{wait_for_delete, wait_for_deploy};
use ddcloud_core::busy_or_fail;

pub async fn create_static_route(state: &ProviderState, route: &NewStaticRoute) -> Result<StaticRoute> {
    tracing::info!(
        network_domain = %route.network_domain_id,
        address_family = %route.address_family,
        "Create static route '{}' ({}/{} via {})",
        route.name,
        route.destination_network_address,
        route.destination_prefix_size,
        route.next_hop_address
    );

    let description = format!("Create static route '{}'", route.name);
    let lock_key = network_domain_lock_key(&route.network_domain_id);
    let (description_ref, lock_key) = (description.as_str(), lock_key.as_str());

    let route_id = state
        .retry_action(&description, move |context| async move {
            let lock = state
                .acquire_async_operation_lock_for(lock_key, description_ref)
                .await;
            let result = state
                .client()
                .create_static_route(route)
                .await
                .map_err(ProviderError::Api);
            lock.release();

            busy_or_fail(&context, result)
        })
        .await?;

    tracing::info!("Static route '{}' is being provisioned", route_id);
    wait_for_deploy(state, ResourceType::StaticRoute, &route_id, STATIC_ROUTE_TIMEOUT).await?;

    state
        .client()
        .get_static_route(&route_id)
        .await?
        .ok_or(ProviderError::NotFound {
            resource_type: ResourceType::StaticRoute,
            id: route_id,
        })
}

pub async fn delete_static_route(
    state: &ProviderState,
    network_domain_id: &str,
    id: &str,
) -> Result<()> {
    tracing::info!(
        "Delete static route '{}' in network domain '{}'",
        id,
        network_domain_id
    );

    let description = format!("Delete static route '{}'", id);
    let lock_key = network_domain_lock_key(network_domain_id);
    let (description_ref, lock_key) = (description.as_str(), lock_key.as_str());

    state
        .retry_action(&description, move |context| async move {
            let lock = state
                .acquire_async_operation_lock_for(lock_key, description_ref)
                .await;
            let result = state
                .client()
                .delete_static_route(id)
                .await
                .map_err(ProviderError::Api);
            lock.release();

            busy_or_fail(&context, result)
        })
        .await?;

    wait_for_delete(state, ResourceType::StaticRoute, id, STATIC_ROUTE_TIMEOUT).await
}

/// Static routes cannot be modified in place; delete the existing route and
/// create its replacement.
pub async fn replace_static_route(
    state: &ProviderState,
    id: &str,
    route: &NewStaticRoute,
) -> Result<StaticRoute> {
    tracing::info!("Re-create static route '{}' as '{}'", id, route.name);

    delete_static_route(state, &route.network_domain_id, id).await?;
    create_static_route(state, route).await
}
