//! Server deployment, power state and deletion

use crate::compute::{NewServer, ResourceType, Server};
use crate::error::{ProviderError, Result};
use crate::resources::{SERVER_CREATE_TIMEOUT, SERVER_DELETE_TIMEOUT, SERVER_SHUTDOWN_TIMEOUT};
use crate::state::{ProviderState, network_domain_lock_key};
use crate::wait::{wait_for_change, wait_for_delete, wait_for_deploy};
use ddcloud_core::busy_or_fail;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PowerAction {
    Start,
    Shutdown,
    PowerOff,
}

impl PowerAction {
    fn verb(self) -> &'static str {
        match self {
            PowerAction::Start => "start",
            PowerAction::Shutdown => "shut down",
            PowerAction::PowerOff => "power off",
        }
    }

    fn title(self) -> &'static str {
        match self {
            PowerAction::Start => "Start server",
            PowerAction::Shutdown => "Shut down server",
            PowerAction::PowerOff => "Power off server",
        }
    }

    /// Starting and graceful shutdown count as reboots; a forced power-off
    /// is needed for deletion and is always allowed.
    fn requires_reboot_permission(self) -> bool {
        !matches!(self, PowerAction::PowerOff)
    }
}

/// Deploy a new server and wait until it is provisioned.
pub async fn deploy_server(state: &ProviderState, server: &NewServer) -> Result<Server> {
    tracing::info!(
        "Deploying server '{}' from image '{}' in network domain '{}'",
        server.name,
        server.image_id,
        server.network_domain_id
    );

    let description = format!("Deploy server '{}'", server.name);
    let lock_key = network_domain_lock_key(&server.network_domain_id);
    let (description_ref, lock_key) = (description.as_str(), lock_key.as_str());

    let server_id = state
        .retry_action(&description, move |context| async move {
            let lock = state
                .acquire_async_operation_lock_for(lock_key, description_ref)
                .await;
            let result = state
                .client()
                .deploy_server(server)
                .await
                .map_err(ProviderError::Api);
            lock.release();

            busy_or_fail(&context, result)
        })
        .await?;

    tracing::info!("Server '{}' ('{}') is being provisioned", server.name, server_id);
    wait_for_deploy(state, ResourceType::Server, &server_id, SERVER_CREATE_TIMEOUT).await?;

    state
        .client()
        .get_server(&server_id)
        .await?
        .ok_or(ProviderError::NotFound {
            resource_type: ResourceType::Server,
            id: server_id,
        })
}

/// Start a server. Refused unless server reboots are allowed.
pub async fn start_server(state: &ProviderState, server_id: &str) -> Result<()> {
    change_power_state(state, server_id, PowerAction::Start).await
}

/// Gracefully shut down a server. Refused unless server reboots are allowed.
pub async fn shutdown_server(state: &ProviderState, server_id: &str) -> Result<()> {
    change_power_state(state, server_id, PowerAction::Shutdown).await
}

/// Forcefully power off a server, regardless of the reboot setting
pub async fn power_off_server(state: &ProviderState, server_id: &str) -> Result<()> {
    change_power_state(state, server_id, PowerAction::PowerOff).await
}

async fn change_power_state(
    state: &ProviderState,
    server_id: &str,
    action: PowerAction,
) -> Result<()> {
    if action.requires_reboot_permission() && !state.settings().allow_server_reboots {
        return Err(ProviderError::RebootsNotAllowed {
            operation: action.verb(),
            server_id: server_id.to_string(),
        });
    }

    let server = state
        .client()
        .get_server(server_id)
        .await?
        .ok_or_else(|| ProviderError::NotFound {
            resource_type: ResourceType::Server,
            id: server_id.to_string(),
        })?;

    apply_power_action(state, &server, action).await
}

async fn apply_power_action(
    state: &ProviderState,
    server: &Server,
    action: PowerAction,
) -> Result<()> {
    let server_id = server.id.as_str();
    let description = format!("{} '{}'", action.title(), server_id);
    let lock_key = network_domain_lock_key(&server.network_domain_id);
    let (description_ref, lock_key) = (description.as_str(), lock_key.as_str());

    state
        .retry_action(&description, move |context| async move {
            let lock = state
                .acquire_async_operation_lock_for(lock_key, description_ref)
                .await;

            let client = state.client();
            let result = match action {
                PowerAction::Start => client.start_server(server_id).await,
                PowerAction::Shutdown => client.shutdown_server(server_id).await,
                PowerAction::PowerOff => client.power_off_server(server_id).await,
            }
            .map_err(ProviderError::Api);
            lock.release();

            busy_or_fail(&context, result)
        })
        .await?;

    wait_for_change(
        state,
        ResourceType::Server,
        server_id,
        action.title(),
        SERVER_SHUTDOWN_TIMEOUT,
    )
    .await
}

/// Delete a server, powering it off first if it is running.
///
/// A server that no longer exists is treated as already deleted.
pub async fn delete_server(state: &ProviderState, server_id: &str) -> Result<()> {
    let Some(server) = state.client().get_server(server_id).await? else {
        tracing::info!(
            "Server '{}' not found; treating it as already deleted",
            server_id
        );
        return Ok(());
    };

    tracing::info!(
        "Delete server '{}' ('{}') in network domain '{}'",
        server.id,
        server.name,
        server.network_domain_id
    );

    if server.started {
        tracing::info!(
            "Server '{}' is currently running and will be powered off",
            server_id
        );
        apply_power_action(state, &server, PowerAction::PowerOff).await?;
    }

    let description = format!("Delete server '{}'", server_id);
    let lock_key = network_domain_lock_key(&server.network_domain_id);
    let (description_ref, lock_key) = (description.as_str(), lock_key.as_str());

    state
        .retry_action(&description, move |context| async move {
            let lock = state
                .acquire_async_operation_lock_for(lock_key, description_ref)
                .await;
            let result = state
                .client()
                .delete_server(server_id)
                .await
                .map_err(ProviderError::Api);
            lock.release();

            busy_or_fail(&context, result)
        })
        .await?;

    tracing::info!("Server '{}' is being deleted", server_id);
    wait_for_delete(state, ResourceType::Server, server_id, SERVER_DELETE_TIMEOUT).await
}
