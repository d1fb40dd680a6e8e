//! Public IPv4 address blocks

use crate::compute::{PublicIpBlock, ResourceType};
use crate::error::{ProviderError, Result};
use crate::resources::PUBLIC_IP_BLOCK_CREATE_TIMEOUT;
use crate::state::ProviderState;
use crate::wait::wait_for_deploy;
use std::net::Ipv4Addr;

/// Allocate a new public IPv4 block in a network domain and wait for it.
///
/// Used as the remediation step when CloudControl reports that no public
/// address is free. Callers normally already hold the network domain's async
/// operation lock, so this does not take it again.
pub async fn add_public_ip_block(
    state: &ProviderState,
    network_domain_id: &str,
) -> Result<PublicIpBlock> {
    tracing::info!(
        "Requesting allocation of a new public IPv4 address block in network domain '{}'",
        network_domain_id
    );

    let block_id = state.client().add_public_ip_block(network_domain_id).await?;
    wait_for_deploy(
        state,
        ResourceType::PublicIpBlock,
        &block_id,
        PUBLIC_IP_BLOCK_CREATE_TIMEOUT,
    )
    .await?;

    let block = state
        .client()
        .get_public_ip_block(&block_id)
        .await?
        .ok_or_else(|| ProviderError::NotFound {
            resource_type: ResourceType::PublicIpBlock,
            id: block_id.clone(),
        })?;

    tracing::info!(
        "Allocated a new public IPv4 address block '{}' ({} addresses, starting at '{}')",
        block.id,
        block.size,
        block.base_ip
    );
    Ok(block)
}

/// Every address in a block, starting at its base address
pub fn calculate_block_addresses(block: &PublicIpBlock) -> Result<Vec<String>> {
    let base: Ipv4Addr = block
        .base_ip
        .parse()
        .map_err(|_| ProviderError::InvalidAddress(block.base_ip.clone()))?;
    let base = u32::from(base);

    (0..block.size)
        .map(|offset| {
            base.checked_add(offset)
                .map(|address| Ipv4Addr::from(address).to_string())
                .ok_or_else(|| ProviderError::InvalidAddress(block.base_ip.clone()))
        })
        .collect()
}
