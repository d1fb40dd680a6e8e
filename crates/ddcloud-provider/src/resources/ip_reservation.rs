//! Private IPv4 / IPv6 address reservations within a VLAN

use crate::compute::{ReservedIpAddress, ResourceType};
use crate::error::{ProviderError, Result};
use crate::state::{ProviderState, network_domain_lock_key};
use ddcloud_core::busy_or_fail;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressType {
    Ipv4,
    Ipv6,
}

impl AddressType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressType::Ipv4 => "ipv4",
            AddressType::Ipv6 => "ipv6",
        }
    }
}

impl std::fmt::Display for AddressType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AddressType {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ipv4" => Ok(AddressType::Ipv4),
            "ipv6" => Ok(AddressType::Ipv6),
            other => Err(ProviderError::InvalidAddressType(other.to_string())),
        }
    }
}

/// Identifier of a reservation: `address/description`
pub fn reservation_id(address: &str, description: &str) -> String {
    format!("{}/{}", address, description)
}

/// Lock key for a VLAN: reservations serialize with everything else in the
/// VLAN's network domain
async fn vlan_lock_key(state: &ProviderState, vlan_id: &str) -> Result<String> {
    let vlan = state
        .client()
        .get_vlan(vlan_id)
        .await?
        .ok_or_else(|| ProviderError::NotFound {
            resource_type: ResourceType::Vlan,
            id: vlan_id.to_string(),
        })?;
    Ok(network_domain_lock_key(&vlan.network_domain_id))
}

/// Reserve `address` in a VLAN, returning the reservation id.
///
/// `address_type` must be `ipv4` or `ipv6`; anything else fails without
/// calling CloudControl.
pub async fn reserve_ip_address(
    state: &ProviderState,
    vlan_id: &str,
    address: &str,
    address_type: &str,
    description: &str,
) -> Result<String> {
    let address_type: AddressType = address_type.parse()?;

    tracing::info!(
        "Reserving {} address '{}' ('{}') in VLAN '{}'",
        address_type,
        address,
        description,
        vlan_id
    );

    let operation = format!("Reserve IP address '{}'", address);
    let lock_key = vlan_lock_key(state, vlan_id).await?;
    let (operation_ref, lock_key) = (operation.as_str(), lock_key.as_str());

    state
        .retry_action(&operation, move |context| async move {
            let lock = state
                .acquire_async_operation_lock_for(lock_key, operation_ref)
                .await;

            let client = state.client();
            let result = match address_type {
                AddressType::Ipv4 => {
                    client
                        .reserve_private_ipv4_address(vlan_id, address, description)
                        .await
                }
                AddressType::Ipv6 => client.reserve_ipv6_address(vlan_id, address, description).await,
            }
            .map_err(ProviderError::Api);
            lock.release();

            busy_or_fail(&context, result)
        })
        .await?;

    tracing::info!(
        "Reserved {} address '{}' in VLAN '{}'",
        address_type,
        address,
        vlan_id
    );
    Ok(reservation_id(address, description))
}

pub async fn unreserve_ip_address(
    state: &ProviderState,
    vlan_id: &str,
    address: &str,
    address_type: &str,
) -> Result<()> {
    let address_type: AddressType = address_type.parse()?;

    tracing::info!(
        "Releasing {} address reservation '{}' in VLAN '{}'",
        address_type,
        address,
        vlan_id
    );

    let operation = format!("Unreserve IP address '{}'", address);
    let lock_key = vlan_lock_key(state, vlan_id).await?;
    let (operation_ref, lock_key) = (operation.as_str(), lock_key.as_str());

    state
        .retry_action(&operation, move |context| async move {
            let lock = state
                .acquire_async_operation_lock_for(lock_key, operation_ref)
                .await;

            let client = state.client();
            let result = match address_type {
                AddressType::Ipv4 => client.unreserve_private_ipv4_address(vlan_id, address).await,
                AddressType::Ipv6 => client.unreserve_ipv6_address(vlan_id, address).await,
            }
            .map_err(ProviderError::Api);
            lock.release();

            busy_or_fail(&context, result)
        })
        .await
}

/// Look up a reservation, `None` if the address is not reserved
pub async fn read_ip_address_reservation(
    state: &ProviderState,
    vlan_id: &str,
    address: &str,
    address_type: &str,
) -> Result<Option<ReservedIpAddress>> {
    let address_type: AddressType = address_type.parse()?;

    let client = state.client();
    let reserved = match address_type {
        AddressType::Ipv4 => client.list_reserved_private_ipv4_addresses(vlan_id).await?,
        AddressType::Ipv6 => client.list_reserved_ipv6_addresses(vlan_id).await?,
    };

    let reservation = reserved
        .into_iter()
        .find(|reservation| reservation.ip_address == address);
    if reservation.is_none() {
        tracing::info!("IP address '{}' is not reserved in VLAN '{}'", address, vlan_id);
    }
    Ok(reservation)
}
