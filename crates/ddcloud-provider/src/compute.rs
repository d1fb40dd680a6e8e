//! CloudControl compute API abstraction
//!
//! The handlers talk to CloudControl only through [`ComputeApi`]. Mutating
//! calls are asynchronous on the platform side: they return as soon as the
//! request is accepted and the resource is then polled via
//! [`ComputeApi::resource_status`] until it settles.

use async_trait::async_trait;
use ddcloud_core::{
    ApiResponseCode, RESPONSE_CODE_NO_IP_ADDRESS_AVAILABLE, RESPONSE_CODE_RESOURCE_BUSY,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned by CloudControl
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation} failed ({}): {message}", .response_code.as_deref().unwrap_or("no response code"))]
pub struct ApiError {
    /// API operation that failed (e.g. "ADD_NAT_RULE")
    pub operation: String,

    /// CloudControl response code, absent for transport-level failures
    pub response_code: Option<String>,

    pub message: String,
}

impl ApiError {
    pub fn new(
        operation: impl Into<String>,
        response_code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation: operation.into(),
            response_code: Some(response_code.into()),
            message: message.into(),
        }
    }

    /// Failure without a CloudControl response (connection reset, bad gateway, ...)
    pub fn transport(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            response_code: None,
            message: message.into(),
        }
    }

    pub fn resource_busy(operation: impl Into<String>) -> Self {
        Self::new(
            operation,
            RESPONSE_CODE_RESOURCE_BUSY,
            "Another operation is in progress on this resource",
        )
    }

    pub fn no_ip_address_available(operation: impl Into<String>) -> Self {
        Self::new(
            operation,
            RESPONSE_CODE_NO_IP_ADDRESS_AVAILABLE,
            "There are no free public IPv4 addresses in the network domain",
        )
    }
}

impl ApiResponseCode for ApiError {
    fn response_code(&self) -> Option<&str> {
        self.response_code.as_deref()
    }
}

/// Kinds of resource that can be polled for completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Server,
    NatRule,
    PublicIpBlock,
    StaticRoute,
    ServerAntiAffinityRule,
    VirtualListener,
    Vlan,
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceType::Server => write!(f, "server"),
            ResourceType::NatRule => write!(f, "NAT rule"),
            ResourceType::PublicIpBlock => write!(f, "public IP block"),
            ResourceType::StaticRoute => write!(f, "static route"),
            ResourceType::ServerAntiAffinityRule => write!(f, "server anti-affinity rule"),
            ResourceType::VirtualListener => write!(f, "virtual listener"),
            ResourceType::Vlan => write!(f, "VLAN"),
        }
    }
}

/// Provisioning state reported by CloudControl
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceState {
    Normal,
    PendingAdd,
    PendingChange,
    PendingDelete,
    /// Any FAILED_* state, with the platform's reason
    Failed(String),
}

impl ResourceState {
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            ResourceState::PendingAdd | ResourceState::PendingChange | ResourceState::PendingDelete
        )
    }
}

impl std::fmt::Display for ResourceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceState::Normal => write!(f, "NORMAL"),
            ResourceState::PendingAdd => write!(f, "PENDING_ADD"),
            ResourceState::PendingChange => write!(f, "PENDING_CHANGE"),
            ResourceState::PendingDelete => write!(f, "PENDING_DELETE"),
            ResourceState::Failed(reason) => write!(f, "FAILED ({})", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NatRule {
    pub id: String,
    pub network_domain_id: String,
    pub internal_ip_address: String,
    pub external_ip_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicIpBlock {
    pub id: String,
    pub network_domain_id: String,
    pub base_ip: String,
    pub size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Server {
    pub id: String,
    pub name: String,
    pub network_domain_id: String,
    pub started: bool,
}

/// Request for a new server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewServer {
    pub name: String,
    pub description: String,
    pub network_domain_id: String,
    pub image_id: String,
    /// VLAN for the primary network adapter
    pub primary_vlan_id: Option<String>,
    /// Allocated from the primary VLAN when absent
    pub primary_ipv4_address: Option<String>,
    pub memory_gb: Option<u32>,
    pub cpu_count: Option<u32>,
    /// Power the server on once deployed
    pub start: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vlan {
    pub id: String,
    pub name: String,
    pub network_domain_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservedIpAddress {
    pub ip_address: String,
    pub vlan_id: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticRoute {
    pub id: String,
    pub network_domain_id: String,
    pub name: String,
    pub description: String,
    pub address_family: String,
    pub destination_network_address: String,
    pub destination_prefix_size: u8,
    pub next_hop_address: String,
}

/// Request for a new static route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStaticRoute {
    pub network_domain_id: String,
    pub name: String,
    pub description: String,
    pub address_family: String,
    pub destination_network_address: String,
    pub destination_prefix_size: u8,
    pub next_hop_address: String,
}

/// Request for a new load-balancer virtual listener
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVirtualListener {
    pub network_domain_id: String,
    pub name: String,
    pub description: String,
    pub protocol: String,
    /// Allocated by CloudControl when absent
    pub listener_ip_address: Option<String>,
    pub port: Option<u16>,
    pub pool_id: Option<String>,
    pub enabled: bool,
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// CloudControl compute operations used by the resource handlers
#[async_trait]
pub trait ComputeApi: Send + Sync {
    /// Current provisioning state, `None` once the resource is gone
    async fn resource_status(&self, resource_type: ResourceType, id: &str)
    -> ApiResult<Option<ResourceState>>;

    // NAT rules
    async fn add_nat_rule(
        &self,
        network_domain_id: &str,
        internal_ip: &str,
        external_ip: Option<&str>,
    ) -> ApiResult<String>;
    async fn get_nat_rule(&self, id: &str) -> ApiResult<Option<NatRule>>;
    async fn delete_nat_rule(&self, id: &str) -> ApiResult<()>;

    // Public IP blocks
    async fn add_public_ip_block(&self, network_domain_id: &str) -> ApiResult<String>;
    async fn get_public_ip_block(&self, id: &str) -> ApiResult<Option<PublicIpBlock>>;

    // Servers
    async fn deploy_server(&self, server: &NewServer) -> ApiResult<String>;
    async fn get_server(&self, id: &str) -> ApiResult<Option<Server>>;
    async fn start_server(&self, id: &str) -> ApiResult<()>;
    async fn shutdown_server(&self, id: &str) -> ApiResult<()>;
    async fn power_off_server(&self, id: &str) -> ApiResult<()>;
    async fn delete_server(&self, id: &str) -> ApiResult<()>;

    // VLANs and IP address reservations
    async fn get_vlan(&self, id: &str) -> ApiResult<Option<Vlan>>;
    async fn reserve_private_ipv4_address(
        &self,
        vlan_id: &str,
        address: &str,
        description: &str,
    ) -> ApiResult<()>;
    async fn unreserve_private_ipv4_address(&self, vlan_id: &str, address: &str)
    -> ApiResult<()>;
    async fn list_reserved_private_ipv4_addresses(
        &self,
        vlan_id: &str,
    ) -> ApiResult<Vec<ReservedIpAddress>>;
    async fn reserve_ipv6_address(
        &self,
        vlan_id: &str,
        address: &str,
        description: &str,
    ) -> ApiResult<()>;
    async fn unreserve_ipv6_address(&self, vlan_id: &str, address: &str) -> ApiResult<()>;
    async fn list_reserved_ipv6_addresses(&self, vlan_id: &str)
    -> ApiResult<Vec<ReservedIpAddress>>;

    // Static routes
    async fn create_static_route(&self, route: &NewStaticRoute) -> ApiResult<String>;
    async fn get_static_route(&self, id: &str) -> ApiResult<Option<StaticRoute>>;
    async fn delete_static_route(&self, id: &str) -> ApiResult<()>;

    // Server anti-affinity rules
    async fn create_server_anti_affinity_rule(
        &self,
        server_id1: &str,
        server_id2: &str,
    ) -> ApiResult<String>;
    async fn delete_server_anti_affinity_rule(
        &self,
        rule_id: &str,
        network_domain_id: &str,
    ) -> ApiResult<()>;

    // Virtual listeners
    async fn create_virtual_listener(&self, listener: &NewVirtualListener) -> ApiResult<String>;
    async fn delete_virtual_listener(&self, id: &str) -> ApiResult<()>;
}
