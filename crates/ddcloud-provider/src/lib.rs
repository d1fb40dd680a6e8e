//! CloudControl resource handlers for the ddcloud provider
//!
//! Each handler issues its mutating CloudControl calls through the provider's
//! retry policy, serialized per network domain by the shared async operation
//! lock registry, then polls for completion.
//!
//! # Features
//!
//! - NAT rules, with automatic public IP block allocation
//! - Server deploy / start / shutdown / power off / delete
//! - Private IPv4 and IPv6 address reservations
//! - Static routes
//! - Server anti-affinity rules
//! - Load-balancer virtual listeners
//!
//! # Example
//!
//! ```ignore
//! use ddcloud_config::ProviderSettings;
//! use ddcloud_provider::{ProviderState, resources::nat};
//! use std::sync::Arc;
//!
//! let state = ProviderState::new(Arc::new(client), ProviderSettings::load()?)?;
//!
//! let rule = nat::create_nat_rule(&state, "nd-1", "10.0.0.5", None).await?;
//! println!("{} -> {}", rule.external_ip_address, rule.internal_ip_address);
//! ```

pub mod compute;
pub mod error;
pub mod resources;
pub mod state;
pub mod wait;

pub use compute::{
    ApiError, ApiResult, ComputeApi, NatRule, NewServer, NewStaticRoute, NewVirtualListener,
    PublicIpBlock, ReservedIpAddress, ResourceState, ResourceType, Server, StaticRoute, Vlan,
};
pub use error::{ProviderError, Result};
pub use state::{DEFAULT_POLL_INTERVAL, ProviderState, network_domain_lock_key};
pub use wait::{wait_for_change, wait_for_delete, wait_for_deploy};
