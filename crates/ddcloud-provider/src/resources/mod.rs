//! Resource operation handlers
//!
//! Every mutating call follows the same shape:
//!
//! 1. `retry_action` with a human-readable description,
//! 2. inside the action, take the async operation lock for the affected key,
//!    make exactly one remote call, classify the result, release the lock,
//! 3. after the retry loop, poll for completion without holding the lock.

pub mod anti_affinity;
pub mod ip_reservation;
pub mod nat;
pub mod public_ip;
pub mod server;
pub mod static_route;
pub mod virtual_listener;

use std::time::Duration;

pub const SERVER_CREATE_TIMEOUT: Duration = Duration::from_secs(30 * 60);
pub const SERVER_DELETE_TIMEOUT: Duration = Duration::from_secs(15 * 60);
/// Start, shutdown and power-off all settle within this
pub const SERVER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5 * 60);

pub const NAT_CREATE_TIMEOUT: Duration = Duration::from_secs(30 * 60);
pub const NAT_DELETE_TIMEOUT: Duration = Duration::from_secs(15 * 60);

pub const PUBLIC_IP_BLOCK_CREATE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

pub const STATIC_ROUTE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

pub const ANTI_AFFINITY_RULE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

pub const VIRTUAL_LISTENER_TIMEOUT: Duration = Duration::from_secs(10 * 60);
