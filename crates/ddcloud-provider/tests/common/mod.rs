use async_trait::async_trait;
use ddcloud_config::ProviderSettings;
use ddcloud_provider::{
    ApiError, ApiResult, ComputeApi, NatRule, NewServer, NewStaticRoute, NewVirtualListener,
    ProviderState, PublicIpBlock, ReservedIpAddress, ResourceState, ResourceType, Server,
    StaticRoute, Vlan,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

pub const NETWORK_DOMAIN: &str = "nd-1";
pub const VLAN: &str = "vlan-1";

/// In-memory CloudControl.
///
/// Rejects overlapping mutating calls within the same network domain with
/// `UNEXPECTED_ERROR`, the way the real platform does. Server and VLAN calls
/// count against the domain the server or VLAN belongs to.
pub struct FakeComputeApi {
    inner: Mutex<FakeState>,
    call_delay: Duration,
}

#[derive(Default)]
struct FakeState {
    next_id: u32,
    calls: HashMap<&'static str, u32>,
    scripted_errors: HashMap<&'static str, VecDeque<ApiError>>,
    in_flight: HashSet<String>,
    overlaps: u32,
    max_concurrent: usize,
    pending_polls: usize,
    statuses: HashMap<String, VecDeque<Option<ResourceState>>>,
    free_public_ips: HashMap<String, VecDeque<String>>,
    next_block_octet: u32,
    nat_rules: HashMap<String, NatRule>,
    public_ip_blocks: HashMap<String, PublicIpBlock>,
    servers: HashMap<String, Server>,
    vlans: HashMap<String, Vlan>,
    reserved_ipv4: HashMap<String, Vec<ReservedIpAddress>>,
    reserved_ipv6: HashMap<String, Vec<ReservedIpAddress>>,
    static_routes: HashMap<String, StaticRoute>,
    anti_affinity_rules: HashMap<String, String>,
    virtual_listeners: HashMap<String, String>,
}

impl FakeState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn settle(&mut self, id: &str, pending: ResourceState, outcome: Option<ResourceState>) {
        let mut sequence: VecDeque<_> = std::iter::repeat_n(Some(pending), self.pending_polls).collect();
        sequence.push_back(outcome);
        self.statuses.insert(id.to_string(), sequence);
    }

    fn deployed(&mut self, id: &str) {
        self.settle(id, ResourceState::PendingAdd, Some(ResourceState::Normal));
    }

    fn changed(&mut self, id: &str) {
        self.settle(id, ResourceState::PendingChange, Some(ResourceState::Normal));
    }

    fn deleted(&mut self, id: &str) {
        self.settle(id, ResourceState::PendingDelete, None);
    }

    fn take_public_ip(&mut self, operation: &'static str, network_domain_id: &str) -> ApiResult<String> {
        self.free_public_ips
            .get_mut(network_domain_id)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| ApiError::no_ip_address_available(operation))
    }
}

#[allow(dead_code)]
impl FakeComputeApi {
    /// Starts out with [`VLAN`] in [`NETWORK_DOMAIN`]
    pub fn new() -> Self {
        let fake = Self {
            inner: Mutex::new(FakeState {
                next_block_octet: 10,
                ..FakeState::default()
            }),
            call_delay: Duration::from_millis(50),
        };
        fake.with_vlan(VLAN, NETWORK_DOMAIN)
    }

    pub fn with_vlan(self, id: &str, network_domain_id: &str) -> Self {
        self.state().vlans.insert(
            id.to_string(),
            Vlan {
                id: id.to_string(),
                name: format!("{}-name", id),
                network_domain_id: network_domain_id.to_string(),
            },
        );
        self
    }

    pub fn with_call_delay(mut self, call_delay: Duration) -> Self {
        self.call_delay = call_delay;
        self
    }

    /// Number of PENDING_* polls before a resource settles
    pub fn with_pending_polls(self, polls: usize) -> Self {
        self.state().pending_polls = polls;
        self
    }

    pub fn with_server(self, id: &str, network_domain_id: &str, started: bool) -> Self {
        {
            let mut state = self.state();
            state.servers.insert(
                id.to_string(),
                Server {
                    id: id.to_string(),
                    name: format!("{}-name", id),
                    network_domain_id: network_domain_id.to_string(),
                    started,
                },
            );
            state.statuses.insert(id.to_string(), VecDeque::from([Some(ResourceState::Normal)]));
        }
        self
    }

    pub fn with_free_public_ips(self, network_domain_id: &str, addresses: &[&str]) -> Self {
        self.state()
            .free_public_ips
            .entry(network_domain_id.to_string())
            .or_default()
            .extend(addresses.iter().map(|address| address.to_string()));
        self
    }

    /// Queue an error for the next call of `operation`
    pub fn fail_next(&self, operation: &'static str, err: ApiError) {
        self.state()
            .scripted_errors
            .entry(operation)
            .or_default()
            .push_back(err);
    }

    pub fn fail_next_times(&self, operation: &'static str, times: usize, err: ApiError) {
        for _ in 0..times {
            self.fail_next(operation, err.clone());
        }
    }

    /// Script the statuses reported for `id`; the last one sticks
    pub fn set_statuses(&self, id: &str, statuses: Vec<Option<ResourceState>>) {
        self.state().statuses.insert(id.to_string(), statuses.into());
    }

    pub fn calls(&self, operation: &str) -> u32 {
        self.state().calls.get(operation).copied().unwrap_or(0)
    }

    pub fn overlaps(&self) -> u32 {
        self.state().overlaps
    }

    pub fn max_concurrent(&self) -> usize {
        self.state().max_concurrent
    }

    pub fn server(&self, id: &str) -> Option<Server> {
        self.state().servers.get(id).cloned()
    }

    pub fn nat_rule_count(&self) -> usize {
        self.state().nat_rules.len()
    }

    pub fn public_ip_block_count(&self) -> usize {
        self.state().public_ip_blocks.len()
    }

    pub fn reserved_ipv4(&self, vlan_id: &str) -> Vec<ReservedIpAddress> {
        self.state().reserved_ipv4.get(vlan_id).cloned().unwrap_or_default()
    }

    pub fn reserved_ipv6(&self, vlan_id: &str) -> Vec<ReservedIpAddress> {
        self.state().reserved_ipv6.get(vlan_id).cloned().unwrap_or_default()
    }

    pub fn static_route_count(&self) -> usize {
        self.state().static_routes.len()
    }

    pub fn anti_affinity_rule_count(&self) -> usize {
        self.state().anti_affinity_rules.len()
    }

    pub fn virtual_listener_address(&self, id: &str) -> Option<String> {
        self.state().virtual_listeners.get(id).cloned()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.inner.lock().unwrap()
    }

    fn record(&self, operation: &'static str) {
        *self.state().calls.entry(operation).or_default() += 1;
    }

    /// One asynchronous CloudControl operation against `scope`
    async fn mutate<T>(
        &self,
        operation: &'static str,
        scope: String,
        apply: impl FnOnce(&mut FakeState) -> ApiResult<T> + Send,
    ) -> ApiResult<T> {
        {
            let mut state = self.state();
            *state.calls.entry(operation).or_default() += 1;

            if let Some(err) = state
                .scripted_errors
                .get_mut(operation)
                .and_then(VecDeque::pop_front)
            {
                return Err(err);
            }

            if !state.in_flight.insert(scope.clone()) {
                state.overlaps += 1;
                return Err(ApiError::new(
                    operation,
                    "UNEXPECTED_ERROR",
                    "Another asynchronous operation was initiated concurrently",
                ));
            }
            let concurrent = state.in_flight.len();
            state.max_concurrent = state.max_concurrent.max(concurrent);
        }

        if !self.call_delay.is_zero() {
            tokio::time::sleep(self.call_delay).await;
        }

        let mut state = self.state();
        state.in_flight.remove(&scope);
        apply(&mut *state)
    }

    fn network_domain_scope(network_domain_id: &str) -> String {
        format!("networkdomain/{}", network_domain_id)
    }

    fn server_scope(&self, server_id: &str) -> String {
        let state = self.state();
        let network_domain_id = state
            .servers
            .get(server_id)
            .map(|server| server.network_domain_id.as_str())
            .unwrap_or(server_id);
        Self::network_domain_scope(network_domain_id)
    }

    fn vlan_scope(&self, vlan_id: &str) -> String {
        let state = self.state();
        let network_domain_id = state
            .vlans
            .get(vlan_id)
            .map(|vlan| vlan.network_domain_id.as_str())
            .unwrap_or(vlan_id);
        Self::network_domain_scope(network_domain_id)
    }

    fn nat_rule_scope(&self, id: &str) -> String {
        let state = self.state();
        let network_domain_id = state
            .nat_rules
            .get(id)
            .map(|rule| rule.network_domain_id.as_str())
            .unwrap_or(id);
        Self::network_domain_scope(network_domain_id)
    }
}

#[async_trait]
impl ComputeApi for FakeComputeApi {
    async fn resource_status(
        &self,
        _resource_type: ResourceType,
        id: &str,
    ) -> ApiResult<Option<ResourceState>> {
        self.record("GET_RESOURCE_STATUS");

        let mut state = self.state();
        let Some(sequence) = state.statuses.get_mut(id) else {
            return Ok(None);
        };
        if sequence.len() > 1 {
            Ok(sequence.pop_front().flatten())
        } else {
            Ok(sequence.front().cloned().flatten())
        }
    }

    async fn add_nat_rule(
        &self,
        network_domain_id: &str,
        internal_ip: &str,
        external_ip: Option<&str>,
    ) -> ApiResult<String> {
        let scope = Self::network_domain_scope(network_domain_id);
        self.mutate("ADD_NAT_RULE", scope, |state| {
            let external_ip = match external_ip {
                Some(address) => address.to_string(),
                None => state.take_public_ip("ADD_NAT_RULE", network_domain_id)?,
            };
            let id = state.next_id("nat");
            state.nat_rules.insert(
                id.clone(),
                NatRule {
                    id: id.clone(),
                    network_domain_id: network_domain_id.to_string(),
                    internal_ip_address: internal_ip.to_string(),
                    external_ip_address: external_ip,
                },
            );
            state.deployed(&id);
            Ok(id)
        })
        .await
    }

    async fn get_nat_rule(&self, id: &str) -> ApiResult<Option<NatRule>> {
        self.record("GET_NAT_RULE");
        Ok(self.state().nat_rules.get(id).cloned())
    }

    async fn delete_nat_rule(&self, id: &str) -> ApiResult<()> {
        let scope = self.nat_rule_scope(id);
        self.mutate("DELETE_NAT_RULE", scope, |state| {
            if state.nat_rules.remove(id).is_none() {
                return Err(ApiError::new(
                    "DELETE_NAT_RULE",
                    "RESOURCE_NOT_FOUND",
                    format!("NAT rule '{}' not found", id),
                ));
            }
            state.deleted(id);
            Ok(())
        })
        .await
    }

    async fn add_public_ip_block(&self, network_domain_id: &str) -> ApiResult<String> {
        // Called while the caller already holds the network domain lock
        self.record("ADD_PUBLIC_IP_BLOCK");
        if let Some(err) = self
            .state()
            .scripted_errors
            .get_mut("ADD_PUBLIC_IP_BLOCK")
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }

        let mut state = self.state();
        let id = state.next_id("block");
        let octet = state.next_block_octet;
        state.next_block_octet += 1;

        let block = PublicIpBlock {
            id: id.clone(),
            network_domain_id: network_domain_id.to_string(),
            base_ip: format!("168.128.{}.4", octet),
            size: 2,
        };
        let addresses = [format!("168.128.{}.4", octet), format!("168.128.{}.5", octet)];
        state
            .free_public_ips
            .entry(network_domain_id.to_string())
            .or_default()
            .extend(addresses);
        state.public_ip_blocks.insert(id.clone(), block);
        state.deployed(&id);
        Ok(id)
    }

    async fn get_public_ip_block(&self, id: &str) -> ApiResult<Option<PublicIpBlock>> {
        self.record("GET_PUBLIC_IP_BLOCK");
        Ok(self.state().public_ip_blocks.get(id).cloned())
    }

    async fn deploy_server(&self, server: &NewServer) -> ApiResult<String> {
        let scope = Self::network_domain_scope(&server.network_domain_id);
        self.mutate("DEPLOY_SERVER", scope, |state| {
            let id = state.next_id("server");
            state.servers.insert(
                id.clone(),
                Server {
                    id: id.clone(),
                    name: server.name.clone(),
                    network_domain_id: server.network_domain_id.clone(),
                    started: server.start,
                },
            );
            state.deployed(&id);
            Ok(id)
        })
        .await
    }

    async fn get_server(&self, id: &str) -> ApiResult<Option<Server>> {
        self.record("GET_SERVER");
        Ok(self.state().servers.get(id).cloned())
    }

    async fn start_server(&self, id: &str) -> ApiResult<()> {
        self.mutate("START_SERVER", self.server_scope(id), |state| {
            if let Some(server) = state.servers.get_mut(id) {
                server.started = true;
            }
            state.changed(id);
            Ok(())
        })
        .await
    }

    async fn shutdown_server(&self, id: &str) -> ApiResult<()> {
        self.mutate("SHUTDOWN_SERVER", self.server_scope(id), |state| {
            if let Some(server) = state.servers.get_mut(id) {
                server.started = false;
            }
            state.changed(id);
            Ok(())
        })
        .await
    }

    async fn power_off_server(&self, id: &str) -> ApiResult<()> {
        self.mutate("POWER_OFF_SERVER", self.server_scope(id), |state| {
            if let Some(server) = state.servers.get_mut(id) {
                server.started = false;
            }
            state.changed(id);
            Ok(())
        })
        .await
    }

    async fn delete_server(&self, id: &str) -> ApiResult<()> {
        self.mutate("DELETE_SERVER", self.server_scope(id), |state| {
            match state.servers.get(id) {
                Some(server) if server.started => {
                    return Err(ApiError::new(
                        "DELETE_SERVER",
                        "SERVER_STARTED",
                        format!("Server '{}' must be stopped first", id),
                    ));
                }
                Some(_) => {}
                None => {
                    return Err(ApiError::new(
                        "DELETE_SERVER",
                        "RESOURCE_NOT_FOUND",
                        format!("Server '{}' not found", id),
                    ));
                }
            }
            state.servers.remove(id);
            state.deleted(id);
            Ok(())
        })
        .await
    }

    async fn get_vlan(&self, id: &str) -> ApiResult<Option<Vlan>> {
        self.record("GET_VLAN");
        Ok(self.state().vlans.get(id).cloned())
    }

    async fn reserve_private_ipv4_address(
        &self,
        vlan_id: &str,
        address: &str,
        description: &str,
    ) -> ApiResult<()> {
        let scope = self.vlan_scope(vlan_id);
        self.mutate("RESERVE_PRIVATE_IPV4_ADDRESS", scope, |state| {
            state
                .reserved_ipv4
                .entry(vlan_id.to_string())
                .or_default()
                .push(ReservedIpAddress {
                    ip_address: address.to_string(),
                    vlan_id: vlan_id.to_string(),
                    description: description.to_string(),
                });
            Ok(())
        })
        .await
    }

    async fn unreserve_private_ipv4_address(&self, vlan_id: &str, address: &str) -> ApiResult<()> {
        let scope = self.vlan_scope(vlan_id);
        self.mutate("UNRESERVE_PRIVATE_IPV4_ADDRESS", scope, |state| {
            if let Some(reserved) = state.reserved_ipv4.get_mut(vlan_id) {
                reserved.retain(|reservation| reservation.ip_address != address);
            }
            Ok(())
        })
        .await
    }

    async fn list_reserved_private_ipv4_addresses(
        &self,
        vlan_id: &str,
    ) -> ApiResult<Vec<ReservedIpAddress>> {
        self.record("LIST_RESERVED_PRIVATE_IPV4_ADDRESSES");
        Ok(self.reserved_ipv4(vlan_id))
    }

    async fn reserve_ipv6_address(
        &self,
        vlan_id: &str,
        address: &str,
        description: &str,
    ) -> ApiResult<()> {
        let scope = self.vlan_scope(vlan_id);
        self.mutate("RESERVE_IPV6_ADDRESS", scope, |state| {
            state
                .reserved_ipv6
                .entry(vlan_id.to_string())
                .or_default()
                .push(ReservedIpAddress {
                    ip_address: address.to_string(),
                    vlan_id: vlan_id.to_string(),
                    description: description.to_string(),
                });
            Ok(())
        })
        .await
    }

    async fn unreserve_ipv6_address(&self, vlan_id: &str, address: &str) -> ApiResult<()> {
        let scope = self.vlan_scope(vlan_id);
        self.mutate("UNRESERVE_IPV6_ADDRESS", scope, |state| {
            if let Some(reserved) = state.reserved_ipv6.get_mut(vlan_id) {
                reserved.retain(|reservation| reservation.ip_address != address);
            }
            Ok(())
        })
        .await
    }

    async fn list_reserved_ipv6_addresses(
        &self,
        vlan_id: &str,
    ) -> ApiResult<Vec<ReservedIpAddress>> {
        self.record("LIST_RESERVED_IPV6_ADDRESSES");
        Ok(self.reserved_ipv6(vlan_id))
    }

    async fn create_static_route(&self, route: &NewStaticRoute) -> ApiResult<String> {
        let scope = Self::network_domain_scope(&route.network_domain_id);
        self.mutate("CREATE_STATIC_ROUTE", scope, |state| {
            let id = state.next_id("route");
            state.static_routes.insert(
                id.clone(),
                StaticRoute {
                    id: id.clone(),
                    network_domain_id: route.network_domain_id.clone(),
                    name: route.name.clone(),
                    description: route.description.clone(),
                    address_family: route.address_family.clone(),
                    destination_network_address: route.destination_network_address.clone(),
                    destination_prefix_size: route.destination_prefix_size,
                    next_hop_address: route.next_hop_address.clone(),
                },
            );
            state.deployed(&id);
            Ok(id)
        })
        .await
    }

    async fn get_static_route(&self, id: &str) -> ApiResult<Option<StaticRoute>> {
        self.record("GET_STATIC_ROUTE");
        Ok(self.state().static_routes.get(id).cloned())
    }

    async fn delete_static_route(&self, id: &str) -> ApiResult<()> {
        let scope = {
            let state = self.state();
            let network_domain_id = state
                .static_routes
                .get(id)
                .map(|route| route.network_domain_id.clone())
                .unwrap_or_else(|| id.to_string());
            Self::network_domain_scope(&network_domain_id)
        };
        self.mutate("DELETE_STATIC_ROUTE", scope, |state| {
            state.static_routes.remove(id);
            state.deleted(id);
            Ok(())
        })
        .await
    }

    async fn create_server_anti_affinity_rule(
        &self,
        server_id1: &str,
        server_id2: &str,
    ) -> ApiResult<String> {
        let network_domain_id = self
            .server(server_id1)
            .map(|server| server.network_domain_id)
            .unwrap_or_default();
        let scope = Self::network_domain_scope(&network_domain_id);
        self.mutate("CREATE_ANTI_AFFINITY_RULE", scope, |state| {
            let id = state.next_id("rule");
            state
                .anti_affinity_rules
                .insert(id.clone(), network_domain_id.clone());
            state.changed(&format!("{}/{}", network_domain_id, id));
            Ok(id)
        })
        .await
    }

    async fn delete_server_anti_affinity_rule(
        &self,
        rule_id: &str,
        network_domain_id: &str,
    ) -> ApiResult<()> {
        let scope = Self::network_domain_scope(network_domain_id);
        self.mutate("DELETE_ANTI_AFFINITY_RULE", scope, |state| {
            state.anti_affinity_rules.remove(rule_id);
            state.deleted(&format!("{}/{}", network_domain_id, rule_id));
            Ok(())
        })
        .await
    }

    async fn create_virtual_listener(&self, listener: &NewVirtualListener) -> ApiResult<String> {
        let scope = Self::network_domain_scope(&listener.network_domain_id);
        self.mutate("CREATE_VIRTUAL_LISTENER", scope, |state| {
            let address = match &listener.listener_ip_address {
                Some(address) => address.clone(),
                None => state.take_public_ip("CREATE_VIRTUAL_LISTENER", &listener.network_domain_id)?,
            };
            let id = state.next_id("listener");
            state.virtual_listeners.insert(id.clone(), address);
            state.deployed(&id);
            Ok(id)
        })
        .await
    }

    async fn delete_virtual_listener(&self, id: &str) -> ApiResult<()> {
        let scope = Self::network_domain_scope(NETWORK_DOMAIN);
        self.mutate("DELETE_VIRTUAL_LISTENER", scope, |state| {
            state.virtual_listeners.remove(id);
            state.deleted(id);
            Ok(())
        })
        .await
    }
}

/// Settings used by the integration tests: default retry policy (10 attempts,
/// 5s apart) under paused tokio time.
#[allow(dead_code)]
pub fn test_settings() -> ProviderSettings {
    ProviderSettings::default()
}

#[allow(dead_code)]
pub fn provider_state(fake: &Arc<FakeComputeApi>, settings: ProviderSettings) -> ProviderState {
    let client: Arc<dyn ComputeApi> = fake.clone();
    ProviderState::new(client, settings)
        .unwrap()
        .with_poll_interval(Duration::from_secs(1))
}

#[allow(dead_code)]
pub fn busy(operation: &'static str) -> ApiError {
    ApiError::resource_busy(operation)
}

#[allow(dead_code)]
pub fn no_ip(operation: &'static str) -> ApiError {
    ApiError::no_ip_address_available(operation)
}
