//! In-memory cloud
//!
//! A [`CloudClient`] backed by plain collections. It mimics the platform
//! behaviours the engine has to cope with:
//!
//! - creating a project also creates its `default` security group
//! - deleting the `default` security group of a live project recreates it
//! - a configurable create race (the resource appears, the call fails with
//!   `AlreadyExists`)
//! - a deployment without a volume service
//!
//! Every mutating call is appended to a journal so callers can assert on
//! the exact order of operations.

use crate::client::CloudClient;
use crate::error::{CloudError, ResourceKind, Result};
use crate::model::{
    Direction, FixedIp, Group, Network, Port, Project, QuotaKind, QuotaSet, Router, RuleSpec,
    SecurityGroup, SecurityGroupRule, Server, Subnet, User, Volume,
};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashSet};
use std::sync::{Mutex, MutexGuard};

const EXTERNAL_NETWORK: &str = "public";
const ADMIN_PROJECT_ID: &str = "admin";
const DEFAULT_SECURITY_GROUP: &str = "default";

#[derive(Debug, Clone)]
struct Owned<T> {
    project_id: String,
    item: T,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    projects: Vec<Project>,
    networks: Vec<Network>,
    subnets: Vec<Subnet>,
    routers: Vec<Router>,
    ports: Vec<Port>,
    security_groups: Vec<SecurityGroup>,
    rules: Vec<SecurityGroupRule>,
    servers: Vec<Owned<Server>>,
    volumes: Vec<Owned<Volume>>,
    quotas: Vec<(String, QuotaSet)>,
    users: Vec<User>,
    groups: Vec<Group>,
    memberships: BTreeSet<(String, String)>,
    grants: BTreeSet<(String, String, String)>,
    no_volume_service: bool,
    races: HashSet<ResourceKind>,
    journal: Vec<String>,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{:04}", prefix, self.next_id)
    }

    fn record(&mut self, entry: impl Into<String>) {
        self.journal.push(entry.into());
    }

    /// Returns true when a race was armed for `kind`; the race fires once
    fn take_race(&mut self, kind: ResourceKind) -> bool {
        self.races.remove(&kind)
    }

    fn project_exists(&self, project_id: &str) -> bool {
        self.projects.iter().any(|p| p.id == project_id)
    }

    fn insert_default_security_group(&mut self, project_id: &str) -> SecurityGroup {
        let group = SecurityGroup {
            id: self.next_id("sg"),
            name: DEFAULT_SECURITY_GROUP.to_string(),
            project_id: project_id.to_string(),
        };
        for ether_type in ["IPv4", "IPv6"] {
            let egress = SecurityGroupRule {
                id: self.next_id("rule"),
                security_group_id: group.id.clone(),
                spec: RuleSpec {
                    direction: Direction::Egress,
                    ether_type: ether_type.to_string(),
                    protocol: None,
                    remote_group_id: None,
                    remote_ip_prefix: None,
                    port_range_min: None,
                    port_range_max: None,
                },
            };
            let ingress = SecurityGroupRule {
                id: self.next_id("rule"),
                security_group_id: group.id.clone(),
                spec: RuleSpec {
                    direction: Direction::Ingress,
                    ether_type: ether_type.to_string(),
                    protocol: None,
                    remote_group_id: Some(group.id.clone()),
                    remote_ip_prefix: None,
                    port_range_min: None,
                    port_range_max: None,
                },
            };
            self.rules.push(egress);
            self.rules.push(ingress);
        }
        self.security_groups.push(group.clone());
        group
    }

    fn default_quota(project_id: &str) -> QuotaSet {
        let defaults = [
            (QuotaKind::Instances, 10),
            (QuotaKind::Ram, 51200),
            (QuotaKind::Cores, 20),
            (QuotaKind::FixedIps, -1),
            (QuotaKind::FloatingIps, 10),
            (QuotaKind::InjectedFileContentBytes, 10240),
            (QuotaKind::InjectedFilePathBytes, 255),
            (QuotaKind::InjectedFiles, 5),
            (QuotaKind::KeyPairs, 100),
            (QuotaKind::MetadataItems, 128),
            (QuotaKind::SecurityGroups, 10),
            (QuotaKind::SecurityGroupRules, 20),
            (QuotaKind::ServerGroups, 10),
            (QuotaKind::ServerGroupMembers, 10),
            (QuotaKind::Networks, 10),
            (QuotaKind::Subnets, 10),
            (QuotaKind::Routers, 10),
            (QuotaKind::RootGb, 1000),
        ];
        let mut quota = QuotaSet::new();
        for (kind, value) in defaults {
            quota.set(kind, value);
        }
        quota
            .values
            .insert("id".to_string(), serde_json::json!(project_id));
        quota
    }
}

/// In-memory [`CloudClient`] implementation
pub struct MemoryCloud {
    state: Mutex<State>,
}

impl Default for MemoryCloud {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCloud {
    /// An empty cloud with one external network named `public`
    pub fn new() -> Self {
        let mut state = State::default();
        let id = state.next_id("net");
        state.networks.push(Network {
            id,
            name: EXTERNAL_NETWORK.to_string(),
            project_id: ADMIN_PROJECT_ID.to_string(),
            external: true,
        });
        Self {
            state: Mutex::new(state),
        }
    }

    /// Simulate a deployment that does not offer block storage
    pub fn without_volume_service(self) -> Self {
        self.lock().no_volume_service = true;
        self
    }

    /// Make the next create of `kind` lose a race against another operator
    ///
    /// The resource is created, then the call reports `AlreadyExists`.
    pub fn race_next_create(&self, kind: ResourceKind) {
        self.lock().races.insert(kind);
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Mutating calls in the order they were made, as `operation:name`
    pub fn journal(&self) -> Vec<String> {
        self.lock().journal.clone()
    }

    pub fn clear_journal(&self) {
        self.lock().journal.clear();
    }

    pub fn add_server(&self, project_id: &str, name: &str, power_state: i32) -> Server {
        let mut state = self.lock();
        let server = Server {
            id: state.next_id("srv"),
            name: name.to_string(),
            status: if power_state > 0 { "ACTIVE" } else { "SHUTOFF" }.to_string(),
            power_state,
        };
        state.servers.push(Owned {
            project_id: project_id.to_string(),
            item: server.clone(),
        });
        server
    }

    pub fn add_volume(&self, project_id: &str, name: &str, size: u64, status: &str) -> Volume {
        let mut state = self.lock();
        let volume = Volume {
            id: state.next_id("vol"),
            name: name.to_string(),
            status: status.to_string(),
            size,
        };
        state.volumes.push(Owned {
            project_id: project_id.to_string(),
            item: volume.clone(),
        });
        volume
    }

    pub fn set_quota(&self, project_id: &str, kind: QuotaKind, value: i64) {
        let mut state = self.lock();
        if let Some((_, quota)) = state.quotas.iter_mut().find(|(id, _)| id == project_id) {
            quota.set(kind, value);
        }
    }

    pub fn projects(&self) -> Vec<Project> {
        self.lock().projects.clone()
    }

    pub fn networks(&self) -> Vec<Network> {
        self.lock().networks.clone()
    }

    pub fn subnets(&self) -> Vec<Subnet> {
        self.lock().subnets.clone()
    }

    pub fn routers(&self) -> Vec<Router> {
        self.lock().routers.clone()
    }

    pub fn ports(&self) -> Vec<Port> {
        self.lock().ports.clone()
    }

    pub fn security_groups(&self) -> Vec<SecurityGroup> {
        self.lock().security_groups.clone()
    }

    pub fn security_group_rules(&self) -> Vec<SecurityGroupRule> {
        self.lock().rules.clone()
    }

    pub fn servers(&self) -> Vec<Server> {
        self.lock().servers.iter().map(|s| s.item.clone()).collect()
    }

    pub fn volumes(&self) -> Vec<Volume> {
        self.lock().volumes.iter().map(|v| v.item.clone()).collect()
    }

    pub fn users(&self) -> Vec<User> {
        self.lock().users.clone()
    }

    /// Role grants as `(project_id, actor_id, role)`
    pub fn grants(&self) -> Vec<(String, String, String)> {
        self.lock().grants.iter().cloned().collect()
    }
}

#[async_trait]
impl CloudClient for MemoryCloud {
    fn name(&self) -> &str {
        "memory"
    }

    async fn find_project(&self, name: &str, domain_id: &str) -> Result<Option<Project>> {
        let state = self.lock();
        let matches: Vec<&Project> = state
            .projects
            .iter()
            .filter(|p| p.name == name && p.domain_id == domain_id)
            .collect();
        match matches.as_slice() {
            [] => Ok(None),
            [project] => Ok(Some((*project).clone())),
            many => Err(CloudError::Ambiguous {
                kind: ResourceKind::Project,
                name: name.to_string(),
                count: many.len(),
            }),
        }
    }

    async fn create_project(&self, name: &str, domain_id: &str) -> Result<Project> {
        let mut state = self.lock();
        if state
            .projects
            .iter()
            .any(|p| p.name == name && p.domain_id == domain_id)
        {
            return Err(CloudError::already_exists(ResourceKind::Project, name));
        }
        let project = Project {
            id: state.next_id("prj"),
            name: name.to_string(),
            domain_id: domain_id.to_string(),
        };
        state.projects.push(project.clone());
        state.insert_default_security_group(&project.id);
        let quota = State::default_quota(&project.id);
        state.quotas.push((project.id.clone(), quota));
        state.record(format!("create_project:{}", name));
        if state.take_race(ResourceKind::Project) {
            return Err(CloudError::already_exists(ResourceKind::Project, name));
        }
        Ok(project)
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        Ok(self.lock().projects.clone())
    }

    async fn delete_project(&self, project_id: &str) -> Result<()> {
        let mut state = self.lock();
        let index = state
            .projects
            .iter()
            .position(|p| p.id == project_id)
            .ok_or_else(|| CloudError::not_found(ResourceKind::Project, project_id))?;
        let project = state.projects.remove(index);
        state.quotas.retain(|(id, _)| id != project_id);
        state.record(format!("delete_project:{}", project.name));
        Ok(())
    }

    async fn find_network(&self, project_id: &str, name: &str) -> Result<Option<Network>> {
        Ok(self
            .lock()
            .networks
            .iter()
            .find(|n| n.project_id == project_id && n.name == name)
            .cloned())
    }

    async fn create_network(&self, project_id: &str, name: &str) -> Result<Network> {
        let mut state = self.lock();
        let network = Network {
            id: state.next_id("net"),
            name: name.to_string(),
            project_id: project_id.to_string(),
            external: false,
        };
        state.networks.push(network.clone());
        state.record(format!("create_network:{}", name));
        if state.take_race(ResourceKind::Network) {
            return Err(CloudError::already_exists(ResourceKind::Network, name));
        }
        Ok(network)
    }

    async fn list_networks(&self, project_id: &str) -> Result<Vec<Network>> {
        Ok(self
            .lock()
            .networks
            .iter()
            .filter(|n| n.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn find_external_network(&self, name: Option<&str>) -> Result<Option<Network>> {
        Ok(self
            .lock()
            .networks
            .iter()
            .filter(|n| n.external)
            .find(|n| name.is_none_or(|wanted| n.name == wanted))
            .cloned())
    }

    async fn delete_network(&self, network_id: &str) -> Result<()> {
        let mut state = self.lock();
        let index = state
            .networks
            .iter()
            .position(|n| n.id == network_id)
            .ok_or_else(|| CloudError::not_found(ResourceKind::Network, network_id))?;
        if state.subnets.iter().any(|s| s.network_id == network_id) {
            return Err(CloudError::ApiError {
                status: 409,
                message: format!("network {} still has subnets", network_id),
            });
        }
        let network = state.networks.remove(index);
        state.record(format!("delete_network:{}", network.name));
        Ok(())
    }

    async fn find_subnet(&self, network_id: &str, name: &str) -> Result<Option<Subnet>> {
        Ok(self
            .lock()
            .subnets
            .iter()
            .find(|s| s.network_id == network_id && s.name == name)
            .cloned())
    }

    async fn create_subnet(
        &self,
        project_id: &str,
        network_id: &str,
        name: &str,
        cidr: &str,
    ) -> Result<Subnet> {
        let mut state = self.lock();
        if !state.networks.iter().any(|n| n.id == network_id) {
            return Err(CloudError::not_found(ResourceKind::Network, network_id));
        }
        let subnet = Subnet {
            id: state.next_id("subnet"),
            name: name.to_string(),
            network_id: network_id.to_string(),
            project_id: project_id.to_string(),
            cidr: cidr.to_string(),
        };
        state.subnets.push(subnet.clone());
        state.record(format!("create_subnet:{}", name));
        if state.take_race(ResourceKind::Subnet) {
            return Err(CloudError::already_exists(ResourceKind::Subnet, name));
        }
        Ok(subnet)
    }

    async fn list_subnets(&self, network_id: &str) -> Result<Vec<Subnet>> {
        Ok(self
            .lock()
            .subnets
            .iter()
            .filter(|s| s.network_id == network_id)
            .cloned()
            .collect())
    }

    async fn get_subnet(&self, subnet_id: &str) -> Result<Subnet> {
        self.lock()
            .subnets
            .iter()
            .find(|s| s.id == subnet_id)
            .cloned()
            .ok_or_else(|| CloudError::not_found(ResourceKind::Subnet, subnet_id))
    }

    async fn delete_subnet(&self, subnet_id: &str) -> Result<()> {
        let mut state = self.lock();
        let index = state
            .subnets
            .iter()
            .position(|s| s.id == subnet_id)
            .ok_or_else(|| CloudError::not_found(ResourceKind::Subnet, subnet_id))?;
        let in_use = state
            .ports
            .iter()
            .any(|p| p.fixed_ips.iter().any(|ip| ip.subnet_id == subnet_id));
        if in_use {
            return Err(CloudError::ApiError {
                status: 409,
                message: format!("subnet {} has ports in use", subnet_id),
            });
        }
        let subnet = state.subnets.remove(index);
        state.record(format!("delete_subnet:{}", subnet.name));
        Ok(())
    }

    async fn find_router(&self, project_id: &str, name: &str) -> Result<Option<Router>> {
        Ok(self
            .lock()
            .routers
            .iter()
            .find(|r| r.project_id == project_id && r.name == name)
            .cloned())
    }

    async fn create_router(
        &self,
        project_id: &str,
        name: &str,
        external_network_id: Option<&str>,
    ) -> Result<Router> {
        let mut state = self.lock();
        let router = Router {
            id: state.next_id("router"),
            name: name.to_string(),
            project_id: project_id.to_string(),
            external_network_id: external_network_id.map(str::to_string),
        };
        if let Some(network_id) = external_network_id {
            let port = Port {
                id: state.next_id("port"),
                device_id: router.id.clone(),
                device_owner: "network:router_gateway".to_string(),
                fixed_ips: vec![FixedIp {
                    subnet_id: format!("{}-subnet", network_id),
                    ip_address: "203.0.113.10".to_string(),
                }],
            };
            state.ports.push(port);
        }
        state.routers.push(router.clone());
        state.record(format!("create_router:{}", name));
        if state.take_race(ResourceKind::Router) {
            return Err(CloudError::already_exists(ResourceKind::Router, name));
        }
        Ok(router)
    }

    async fn add_router_interface(&self, router_id: &str, subnet_id: &str) -> Result<Port> {
        let mut state = self.lock();
        if !state.routers.iter().any(|r| r.id == router_id) {
            return Err(CloudError::not_found(ResourceKind::Router, router_id));
        }
        if !state.subnets.iter().any(|s| s.id == subnet_id) {
            return Err(CloudError::not_found(ResourceKind::Subnet, subnet_id));
        }
        let port = Port {
            id: state.next_id("port"),
            device_id: router_id.to_string(),
            device_owner: "network:router_interface".to_string(),
            fixed_ips: vec![FixedIp {
                subnet_id: subnet_id.to_string(),
                ip_address: "192.168.0.1".to_string(),
            }],
        };
        state.ports.push(port.clone());
        state.record(format!("add_router_interface:{}", subnet_id));
        Ok(port)
    }

    async fn remove_router_interface(&self, router_id: &str, port_id: &str) -> Result<()> {
        let mut state = self.lock();
        let index = state
            .ports
            .iter()
            .position(|p| p.id == port_id && p.device_id == router_id)
            .ok_or_else(|| CloudError::not_found(ResourceKind::Port, port_id))?;
        state.ports.remove(index);
        state.record(format!("remove_router_interface:{}", port_id));
        Ok(())
    }

    async fn list_routers(&self, project_id: &str) -> Result<Vec<Router>> {
        Ok(self
            .lock()
            .routers
            .iter()
            .filter(|r| r.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn list_router_ports(&self, router_id: &str) -> Result<Vec<Port>> {
        Ok(self
            .lock()
            .ports
            .iter()
            .filter(|p| p.device_id == router_id)
            .cloned()
            .collect())
    }

    async fn delete_router(&self, router_id: &str) -> Result<()> {
        let mut state = self.lock();
        let index = state
            .routers
            .iter()
            .position(|r| r.id == router_id)
            .ok_or_else(|| CloudError::not_found(ResourceKind::Router, router_id))?;
        let has_interfaces = state
            .ports
            .iter()
            .any(|p| p.device_id == router_id && p.device_owner != "network:router_gateway");
        if has_interfaces {
            return Err(CloudError::ApiError {
                status: 409,
                message: format!("router {} still has interfaces", router_id),
            });
        }
        state.ports.retain(|p| p.device_id != router_id);
        let router = state.routers.remove(index);
        state.record(format!("delete_router:{}", router.name));
        Ok(())
    }

    async fn find_security_group(
        &self,
        project_id: &str,
        name: &str,
    ) -> Result<Option<SecurityGroup>> {
        Ok(self
            .lock()
            .security_groups
            .iter()
            .find(|g| g.project_id == project_id && g.name == name)
            .cloned())
    }

    async fn create_security_group(&self, project_id: &str, name: &str) -> Result<SecurityGroup> {
        let mut state = self.lock();
        let group = SecurityGroup {
            id: state.next_id("sg"),
            name: name.to_string(),
            project_id: project_id.to_string(),
        };
        state.security_groups.push(group.clone());
        state.record(format!("create_security_group:{}", name));
        if state.take_race(ResourceKind::SecurityGroup) {
            return Err(CloudError::already_exists(ResourceKind::SecurityGroup, name));
        }
        Ok(group)
    }

    async fn list_security_groups(&self, project_id: &str) -> Result<Vec<SecurityGroup>> {
        Ok(self
            .lock()
            .security_groups
            .iter()
            .filter(|g| g.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn get_security_group(&self, security_group_id: &str) -> Result<SecurityGroup> {
        self.lock()
            .security_groups
            .iter()
            .find(|g| g.id == security_group_id)
            .cloned()
            .ok_or_else(|| CloudError::not_found(ResourceKind::SecurityGroup, security_group_id))
    }

    async fn delete_security_group(&self, security_group_id: &str) -> Result<()> {
        let mut state = self.lock();
        let index = state
            .security_groups
            .iter()
            .position(|g| g.id == security_group_id)
            .ok_or_else(|| CloudError::not_found(ResourceKind::SecurityGroup, security_group_id))?;
        let group = state.security_groups.remove(index);
        state.rules.retain(|r| r.security_group_id != security_group_id);
        state.record(format!("delete_security_group:{}", group.name));

        if group.name == DEFAULT_SECURITY_GROUP && state.project_exists(&group.project_id) {
            state.insert_default_security_group(&group.project_id);
        }
        Ok(())
    }

    async fn list_security_group_rules(
        &self,
        security_group_id: &str,
    ) -> Result<Vec<SecurityGroupRule>> {
        Ok(self
            .lock()
            .rules
            .iter()
            .filter(|r| r.security_group_id == security_group_id)
            .cloned()
            .collect())
    }

    async fn create_security_group_rule(
        &self,
        security_group_id: &str,
        spec: &RuleSpec,
    ) -> Result<SecurityGroupRule> {
        let mut state = self.lock();
        if !state
            .security_groups
            .iter()
            .any(|g| g.id == security_group_id)
        {
            return Err(CloudError::not_found(
                ResourceKind::SecurityGroup,
                security_group_id,
            ));
        }
        if state
            .rules
            .iter()
            .any(|r| r.security_group_id == security_group_id && r.matches(spec))
        {
            return Err(CloudError::already_exists(
                ResourceKind::SecurityGroupRule,
                security_group_id,
            ));
        }
        let rule = SecurityGroupRule {
            id: state.next_id("rule"),
            security_group_id: security_group_id.to_string(),
            spec: spec.clone(),
        };
        state.rules.push(rule.clone());
        state.record(format!("create_security_group_rule:{}", security_group_id));
        Ok(rule)
    }

    async fn list_servers(&self, project_id: &str) -> Result<Vec<Server>> {
        Ok(self
            .lock()
            .servers
            .iter()
            .filter(|s| s.project_id == project_id)
            .map(|s| s.item.clone())
            .collect())
    }

    async fn delete_server(&self, server_id: &str, force: bool) -> Result<()> {
        let mut state = self.lock();
        let index = state
            .servers
            .iter()
            .position(|s| s.item.id == server_id)
            .ok_or_else(|| CloudError::not_found(ResourceKind::Server, server_id))?;
        let server = state.servers.remove(index);
        let operation = if force { "force_delete_server" } else { "delete_server" };
        state.record(format!("{}:{}", operation, server.item.name));
        Ok(())
    }

    async fn get_quota_set(&self, project_id: &str) -> Result<QuotaSet> {
        self.lock()
            .quotas
            .iter()
            .find(|(id, _)| id == project_id)
            .map(|(_, quota)| quota.clone())
            .ok_or_else(|| CloudError::not_found(ResourceKind::QuotaSet, project_id))
    }

    async fn update_quota(
        &self,
        project_id: &str,
        kind: QuotaKind,
        value: i64,
    ) -> Result<QuotaSet> {
        let mut state = self.lock();
        let quota = {
            let (_, quota) = state
                .quotas
                .iter_mut()
                .find(|(id, _)| id == project_id)
                .ok_or_else(|| CloudError::not_found(ResourceKind::QuotaSet, project_id))?;
            quota.set(kind, value);
            quota.clone()
        };
        state.record(format!("update_quota:{}={}", kind, value));
        Ok(quota)
    }

    async fn list_volumes(&self, project_id: &str) -> Result<Vec<Volume>> {
        let state = self.lock();
        if state.no_volume_service {
            return Err(CloudError::ServiceUnavailable("volumev3".to_string()));
        }
        Ok(state
            .volumes
            .iter()
            .filter(|v| v.project_id == project_id)
            .map(|v| v.item.clone())
            .collect())
    }

    async fn delete_volume(&self, volume_id: &str) -> Result<()> {
        let mut state = self.lock();
        if state.no_volume_service {
            return Err(CloudError::ServiceUnavailable("volumev3".to_string()));
        }
        let index = state
            .volumes
            .iter()
            .position(|v| v.item.id == volume_id)
            .ok_or_else(|| CloudError::not_found(ResourceKind::Volume, volume_id))?;
        let volume = state.volumes.remove(index);
        state.record(format!("delete_volume:{}", volume.item.name));
        Ok(())
    }

    async fn find_user(&self, name: &str, domain_id: &str) -> Result<Option<User>> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| u.name == name && u.domain_id == domain_id)
            .cloned())
    }

    async fn create_user(
        &self,
        name: &str,
        domain_id: &str,
        default_project_id: Option<&str>,
    ) -> Result<User> {
        let mut state = self.lock();
        if state
            .users
            .iter()
            .any(|u| u.name == name && u.domain_id == domain_id)
        {
            return Err(CloudError::already_exists(ResourceKind::User, name));
        }
        let user = User {
            id: state.next_id("user"),
            name: name.to_string(),
            domain_id: domain_id.to_string(),
            default_project_id: default_project_id.map(str::to_string),
        };
        state.users.push(user.clone());
        state.record(format!("create_user:{}", name));
        Ok(user)
    }

    async fn find_group(&self, name: &str, domain_id: &str) -> Result<Option<Group>> {
        Ok(self
            .lock()
            .groups
            .iter()
            .find(|g| g.name == name && g.domain_id == domain_id)
            .cloned())
    }

    async fn create_group(&self, name: &str, domain_id: &str) -> Result<Group> {
        let mut state = self.lock();
        if state
            .groups
            .iter()
            .any(|g| g.name == name && g.domain_id == domain_id)
        {
            return Err(CloudError::already_exists(ResourceKind::Group, name));
        }
        let group = Group {
            id: state.next_id("group"),
            name: name.to_string(),
            domain_id: domain_id.to_string(),
        };
        state.groups.push(group.clone());
        state.record(format!("create_group:{}", name));
        Ok(group)
    }

    async fn list_group_users(&self, group_id: &str) -> Result<Vec<User>> {
        let state = self.lock();
        if !state.groups.iter().any(|g| g.id == group_id) {
            return Err(CloudError::not_found(ResourceKind::Group, group_id));
        }
        Ok(state
            .users
            .iter()
            .filter(|u| {
                state
                    .memberships
                    .contains(&(group_id.to_string(), u.id.clone()))
            })
            .cloned()
            .collect())
    }

    async fn add_user_to_group(&self, group_id: &str, user_id: &str) -> Result<()> {
        let mut state = self.lock();
        state
            .memberships
            .insert((group_id.to_string(), user_id.to_string()));
        state.record(format!("add_user_to_group:{}", user_id));
        Ok(())
    }

    async fn remove_user_from_group(&self, group_id: &str, user_id: &str) -> Result<()> {
        let mut state = self.lock();
        if !state
            .memberships
            .remove(&(group_id.to_string(), user_id.to_string()))
        {
            return Err(CloudError::not_found(ResourceKind::User, user_id));
        }
        state.record(format!("remove_user_from_group:{}", user_id));
        Ok(())
    }

    async fn grant_user_role(&self, project_id: &str, user_id: &str, role: &str) -> Result<()> {
        let mut state = self.lock();
        state.grants.insert((
            project_id.to_string(),
            user_id.to_string(),
            role.to_string(),
        ));
        state.record(format!("grant_user_role:{}", user_id));
        Ok(())
    }

    async fn grant_group_role(
        &self,
        project_id: &str,
        group_id: &str,
        role: &str,
    ) -> Result<()> {
        let mut state = self.lock();
        state.grants.insert((
            project_id.to_string(),
            group_id.to_string(),
            role.to_string(),
        ));
        state.record(format!("grant_group_role:{}", group_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_project_creation_brings_default_security_group() {
        let cloud = MemoryCloud::new();
        let project = cloud.create_project("alpha", "default").await.unwrap();

        let groups = cloud.list_security_groups(&project.id).await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "default");

        let rules = cloud.list_security_group_rules(&groups[0].id).await.unwrap();
        assert_eq!(rules.len(), 4);
    }

    #[tokio::test]
    async fn test_default_group_is_recreated_while_project_lives() {
        let cloud = MemoryCloud::new();
        let project = cloud.create_project("alpha", "default").await.unwrap();
        let group = cloud
            .find_security_group(&project.id, "default")
            .await
            .unwrap()
            .unwrap();

        cloud.delete_security_group(&group.id).await.unwrap();

        let recreated = cloud
            .find_security_group(&project.id, "default")
            .await
            .unwrap()
            .unwrap();
        assert_ne!(recreated.id, group.id);
    }

    #[tokio::test]
    async fn test_race_reports_already_exists_after_creating() {
        let cloud = MemoryCloud::new();
        let project = cloud.create_project("alpha", "default").await.unwrap();
        cloud.race_next_create(ResourceKind::Network);

        let err = cloud
            .create_network(&project.id, "network1")
            .await
            .unwrap_err();
        assert!(err.is_already_exists());
        assert!(
            cloud
                .find_network(&project.id, "network1")
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_missing_volume_service() {
        let cloud = MemoryCloud::new().without_volume_service();
        let err = cloud.list_volumes("anything").await.unwrap_err();
        assert!(err.is_service_unavailable());
    }

    #[tokio::test]
    async fn test_external_network_lookup() {
        let cloud = MemoryCloud::new();
        let any = cloud.find_external_network(None).await.unwrap().unwrap();
        assert_eq!(any.name, "public");
        assert!(
            cloud
                .find_external_network(Some("provider"))
                .await
                .unwrap()
                .is_none()
        );
    }
}
