//! Cloud client trait definition

use crate::error::Result;
use crate::model::{
    Group, Network, Port, Project, QuotaKind, QuotaSet, Router, RuleSpec, SecurityGroup,
    SecurityGroupRule, Server, Subnet, User, Volume,
};
use async_trait::async_trait;

/// Control-plane client abstraction
///
/// Implemented by the OpenStack REST client and by the in-memory cloud used
/// in tests. Finders return `Ok(None)` when nothing matches; getters and
/// deleters return [`CloudError::NotFound`](crate::CloudError::NotFound)
/// instead. Creators return
/// [`CloudError::AlreadyExists`](crate::CloudError::AlreadyExists) when
/// another operator won the race for the same name.
///
/// Domains are referenced by id (the platform's stock domain is `default`).
#[async_trait]
pub trait CloudClient: Send + Sync {
    /// Returns the client name (e.g., "openstack", "memory")
    fn name(&self) -> &str;

    // ---- identity: projects ----

    async fn find_project(&self, name: &str, domain_id: &str) -> Result<Option<Project>>;

    async fn create_project(&self, name: &str, domain_id: &str) -> Result<Project>;

    async fn list_projects(&self) -> Result<Vec<Project>>;

    async fn delete_project(&self, project_id: &str) -> Result<()>;

    // ---- network ----

    async fn find_network(&self, project_id: &str, name: &str) -> Result<Option<Network>>;

    async fn create_network(&self, project_id: &str, name: &str) -> Result<Network>;

    async fn list_networks(&self, project_id: &str) -> Result<Vec<Network>>;

    /// Find the network routers use as their external gateway
    ///
    /// With `name` set only that network qualifies; otherwise the first
    /// external network is returned.
    async fn find_external_network(&self, name: Option<&str>) -> Result<Option<Network>>;

    async fn delete_network(&self, network_id: &str) -> Result<()>;

    async fn find_subnet(&self, network_id: &str, name: &str) -> Result<Option<Subnet>>;

    async fn create_subnet(
        &self,
        project_id: &str,
        network_id: &str,
        name: &str,
        cidr: &str,
    ) -> Result<Subnet>;

    async fn list_subnets(&self, network_id: &str) -> Result<Vec<Subnet>>;

    async fn get_subnet(&self, subnet_id: &str) -> Result<Subnet>;

    async fn delete_subnet(&self, subnet_id: &str) -> Result<()>;

    async fn find_router(&self, project_id: &str, name: &str) -> Result<Option<Router>>;

    async fn create_router(
        &self,
        project_id: &str,
        name: &str,
        external_network_id: Option<&str>,
    ) -> Result<Router>;

    /// Attach `subnet_id` to the router, returning the interface port
    async fn add_router_interface(&self, router_id: &str, subnet_id: &str) -> Result<Port>;

    async fn remove_router_interface(&self, router_id: &str, port_id: &str) -> Result<()>;

    async fn list_routers(&self, project_id: &str) -> Result<Vec<Router>>;

    /// All ports whose device is the router, gateway port included
    async fn list_router_ports(&self, router_id: &str) -> Result<Vec<Port>>;

    async fn delete_router(&self, router_id: &str) -> Result<()>;

    async fn find_security_group(
        &self,
        project_id: &str,
        name: &str,
    ) -> Result<Option<SecurityGroup>>;

    async fn create_security_group(&self, project_id: &str, name: &str) -> Result<SecurityGroup>;

    async fn list_security_groups(&self, project_id: &str) -> Result<Vec<SecurityGroup>>;

    async fn get_security_group(&self, security_group_id: &str) -> Result<SecurityGroup>;

    async fn delete_security_group(&self, security_group_id: &str) -> Result<()>;

    async fn list_security_group_rules(
        &self,
        security_group_id: &str,
    ) -> Result<Vec<SecurityGroupRule>>;

    async fn create_security_group_rule(
        &self,
        security_group_id: &str,
        spec: &RuleSpec,
    ) -> Result<SecurityGroupRule>;

    // ---- compute ----

    async fn list_servers(&self, project_id: &str) -> Result<Vec<Server>>;

    /// Delete a server; `force` skips the soft-delete grace period
    async fn delete_server(&self, server_id: &str, force: bool) -> Result<()>;

    async fn get_quota_set(&self, project_id: &str) -> Result<QuotaSet>;

    /// Set a single quota limit, returning the updated quota set
    async fn update_quota(&self, project_id: &str, kind: QuotaKind, value: i64)
    -> Result<QuotaSet>;

    // ---- block storage ----

    /// Fails with `ServiceUnavailable` when the deployment has no volume service
    async fn list_volumes(&self, project_id: &str) -> Result<Vec<Volume>>;

    async fn delete_volume(&self, volume_id: &str) -> Result<()>;

    // ---- identity: users, groups, roles ----

    async fn find_user(&self, name: &str, domain_id: &str) -> Result<Option<User>>;

    async fn create_user(
        &self,
        name: &str,
        domain_id: &str,
        default_project_id: Option<&str>,
    ) -> Result<User>;

    async fn find_group(&self, name: &str, domain_id: &str) -> Result<Option<Group>>;

    async fn create_group(&self, name: &str, domain_id: &str) -> Result<Group>;

    async fn list_group_users(&self, group_id: &str) -> Result<Vec<User>>;

    async fn add_user_to_group(&self, group_id: &str, user_id: &str) -> Result<()>;

    async fn remove_user_from_group(&self, group_id: &str, user_id: &str) -> Result<()>;

    /// Grant `role` on the project to the user; granting twice is not an error
    async fn grant_user_role(&self, project_id: &str, user_id: &str, role: &str) -> Result<()>;

    /// Grant `role` on the project to the group; granting twice is not an error
    async fn grant_group_role(&self, project_id: &str, group_id: &str, role: &str)
    -> Result<()>;
}
