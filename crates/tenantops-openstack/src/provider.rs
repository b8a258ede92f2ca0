//! [`CloudClient`] over the OpenStack REST APIs

use crate::block_storage::VolumeList;
use crate::compute::{QuotaEnvelope, ServerList, quota_update_body};
use crate::error::ResultExt;
use crate::identity::{
    GroupEnvelope, GroupList, ProjectEnvelope, ProjectList, RoleList, UserEnvelope, UserList,
};
use crate::network::{
    InterfaceInfo, NetworkEnvelope, NetworkList, PortEnvelope, PortList, RouterEnvelope,
    RouterList, RuleEnvelope, RuleList, RuleRecord, SecurityGroupEnvelope, SecurityGroupList,
    SubnetEnvelope, SubnetList,
};
use crate::session::{AuthConfig, Session};
use async_trait::async_trait;
use reqwest::Method;
use serde_json::json;
use tenantops_cloud::{
    CloudClient, CloudError, Group, Network, Port, Project, QuotaKind, QuotaSet, ResourceKind,
    Result, Router, RuleSpec, SecurityGroup, SecurityGroupRule, Server, Subnet, User, Volume,
};
use tenantops_config::Settings;

const NETWORK_SERVICE: &[&str] = &["network"];
const COMPUTE_SERVICE: &[&str] = &["compute"];
const VOLUME_SERVICE: &[&str] = &["volumev3", "block-storage", "volume"];

/// OpenStack client
pub struct OpenStackCloud {
    session: Session,
    /// `os-quota-sets` base; the compute catalog endpoint when unset
    quota_endpoint: Option<String>,
}

impl OpenStackCloud {
    pub fn new(session: Session, quota_endpoint: Option<String>) -> Self {
        Self {
            session,
            quota_endpoint: quota_endpoint.map(|url| url.trim_end_matches('/').to_string()),
        }
    }

    /// Authenticate with `auth` and build a client using `settings`
    pub async fn connect(auth: &AuthConfig, settings: &Settings) -> crate::error::Result<Self> {
        let session = Session::authenticate(auth, settings.http_timeout).await?;
        Ok(Self::new(session, settings.quota_endpoint.clone()))
    }

    fn identity(&self, path: &str) -> String {
        format!("{}{}", self.session.identity_url(), path)
    }

    fn network(&self, path: &str) -> Result<String> {
        let base = self.session.endpoint(NETWORK_SERVICE)?;
        Ok(format!("{}/v2.0{}", base.trim_end_matches("/v2.0"), path))
    }

    fn compute(&self, path: &str) -> Result<String> {
        Ok(format!("{}{}", self.session.endpoint(COMPUTE_SERVICE)?, path))
    }

    fn volume(&self, path: &str) -> Result<String> {
        Ok(format!("{}{}", self.session.endpoint(VOLUME_SERVICE)?, path))
    }

    fn quota(&self, project_id: &str) -> Result<String> {
        let base = match &self.quota_endpoint {
            Some(url) => url.clone(),
            None => self.session.endpoint(COMPUTE_SERVICE)?,
        };
        Ok(format!("{}/os-quota-sets/{}", base, project_id))
    }

    async fn role_id(&self, role: &str) -> Result<String> {
        let list: RoleList = self
            .session
            .get(&self.identity("/roles"), &[("name", role)])
            .await?;
        list.roles
            .into_iter()
            .find(|r| r.name == role)
            .map(|r| r.id)
            .ok_or_else(|| CloudError::not_found(ResourceKind::Role, role))
    }
}

/// At most one match, as finders promise
fn single<T>(mut items: Vec<T>, kind: ResourceKind, name: &str) -> Result<Option<T>> {
    match items.len() {
        0 => Ok(None),
        1 => Ok(items.pop()),
        count => Err(CloudError::Ambiguous {
            kind,
            name: name.to_string(),
            count,
        }),
    }
}

#[async_trait]
impl CloudClient for OpenStackCloud {
    fn name(&self) -> &str {
        "openstack"
    }

    async fn find_project(&self, name: &str, domain_id: &str) -> Result<Option<Project>> {
        let list: ProjectList = self
            .session
            .get(
                &self.identity("/projects"),
                &[("name", name), ("domain_id", domain_id)],
            )
            .await?;
        single(list.projects, ResourceKind::Project, name)
    }

    async fn create_project(&self, name: &str, domain_id: &str) -> Result<Project> {
        let body = json!({ "project": { "name": name, "domain_id": domain_id, "enabled": true } });
        let envelope: ProjectEnvelope = self
            .session
            .send(Method::POST, &self.identity("/projects"), &body)
            .await
            .for_create(ResourceKind::Project, name)?;
        Ok(envelope.project)
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        let list: ProjectList = self.session.get(&self.identity("/projects"), &[]).await?;
        Ok(list.projects)
    }

    async fn delete_project(&self, project_id: &str) -> Result<()> {
        self.session
            .delete(&self.identity(&format!("/projects/{}", project_id)))
            .await
            .for_resource(ResourceKind::Project, project_id)
    }

    async fn find_network(&self, project_id: &str, name: &str) -> Result<Option<Network>> {
        let list: NetworkList = self
            .session
            .get(
                &self.network("/networks")?,
                &[("project_id", project_id), ("name", name)],
            )
            .await?;
        let networks = list.networks.into_iter().map(Network::from).collect();
        single(networks, ResourceKind::Network, name)
    }

    async fn create_network(&self, project_id: &str, name: &str) -> Result<Network> {
        let body = json!({ "network": { "name": name, "project_id": project_id } });
        let envelope: NetworkEnvelope = self
            .session
            .send(Method::POST, &self.network("/networks")?, &body)
            .await
            .for_create(ResourceKind::Network, name)?;
        Ok(envelope.network.into())
    }

    async fn list_networks(&self, project_id: &str) -> Result<Vec<Network>> {
        let list: NetworkList = self
            .session
            .get(&self.network("/networks")?, &[("project_id", project_id)])
            .await?;
        Ok(list.networks.into_iter().map(Network::from).collect())
    }

    async fn find_external_network(&self, name: Option<&str>) -> Result<Option<Network>> {
        let mut query = vec![("router:external", "true")];
        if let Some(name) = name {
            query.push(("name", name));
        }
        let list: NetworkList = self
            .session
            .get(&self.network("/networks")?, &query)
            .await?;
        Ok(list.networks.into_iter().next().map(Network::from))
    }

    async fn delete_network(&self, network_id: &str) -> Result<()> {
        self.session
            .delete(&self.network(&format!("/networks/{}", network_id))?)
            .await
            .for_resource(ResourceKind::Network, network_id)
    }

    async fn find_subnet(&self, network_id: &str, name: &str) -> Result<Option<Subnet>> {
        let list: SubnetList = self
            .session
            .get(
                &self.network("/subnets")?,
                &[("network_id", network_id), ("name", name)],
            )
            .await?;
        single(list.subnets, ResourceKind::Subnet, name)
    }

    async fn create_subnet(
        &self,
        project_id: &str,
        network_id: &str,
        name: &str,
        cidr: &str,
    ) -> Result<Subnet> {
        let body = json!({
            "subnet": {
                "name": name,
                "project_id": project_id,
                "network_id": network_id,
                "cidr": cidr,
                "ip_version": 4,
            }
        });
        let envelope: SubnetEnvelope = self
            .session
            .send(Method::POST, &self.network("/subnets")?, &body)
            .await
            .for_create(ResourceKind::Subnet, name)?;
        Ok(envelope.subnet)
    }

    async fn list_subnets(&self, network_id: &str) -> Result<Vec<Subnet>> {
        let list: SubnetList = self
            .session
            .get(&self.network("/subnets")?, &[("network_id", network_id)])
            .await?;
        Ok(list.subnets)
    }

    async fn get_subnet(&self, subnet_id: &str) -> Result<Subnet> {
        let envelope: SubnetEnvelope = self
            .session
            .get(&self.network(&format!("/subnets/{}", subnet_id))?, &[])
            .await
            .for_resource(ResourceKind::Subnet, subnet_id)?;
        Ok(envelope.subnet)
    }

    async fn delete_subnet(&self, subnet_id: &str) -> Result<()> {
        self.session
            .delete(&self.network(&format!("/subnets/{}", subnet_id))?)
            .await
            .for_resource(ResourceKind::Subnet, subnet_id)
    }

    async fn find_router(&self, project_id: &str, name: &str) -> Result<Option<Router>> {
        let list: RouterList = self
            .session
            .get(
                &self.network("/routers")?,
                &[("project_id", project_id), ("name", name)],
            )
            .await?;
        let routers = list.routers.into_iter().map(Router::from).collect();
        single(routers, ResourceKind::Router, name)
    }

    async fn create_router(
        &self,
        project_id: &str,
        name: &str,
        external_network_id: Option<&str>,
    ) -> Result<Router> {
        let mut router = json!({ "name": name, "project_id": project_id });
        if let Some(network_id) = external_network_id {
            router["external_gateway_info"] = json!({ "network_id": network_id });
        }
        let envelope: RouterEnvelope = self
            .session
            .send(
                Method::POST,
                &self.network("/routers")?,
                &json!({ "router": router }),
            )
            .await
            .for_create(ResourceKind::Router, name)?;
        Ok(envelope.router.into())
    }

    async fn add_router_interface(&self, router_id: &str, subnet_id: &str) -> Result<Port> {
        let url = self.network(&format!("/routers/{}/add_router_interface", router_id))?;
        let info: InterfaceInfo = self
            .session
            .send(Method::PUT, &url, &json!({ "subnet_id": subnet_id }))
            .await
            .for_resource(ResourceKind::Router, router_id)?;

        let envelope: PortEnvelope = self
            .session
            .get(&self.network(&format!("/ports/{}", info.port_id))?, &[])
            .await
            .for_resource(ResourceKind::Port, &info.port_id)?;
        Ok(envelope.port.into())
    }

    async fn remove_router_interface(&self, router_id: &str, port_id: &str) -> Result<()> {
        let url = self.network(&format!("/routers/{}/remove_router_interface", router_id))?;
        self.session
            .send_empty(Method::PUT, &url, Some(&json!({ "port_id": port_id })))
            .await
            .for_resource(ResourceKind::Port, port_id)
    }

    async fn list_routers(&self, project_id: &str) -> Result<Vec<Router>> {
        let list: RouterList = self
            .session
            .get(&self.network("/routers")?, &[("project_id", project_id)])
            .await?;
        Ok(list.routers.into_iter().map(Router::from).collect())
    }

    async fn list_router_ports(&self, router_id: &str) -> Result<Vec<Port>> {
        let list: PortList = self
            .session
            .get(&self.network("/ports")?, &[("device_id", router_id)])
            .await?;
        Ok(list.ports.into_iter().map(Port::from).collect())
    }

    async fn delete_router(&self, router_id: &str) -> Result<()> {
        self.session
            .delete(&self.network(&format!("/routers/{}", router_id))?)
            .await
            .for_resource(ResourceKind::Router, router_id)
    }

    async fn find_security_group(
        &self,
        project_id: &str,
        name: &str,
    ) -> Result<Option<SecurityGroup>> {
        let list: SecurityGroupList = self
            .session
            .get(
                &self.network("/security-groups")?,
                &[("project_id", project_id), ("name", name)],
            )
            .await?;
        let groups = list
            .security_groups
            .into_iter()
            .map(SecurityGroup::from)
            .collect();
        single(groups, ResourceKind::SecurityGroup, name)
    }

    async fn create_security_group(&self, project_id: &str, name: &str) -> Result<SecurityGroup> {
        let body = json!({ "security_group": { "name": name, "project_id": project_id } });
        let envelope: SecurityGroupEnvelope = self
            .session
            .send(Method::POST, &self.network("/security-groups")?, &body)
            .await
            .for_create(ResourceKind::SecurityGroup, name)?;
        Ok(envelope.security_group.into())
    }

    async fn list_security_groups(&self, project_id: &str) -> Result<Vec<SecurityGroup>> {
        let list: SecurityGroupList = self
            .session
            .get(
                &self.network("/security-groups")?,
                &[("project_id", project_id)],
            )
            .await?;
        Ok(list
            .security_groups
            .into_iter()
            .map(SecurityGroup::from)
            .collect())
    }

    async fn get_security_group(&self, security_group_id: &str) -> Result<SecurityGroup> {
        let envelope: SecurityGroupEnvelope = self
            .session
            .get(
                &self.network(&format!("/security-groups/{}", security_group_id))?,
                &[],
            )
            .await
            .for_resource(ResourceKind::SecurityGroup, security_group_id)?;
        Ok(envelope.security_group.into())
    }

    async fn delete_security_group(&self, security_group_id: &str) -> Result<()> {
        self.session
            .delete(&self.network(&format!("/security-groups/{}", security_group_id))?)
            .await
            .for_resource(ResourceKind::SecurityGroup, security_group_id)
    }

    async fn list_security_group_rules(
        &self,
        security_group_id: &str,
    ) -> Result<Vec<SecurityGroupRule>> {
        let list: RuleList = self
            .session
            .get(
                &self.network("/security-group-rules")?,
                &[("security_group_id", security_group_id)],
            )
            .await?;
        Ok(list
            .security_group_rules
            .into_iter()
            .map(SecurityGroupRule::from)
            .collect())
    }

    async fn create_security_group_rule(
        &self,
        security_group_id: &str,
        spec: &RuleSpec,
    ) -> Result<SecurityGroupRule> {
        let body = RuleEnvelope {
            security_group_rule: RuleRecord::new(security_group_id, spec),
        };
        let envelope: RuleEnvelope = self
            .session
            .send(Method::POST, &self.network("/security-group-rules")?, &body)
            .await
            .for_create(ResourceKind::SecurityGroupRule, security_group_id)?;
        Ok(envelope.security_group_rule.into())
    }

    async fn list_servers(&self, project_id: &str) -> Result<Vec<Server>> {
        let list: ServerList = self
            .session
            .get(
                &self.compute("/servers/detail")?,
                &[("all_tenants", "1"), ("project_id", project_id)],
            )
            .await?;
        Ok(list.servers.into_iter().map(Server::from).collect())
    }

    async fn delete_server(&self, server_id: &str, force: bool) -> Result<()> {
        if force {
            let url = self.compute(&format!("/servers/{}/action", server_id))?;
            self.session
                .send_empty(Method::POST, &url, Some(&json!({ "forceDelete": null })))
                .await
                .for_resource(ResourceKind::Server, server_id)
        } else {
            self.session
                .delete(&self.compute(&format!("/servers/{}", server_id))?)
                .await
                .for_resource(ResourceKind::Server, server_id)
        }
    }

    async fn get_quota_set(&self, project_id: &str) -> Result<QuotaSet> {
        let envelope: QuotaEnvelope = self
            .session
            .get(&self.quota(project_id)?, &[])
            .await
            .for_resource(ResourceKind::QuotaSet, project_id)?;
        Ok(envelope.into())
    }

    async fn update_quota(
        &self,
        project_id: &str,
        kind: QuotaKind,
        value: i64,
    ) -> Result<QuotaSet> {
        tracing::debug!("Setting quota {} to {} on {}", kind, value, project_id);
        let envelope: QuotaEnvelope = self
            .session
            .send(
                Method::PUT,
                &self.quota(project_id)?,
                &quota_update_body(kind, value),
            )
            .await
            .for_resource(ResourceKind::QuotaSet, project_id)?;
        Ok(envelope.into())
    }

    async fn list_volumes(&self, project_id: &str) -> Result<Vec<Volume>> {
        let list: VolumeList = self
            .session
            .get(
                &self.volume("/volumes/detail")?,
                &[("all_tenants", "1"), ("project_id", project_id)],
            )
            .await?;
        Ok(list.volumes.into_iter().map(Volume::from).collect())
    }

    async fn delete_volume(&self, volume_id: &str) -> Result<()> {
        self.session
            .delete(&self.volume(&format!("/volumes/{}", volume_id))?)
            .await
            .for_resource(ResourceKind::Volume, volume_id)
    }

    async fn find_user(&self, name: &str, domain_id: &str) -> Result<Option<User>> {
        let list: UserList = self
            .session
            .get(
                &self.identity("/users"),
                &[("name", name), ("domain_id", domain_id)],
            )
            .await?;
        let users = list.users.into_iter().map(User::from).collect();
        single(users, ResourceKind::User, name)
    }

    async fn create_user(
        &self,
        name: &str,
        domain_id: &str,
        default_project_id: Option<&str>,
    ) -> Result<User> {
        let mut user = json!({ "name": name, "domain_id": domain_id, "enabled": true });
        if let Some(project_id) = default_project_id {
            user["default_project_id"] = json!(project_id);
        }
        let envelope: UserEnvelope = self
            .session
            .send(
                Method::POST,
                &self.identity("/users"),
                &json!({ "user": user }),
            )
            .await
            .for_create(ResourceKind::User, name)?;
        Ok(envelope.user.into())
    }

    async fn find_group(&self, name: &str, domain_id: &str) -> Result<Option<Group>> {
        let list: GroupList = self
            .session
            .get(
                &self.identity("/groups"),
                &[("name", name), ("domain_id", domain_id)],
            )
            .await?;
        single(list.groups, ResourceKind::Group, name)
    }

    async fn create_group(&self, name: &str, domain_id: &str) -> Result<Group> {
        let body = json!({ "group": { "name": name, "domain_id": domain_id } });
        let envelope: GroupEnvelope = self
            .session
            .send(Method::POST, &self.identity("/groups"), &body)
            .await
            .for_create(ResourceKind::Group, name)?;
        Ok(envelope.group)
    }

    async fn list_group_users(&self, group_id: &str) -> Result<Vec<User>> {
        let list: UserList = self
            .session
            .get(&self.identity(&format!("/groups/{}/users", group_id)), &[])
            .await
            .for_resource(ResourceKind::Group, group_id)?;
        Ok(list.users.into_iter().map(User::from).collect())
    }

    async fn add_user_to_group(&self, group_id: &str, user_id: &str) -> Result<()> {
        let url = self.identity(&format!("/groups/{}/users/{}", group_id, user_id));
        self.session
            .send_empty::<serde_json::Value>(Method::PUT, &url, None)
            .await
            .for_resource(ResourceKind::Group, group_id)
    }

    async fn remove_user_from_group(&self, group_id: &str, user_id: &str) -> Result<()> {
        let url = self.identity(&format!("/groups/{}/users/{}", group_id, user_id));
        self.session
            .delete(&url)
            .await
            .for_resource(ResourceKind::User, user_id)
    }

    async fn grant_user_role(&self, project_id: &str, user_id: &str, role: &str) -> Result<()> {
        let role_id = self.role_id(role).await?;
        let url = self.identity(&format!(
            "/projects/{}/users/{}/roles/{}",
            project_id, user_id, role_id
        ));
        self.session
            .send_empty::<serde_json::Value>(Method::PUT, &url, None)
            .await
            .for_resource(ResourceKind::Project, project_id)
    }

    async fn grant_group_role(
        &self,
        project_id: &str,
        group_id: &str,
        role: &str,
    ) -> Result<()> {
        let role_id = self.role_id(role).await?;
        let url = self.identity(&format!(
            "/projects/{}/groups/{}/roles/{}",
            project_id, group_id, role_id
        ));
        self.session
            .send_empty::<serde_json::Value>(Method::PUT, &url, None)
            .await
            .for_resource(ResourceKind::Project, project_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_rejects_duplicates() {
        assert_eq!(single(Vec::<u8>::new(), ResourceKind::Project, "a").unwrap(), None);
        assert_eq!(single(vec![7], ResourceKind::Project, "a").unwrap(), Some(7));

        let err = single(vec![1, 2], ResourceKind::Project, "alpha").unwrap_err();
        assert!(matches!(err, CloudError::Ambiguous { count: 2, .. }));
    }
}
