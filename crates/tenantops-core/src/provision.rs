//! Project provisioning
//!
//! Finds or creates a project and its standard topology: one network with
//! one subnet, a router connecting the subnet to the external network, and
//! the default security group opened for external access.

use crate::context::Context;
use crate::error::{Error, Result};
use serde::Serialize;
use std::future::Future;
use tenantops_cloud::{
    CloudError, Network, Project, ResourceKind, Router, RuleSpec, SecurityGroup, Subnet,
};

/// Names and address ranges of the standard project topology
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    pub network: String,
    pub subnet: String,
    pub subnet_cidr: String,
    pub router: String,
    pub security_group: String,
    /// Rule the security group must carry
    pub access_rule: RuleSpec,
}

impl Default for Topology {
    fn default() -> Self {
        Self {
            network: "network1".to_string(),
            subnet: "subnet0".to_string(),
            subnet_cidr: "192.168.0.0/24".to_string(),
            router: "router0".to_string(),
            security_group: "default".to_string(),
            access_rule: RuleSpec::external_access(),
        }
    }
}

/// How much of an existing project to verify
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerifyMode {
    /// Stop as soon as the project is found
    #[default]
    Shallow,
    /// Check (and repair) every piece of the standard topology
    Deep,
}

/// A resource created during one `ensure_project` run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedResource {
    pub kind: ResourceKind,
    pub name: String,
    pub id: String,
}

impl std::fmt::Display for CreatedResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} \"{}\" [{}]", self.kind, self.name, self.id)
    }
}

#[derive(Debug, Clone)]
pub struct EnsuredProject {
    pub project: Project,
    pub newly_created: bool,
    /// Everything created by this run, in creation order
    pub created: Vec<CreatedResource>,
}

/// Outcome of a create call that may have lost a race
struct Settled<T> {
    value: T,
    created: bool,
}

/// Resolve a create result, re-finding the resource when another operator
/// created it first
async fn settle<T, F>(
    created: tenantops_cloud::Result<T>,
    refind: F,
    kind: ResourceKind,
    name: &str,
) -> Result<Settled<T>>
where
    F: Future<Output = tenantops_cloud::Result<Option<T>>>,
{
    match created {
        Ok(value) => Ok(Settled {
            value,
            created: true,
        }),
        Err(CloudError::AlreadyExists { .. }) => {
            tracing::info!("{} \"{}\" was created concurrently, using it", kind, name);
            let value = refind.await?.ok_or_else(|| Error::not_found(kind, name))?;
            Ok(Settled {
                value,
                created: false,
            })
        }
        Err(e) => Err(e.into()),
    }
}

pub struct Provisioner<'a> {
    ctx: &'a Context,
    created: Vec<CreatedResource>,
}

impl<'a> Provisioner<'a> {
    pub fn new(ctx: &'a Context) -> Self {
        Self {
            ctx,
            created: Vec::new(),
        }
    }

    /// Ensure the project `name` exists in `domain`
    ///
    /// A project that already exists is returned as-is in
    /// [`VerifyMode::Shallow`]; in [`VerifyMode::Deep`] its standard
    /// topology is checked and anything missing is created. A new project
    /// always gets the full topology.
    pub async fn ensure_project(
        mut self,
        name: &str,
        domain: &str,
        mode: VerifyMode,
    ) -> Result<EnsuredProject> {
        let ctx = self.ctx;
        let client = ctx.client();

        let (project, newly_created) = match client.find_project(name, domain).await? {
            Some(project) => {
                tracing::info!("Found project \"{}\" [{}]", project.name, project.id);
                (project, false)
            }
            None => {
                let settled = settle(
                    client.create_project(name, domain).await,
                    client.find_project(name, domain),
                    ResourceKind::Project,
                    name,
                )
                .await?;
                if settled.created {
                    self.record(ResourceKind::Project, &settled.value.name, &settled.value.id);
                }
                (settled.value, settled.created)
            }
        };

        if !newly_created && mode == VerifyMode::Shallow {
            return Ok(EnsuredProject {
                project,
                newly_created,
                created: self.created,
            });
        }

        let network = self.ensure_network(&project, newly_created).await?;
        let subnet = self
            .ensure_subnet(&project, &network.value, network.created)
            .await?;
        let router = self.ensure_router(&project, newly_created).await?;
        self.ensure_router_interface(&router, &subnet).await?;
        let group = self.ensure_security_group(&project).await?;
        self.ensure_access_rule(&group).await?;

        Ok(EnsuredProject {
            project,
            newly_created,
            created: self.created,
        })
    }

    fn record(&mut self, kind: ResourceKind, name: &str, id: &str) {
        tracing::info!("Created {} \"{}\" [{}]", kind, name, id);
        self.created.push(CreatedResource {
            kind,
            name: name.to_string(),
            id: id.to_string(),
        });
    }

    async fn ensure_network(
        &mut self,
        project: &Project,
        parent_created: bool,
    ) -> Result<Settled<Network>> {
        let ctx = self.ctx;
        let client = ctx.client();
        let name = ctx.topology.network.as_str();

        if !parent_created {
            if let Some(network) = client.find_network(&project.id, name).await? {
                tracing::debug!("Found network \"{}\" [{}]", network.name, network.id);
                return Ok(Settled {
                    value: network,
                    created: false,
                });
            }
        }

        let settled = settle(
            client.create_network(&project.id, name).await,
            client.find_network(&project.id, name),
            ResourceKind::Network,
            name,
        )
        .await?;
        if settled.created {
            self.record(ResourceKind::Network, name, &settled.value.id);
        }
        Ok(settled)
    }

    async fn ensure_subnet(
        &mut self,
        project: &Project,
        network: &Network,
        parent_created: bool,
    ) -> Result<Settled<Subnet>> {
        let ctx = self.ctx;
        let client = ctx.client();
        let name = ctx.topology.subnet.as_str();
        let cidr = ctx.topology.subnet_cidr.as_str();

        if !parent_created {
            if let Some(subnet) = client.find_subnet(&network.id, name).await? {
                tracing::debug!("Found subnet \"{}\" [{}]", subnet.name, subnet.id);
                return Ok(Settled {
                    value: subnet,
                    created: false,
                });
            }
        }

        let settled = settle(
            client
                .create_subnet(&project.id, &network.id, name, cidr)
                .await,
            client.find_subnet(&network.id, name),
            ResourceKind::Subnet,
            name,
        )
        .await?;
        if settled.created {
            self.record(ResourceKind::Subnet, name, &settled.value.id);
        }
        Ok(settled)
    }

    async fn ensure_router(
        &mut self,
        project: &Project,
        parent_created: bool,
    ) -> Result<Settled<Router>> {
        let ctx = self.ctx;
        let client = ctx.client();
        let name = ctx.topology.router.as_str();

        if !parent_created {
            if let Some(router) = client.find_router(&project.id, name).await? {
                // The gateway of an existing router is left as found
                tracing::debug!("Found router \"{}\" [{}]", router.name, router.id);
                return Ok(Settled {
                    value: router,
                    created: false,
                });
            }
        }

        let wanted = ctx.external_network.as_deref();
        let external = match client.find_external_network(wanted).await? {
            Some(network) => Some(network.id),
            None => match wanted {
                Some(wanted) => return Err(Error::not_found(ResourceKind::Network, wanted)),
                None => {
                    tracing::warn!(
                        "No external network found; router \"{}\" will have no gateway",
                        name
                    );
                    None
                }
            },
        };

        let settled = settle(
            client
                .create_router(&project.id, name, external.as_deref())
                .await,
            client.find_router(&project.id, name),
            ResourceKind::Router,
            name,
        )
        .await?;
        if settled.created {
            self.record(ResourceKind::Router, name, &settled.value.id);
        }
        Ok(settled)
    }

    /// Attach the subnet to the router unless an interface already exists
    async fn ensure_router_interface(
        &mut self,
        router: &Settled<Router>,
        subnet: &Settled<Subnet>,
    ) -> Result<()> {
        let ctx = self.ctx;
        let client = ctx.client();

        if !router.created && !subnet.created {
            let ports = client.list_router_ports(&router.value.id).await?;
            let attached = ports
                .iter()
                .any(|p| p.fixed_ips.iter().any(|ip| ip.subnet_id == subnet.value.id));
            if attached {
                return Ok(());
            }
        }

        let port = client
            .add_router_interface(&router.value.id, &subnet.value.id)
            .await?;
        tracing::info!(
            "Attached subnet \"{}\" to router \"{}\" [{}]",
            subnet.value.name,
            router.value.name,
            port.id
        );
        self.created.push(CreatedResource {
            kind: ResourceKind::Port,
            name: port.device_owner,
            id: port.id,
        });
        Ok(())
    }

    /// The platform creates a default group with every project, so this one
    /// is always looked up first.
    async fn ensure_security_group(&mut self, project: &Project) -> Result<Settled<SecurityGroup>> {
        let ctx = self.ctx;
        let client = ctx.client();
        let name = ctx.topology.security_group.as_str();

        if let Some(group) = client.find_security_group(&project.id, name).await? {
            tracing::debug!("Found security group \"{}\" [{}]", group.name, group.id);
            return Ok(Settled {
                value: group,
                created: false,
            });
        }

        let settled = settle(
            client.create_security_group(&project.id, name).await,
            client.find_security_group(&project.id, name),
            ResourceKind::SecurityGroup,
            name,
        )
        .await?;
        if settled.created {
            self.record(ResourceKind::SecurityGroup, name, &settled.value.id);
        }
        Ok(settled)
    }

    async fn ensure_access_rule(&mut self, group: &Settled<SecurityGroup>) -> Result<()> {
        let ctx = self.ctx;
        let client = ctx.client();
        let spec = &ctx.topology.access_rule;

        if !group.created {
            let rules = client.list_security_group_rules(&group.value.id).await?;
            if rules.iter().any(|rule| rule.matches(spec)) {
                return Ok(());
            }
        }

        let rule = match client.create_security_group_rule(&group.value.id, spec).await {
            Ok(rule) => rule,
            Err(CloudError::AlreadyExists { .. }) => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        tracing::info!(
            "Added {} {} rule to security group \"{}\" [{}]",
            spec.ether_type,
            spec.direction,
            group.value.name,
            rule.id
        );
        self.created.push(CreatedResource {
            kind: ResourceKind::SecurityGroupRule,
            name: group.value.name.clone(),
            id: rule.id,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tenantops_cloud::{CloudClient, MemoryCloud};

    fn setup() -> (Arc<MemoryCloud>, Context) {
        let cloud = Arc::new(MemoryCloud::new());
        let ctx = Context::new(cloud.clone());
        (cloud, ctx)
    }

    async fn ensure(ctx: &Context, name: &str, mode: VerifyMode) -> EnsuredProject {
        Provisioner::new(ctx)
            .ensure_project(name, "default", mode)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_new_project_gets_full_topology() {
        let (cloud, ctx) = setup();

        let ensured = ensure(&ctx, "alpha", VerifyMode::Shallow).await;

        assert!(ensured.newly_created);
        let kinds: Vec<ResourceKind> = ensured.created.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ResourceKind::Project,
                ResourceKind::Network,
                ResourceKind::Subnet,
                ResourceKind::Router,
                ResourceKind::Port,
                ResourceKind::SecurityGroupRule,
            ]
        );

        // The platform-made default group is reused
        assert_eq!(cloud.security_groups().len(), 1);
        let subnet = &cloud.subnets()[0];
        assert_eq!(subnet.cidr, "192.168.0.0/24");

        let router = &cloud.routers()[0];
        assert!(router.external_network_id.is_some());
        let journal = cloud.journal();
        assert!(journal.contains(&format!("add_router_interface:{}", subnet.id)));
        assert!(!journal.iter().any(|e| e.starts_with("create_security_group:")));
    }

    #[tokio::test]
    async fn test_new_project_skips_lookups_under_fresh_parents() {
        let (cloud, ctx) = setup();
        ensure(&ctx, "alpha", VerifyMode::Shallow).await;

        // create calls only; no interface port listing for a fresh router
        assert_eq!(
            cloud.journal()[..4],
            [
                "create_project:alpha",
                "create_network:network1",
                "create_subnet:subnet0",
                "create_router:router0",
            ]
        );
    }

    #[tokio::test]
    async fn test_ensure_is_idempotent() {
        let (cloud, ctx) = setup();
        let first = ensure(&ctx, "alpha", VerifyMode::Deep).await;
        cloud.clear_journal();

        let second = ensure(&ctx, "alpha", VerifyMode::Deep).await;

        assert_eq!(first.project.id, second.project.id);
        assert!(!second.newly_created);
        assert!(second.created.is_empty());
        assert!(cloud.journal().is_empty());
        assert_eq!(cloud.networks().iter().filter(|n| !n.external).count(), 1);
        assert_eq!(cloud.subnets().len(), 1);
        assert_eq!(cloud.routers().len(), 1);
        assert_eq!(cloud.security_group_rules().len(), 5);
    }

    #[tokio::test]
    async fn test_shallow_returns_existing_project_untouched() {
        let (cloud, ctx) = setup();
        cloud.create_project("alpha", "default").await.unwrap();
        cloud.clear_journal();

        let ensured = ensure(&ctx, "alpha", VerifyMode::Shallow).await;

        assert!(!ensured.newly_created);
        assert!(cloud.journal().is_empty());
        assert!(cloud.routers().is_empty());
    }

    #[tokio::test]
    async fn test_deep_repairs_missing_pieces() {
        let (cloud, ctx) = setup();
        let project = cloud.create_project("alpha", "default").await.unwrap();
        let network = cloud.create_network(&project.id, "network1").await.unwrap();
        cloud.clear_journal();

        let ensured = ensure(&ctx, "alpha", VerifyMode::Deep).await;

        let kinds: Vec<ResourceKind> = ensured.created.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ResourceKind::Subnet,
                ResourceKind::Router,
                ResourceKind::Port,
                ResourceKind::SecurityGroupRule,
            ]
        );
        assert_eq!(cloud.subnets()[0].network_id, network.id);
        assert!(!cloud.journal().iter().any(|e| e.starts_with("create_network:")));
    }

    #[tokio::test]
    async fn test_deep_reattaches_detached_subnet() {
        let (cloud, ctx) = setup();
        ensure(&ctx, "alpha", VerifyMode::Deep).await;

        let router = cloud.routers()[0].clone();
        let interface = cloud
            .ports()
            .into_iter()
            .find(|p| p.device_owner == "network:router_interface")
            .unwrap();
        cloud
            .remove_router_interface(&router.id, &interface.id)
            .await
            .unwrap();

        let ensured = ensure(&ctx, "alpha", VerifyMode::Deep).await;
        assert_eq!(ensured.created.len(), 1);
        assert_eq!(ensured.created[0].kind, ResourceKind::Port);
    }

    #[tokio::test]
    async fn test_race_on_create_is_success() {
        let (cloud, ctx) = setup();
        cloud.race_next_create(ResourceKind::Project);
        cloud.race_next_create(ResourceKind::Subnet);

        let ensured = ensure(&ctx, "alpha", VerifyMode::Deep).await;

        // Raced resources are re-found, not counted as ours
        assert!(!ensured.newly_created);
        assert!(
            !ensured
                .created
                .iter()
                .any(|c| matches!(c.kind, ResourceKind::Project | ResourceKind::Subnet))
        );
        assert_eq!(cloud.projects().len(), 1);
        assert_eq!(cloud.subnets().len(), 1);
        assert_eq!(cloud.routers().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_named_external_network() {
        let (_cloud, ctx) = setup();
        let mut ctx = ctx;
        ctx.external_network = Some("provider".to_string());

        let err = Provisioner::new(&ctx)
            .ensure_project("alpha", "default", VerifyMode::Shallow)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::NotFound {
                kind: ResourceKind::Network,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_custom_topology() {
        let (cloud, ctx) = setup();
        let ctx = ctx.with_topology(Topology {
            network: "lab".to_string(),
            subnet_cidr: "10.10.0.0/24".to_string(),
            ..Topology::default()
        });

        ensure(&ctx, "alpha", VerifyMode::Shallow).await;

        assert!(cloud.networks().iter().any(|n| n.name == "lab"));
        assert_eq!(cloud.subnets()[0].cidr, "10.10.0.0/24");
    }
}
