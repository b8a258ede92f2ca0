//! Project decommissioning
//!
//! Deletes everything a project owns, children before parents:
//! servers, volumes, router interfaces, routers, subnets, networks, the
//! project, and finally its security groups. The platform recreates the
//! `default` security group of a live project, so groups go last.

use crate::context::Context;
use crate::error::Result;
use serde::Serialize;
use tenantops_cloud::{CloudError, Project};

/// What a decommission run removed
#[derive(Debug, Clone, Default, Serialize)]
pub struct DecommissionReport {
    pub project: String,
    pub project_id: String,
    pub servers: usize,
    pub volumes: usize,
    /// `false` when the deployment has no volume service
    pub volume_service: bool,
    pub ports: usize,
    pub routers: usize,
    pub subnets: usize,
    pub networks: usize,
    pub security_groups: usize,
}

impl std::fmt::Display for DecommissionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} server(s), {} volume(s), {} router(s), {} network(s), {} security group(s)",
            self.servers, self.volumes, self.routers, self.networks, self.security_groups
        )
    }
}

/// Treat a missing resource as already deleted; returns whether it was deleted
fn missing_ok(result: tenantops_cloud::Result<()>) -> Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.is_not_found() => {
            tracing::debug!("Already gone: {}", e);
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

pub struct Decommissioner<'a> {
    ctx: &'a Context,
}

impl<'a> Decommissioner<'a> {
    pub fn new(ctx: &'a Context) -> Self {
        Self { ctx }
    }

    /// Delete the project `name` and everything in it
    pub async fn delete_project(&self, name: &str) -> Result<DecommissionReport> {
        let project = self.ctx.project_by_name(name).await?;
        tracing::info!(
            "Started deleting project \"{}\" [{}]",
            project.name,
            project.id
        );

        let mut report = DecommissionReport {
            project: project.name.clone(),
            project_id: project.id.clone(),
            volume_service: true,
            ..DecommissionReport::default()
        };

        self.delete_servers(&project, &mut report).await?;
        self.delete_volumes(&project, &mut report).await?;
        self.delete_routers(&project, &mut report).await?;
        self.delete_networks(&project, &mut report).await?;

        let client = self.ctx.client();
        let security_groups = client.list_security_groups(&project.id).await?;

        client.delete_project(&project.id).await?;
        tracing::info!("  Deleted project itself");

        for group in security_groups {
            if missing_ok(client.delete_security_group(&group.id).await)? {
                report.security_groups += 1;
                tracing::info!(
                    "  Deleted security group \"{}\" [{}]",
                    group.name,
                    group.id
                );
            }
        }

        tracing::info!("  Finished deleting project: {}", report);
        Ok(report)
    }

    async fn delete_servers(&self, project: &Project, report: &mut DecommissionReport) -> Result<()> {
        let client = self.ctx.client();
        for server in client.list_servers(&project.id).await? {
            if missing_ok(client.delete_server(&server.id, true).await)? {
                report.servers += 1;
                tracing::info!("  Deleted server \"{}\" [{}]", server.name, server.id);
            }
        }
        Ok(())
    }

    async fn delete_volumes(&self, project: &Project, report: &mut DecommissionReport) -> Result<()> {
        let client = self.ctx.client();
        let volumes = match client.list_volumes(&project.id).await {
            Ok(volumes) => volumes,
            Err(CloudError::ServiceUnavailable(service)) => {
                tracing::warn!("No volume endpoint ({}); skipping volumes", service);
                report.volume_service = false;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        for volume in volumes {
            if missing_ok(client.delete_volume(&volume.id).await)? {
                report.volumes += 1;
                tracing::info!("  Deleted volume \"{}\" [{}]", volume.name, volume.id);
            }
        }
        Ok(())
    }

    /// Detach interfaces, then delete each router; the gateway port goes with
    /// the router
    async fn delete_routers(&self, project: &Project, report: &mut DecommissionReport) -> Result<()> {
        let client = self.ctx.client();
        for router in client.list_routers(&project.id).await? {
            tracing::info!(
                "  Started deleting router \"{}\" [{}]",
                router.name,
                router.id
            );
            for port in client.list_router_ports(&router.id).await? {
                if port.device_owner == "network:router_gateway" {
                    continue;
                }
                if missing_ok(client.remove_router_interface(&router.id, &port.id).await)? {
                    report.ports += 1;
                    tracing::info!("    Removed port {} [{}]", port.device_owner, port.id);
                }
            }
            if missing_ok(client.delete_router(&router.id).await)? {
                report.routers += 1;
            }
            tracing::info!("    Finished deleting router");
        }
        Ok(())
    }

    async fn delete_networks(&self, project: &Project, report: &mut DecommissionReport) -> Result<()> {
        let client = self.ctx.client();
        for network in client.list_networks(&project.id).await? {
            tracing::info!(
                "  Started deleting network \"{}\" [{}]",
                network.name,
                network.id
            );
            for subnet in client.list_subnets(&network.id).await? {
                if missing_ok(client.delete_subnet(&subnet.id).await)? {
                    report.subnets += 1;
                    tracing::info!("    Deleted subnet \"{}\" [{}]", subnet.name, subnet.id);
                }
            }
            if missing_ok(client.delete_network(&network.id).await)? {
                report.networks += 1;
            }
            tracing::info!("    Finished deleting network");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::provision::{Provisioner, VerifyMode};
    use std::sync::Arc;
    use tenantops_cloud::{CloudClient, MemoryCloud, ResourceKind};

    async fn provisioned(cloud: MemoryCloud) -> (Arc<MemoryCloud>, Context, Project) {
        let cloud = Arc::new(cloud);
        let ctx = Context::new(cloud.clone());
        let ensured = Provisioner::new(&ctx)
            .ensure_project("alpha", "default", VerifyMode::Deep)
            .await
            .unwrap();
        (cloud, ctx, ensured.project)
    }

    #[tokio::test]
    async fn test_delete_order() {
        let (cloud, ctx, project) = provisioned(MemoryCloud::new()).await;
        cloud
            .create_security_group(&project.id, "web")
            .await
            .unwrap();
        cloud.add_server(&project.id, "vm1", 1);
        cloud.add_volume(&project.id, "data", 10, "in-use");
        let interface = cloud
            .ports()
            .into_iter()
            .find(|p| p.device_owner == "network:router_interface")
            .unwrap();
        cloud.clear_journal();

        let report = Decommissioner::new(&ctx).delete_project("alpha").await.unwrap();

        assert_eq!(
            cloud.journal(),
            vec![
                "force_delete_server:vm1".to_string(),
                "delete_volume:data".to_string(),
                format!("remove_router_interface:{}", interface.id),
                "delete_router:router0".to_string(),
                "delete_subnet:subnet0".to_string(),
                "delete_network:network1".to_string(),
                "delete_project:alpha".to_string(),
                "delete_security_group:default".to_string(),
                "delete_security_group:web".to_string(),
            ]
        );
        assert_eq!(report.servers, 1);
        assert_eq!(report.security_groups, 2);
        assert!(report.volume_service);

        // Nothing left behind, and no default group was recreated
        assert!(cloud.projects().is_empty());
        assert!(cloud.security_groups().is_empty());
        assert!(cloud.ports().is_empty());
        assert!(cloud.subnets().is_empty());
    }

    #[tokio::test]
    async fn test_missing_volume_service() {
        let (cloud, ctx, project) = provisioned(MemoryCloud::new().without_volume_service()).await;
        cloud.add_server(&project.id, "vm1", 0);

        let report = Decommissioner::new(&ctx).delete_project("alpha").await.unwrap();

        assert!(!report.volume_service);
        assert_eq!(report.volumes, 0);
        assert!(cloud.projects().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_project() {
        let cloud = Arc::new(MemoryCloud::new());
        let ctx = Context::new(cloud.clone());

        let err = Decommissioner::new(&ctx)
            .delete_project("ghost")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::NotFound {
                kind: ResourceKind::Project,
                ..
            }
        ));
        assert!(cloud.journal().is_empty());
    }

    #[test]
    fn test_missing_ok() {
        assert!(missing_ok(Ok(())).unwrap());
        assert!(
            !missing_ok(Err(CloudError::not_found(ResourceKind::Server, "s1"))).unwrap()
        );
        assert!(missing_ok(Err(CloudError::Transport("reset".to_string()))).is_err());
    }
}
