//! Per-invocation context shared by every engine component

use crate::error::{Error, Result};
use crate::provision::Topology;
use std::sync::Arc;
use tenantops_cloud::{CloudClient, Project, ResourceKind};
use tenantops_config::Settings;

/// Everything an engine operation needs besides its own arguments
///
/// Built once per CLI invocation and passed explicitly; there is no global
/// client.
#[derive(Clone)]
pub struct Context {
    client: Arc<dyn CloudClient>,
    /// Domain new projects, users and groups live in
    pub domain: String,
    pub topology: Topology,
    /// Role granted on projects by the membership sync
    pub member_role: String,
    /// External network for router gateways; first external network when unset
    pub external_network: Option<String>,
}

impl Context {
    pub fn new(client: Arc<dyn CloudClient>) -> Self {
        Self::from_settings(client, &Settings::default())
    }

    pub fn from_settings(client: Arc<dyn CloudClient>, settings: &Settings) -> Self {
        Self {
            client,
            domain: settings.domain.clone(),
            topology: Topology::default(),
            member_role: settings.member_role.clone(),
            external_network: settings.external_network.clone(),
        }
    }

    pub fn with_topology(mut self, topology: Topology) -> Self {
        self.topology = topology;
        self
    }

    pub fn client(&self) -> &dyn CloudClient {
        self.client.as_ref()
    }

    /// Look up a project by name in the context domain, failing when absent
    pub async fn project_by_name(&self, name: &str) -> Result<Project> {
        self.client
            .find_project(name, &self.domain)
            .await?
            .ok_or_else(|| Error::not_found(ResourceKind::Project, name))
    }
}
