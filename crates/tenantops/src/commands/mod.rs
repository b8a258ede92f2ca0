pub mod delete;
pub mod ensure;
pub mod ldap;
pub mod list;
pub mod quota;
pub mod show;
pub mod stats;

use crate::ProjectCommands;
use std::sync::Arc;
use tenantops_config::Settings;
use tenantops_core::Context;
use tenantops_openstack::{AuthConfig, OpenStackCloud};

pub async fn handle(command: ProjectCommands) -> anyhow::Result<()> {
    let settings = Settings::from_env()?;

    match command {
        ProjectCommands::Ensure { name, deep } => ensure::handle(&settings, &name, deep).await,
        ProjectCommands::Show { name, json } => show::handle(&settings, &name, json).await,
        ProjectCommands::ApplyQuotaAll { quota } => quota::handle_apply_all(&settings, quota).await,
        ProjectCommands::ApplyQuota {
            project_name,
            quota,
        } => quota::handle_apply(&settings, &project_name, quota).await,
        ProjectCommands::GetQuota { project_name } => {
            quota::handle_get(&settings, &project_name).await
        }
        ProjectCommands::List => list::handle(&settings).await,
        ProjectCommands::Delete { names } => delete::handle(&settings, &names).await,
        ProjectCommands::EnsureLdap {
            name,
            group_cn,
            uid,
            password,
        } => ldap::handle(&settings, &name, group_cn, &uid, password).await,
        ProjectCommands::Stats => stats::handle(&settings).await,
    }
}

/// Authenticate against the cloud and build the engine context
pub async fn connect(settings: &Settings) -> anyhow::Result<Context> {
    let auth = AuthConfig::from_env()?;
    let cloud = OpenStackCloud::connect(&auth, settings)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to {}: {}", auth.auth_url, e))?;
    Ok(Context::from_settings(Arc::new(cloud), settings))
}
