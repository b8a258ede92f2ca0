use super::connect;
use tenantops_config::Settings;

pub async fn handle(settings: &Settings) -> anyhow::Result<()> {
    let ctx = connect(settings).await?;
    let mut projects = ctx.client().list_projects().await?;
    projects.sort_by(|a, b| a.name.cmp(&b.name));

    for project in projects {
        println!("{}", project.name);
    }
    Ok(())
}
