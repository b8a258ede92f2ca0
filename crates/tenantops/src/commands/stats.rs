use super::connect;
use tenantops_config::Settings;
use tenantops_core::{CSV_HEADER, get_stats};

pub async fn handle(settings: &Settings) -> anyhow::Result<()> {
    let ctx = connect(settings).await?;
    let mut projects = ctx.client().list_projects().await?;
    projects.sort_by(|a, b| a.name.cmp(&b.name));

    let mut writer = csv::Writer::from_writer(std::io::stdout());
    writer.write_record(CSV_HEADER)?;
    for project in &projects {
        let stats = get_stats(&ctx, project).await?;
        writer.write_record(stats.to_record(project))?;
    }
    writer.flush()?;
    Ok(())
}
