use super::connect;
use colored::Colorize;
use tenantops_config::Settings;
use tenantops_core::Decommissioner;

/// Delete each project in turn; a failure does not stop the others
pub async fn handle(settings: &Settings, names: &[String]) -> anyhow::Result<()> {
    let ctx = connect(settings).await?;
    let decommissioner = Decommissioner::new(&ctx);
    let mut failed = Vec::new();

    for name in names {
        match decommissioner.delete_project(name).await {
            Ok(report) => {
                println!(
                    "{} Deleted project \"{}\" [{}]: {}",
                    "✓".green(),
                    report.project,
                    report.project_id,
                    report
                );
            }
            Err(e) => {
                eprintln!("{} {}: {}", "✗".red(), name, e);
                failed.push(name.as_str());
            }
        }
    }

    if !failed.is_empty() {
        anyhow::bail!("Failed to delete {}", failed.join(", "));
    }
    Ok(())
}
