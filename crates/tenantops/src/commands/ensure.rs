use super::connect;
use colored::Colorize;
use tenantops_config::Settings;
use tenantops_core::{Provisioner, VerifyMode};

pub async fn handle(settings: &Settings, name: &str, deep: bool) -> anyhow::Result<()> {
    let ctx = connect(settings).await?;
    let mode = if deep {
        VerifyMode::Deep
    } else {
        VerifyMode::Shallow
    };

    let ensured = Provisioner::new(&ctx)
        .ensure_project(name, &ctx.domain, mode)
        .await?;

    for resource in &ensured.created {
        eprintln!("  {} {}", "✓".green(), resource);
    }
    println!(
        "Project \"{}\" [{}]",
        ensured.project.name, ensured.project.id
    );
    Ok(())
}
