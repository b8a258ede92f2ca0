use super::connect;
use crate::QuotaArgs;
use colored::Colorize;
use tenantops_config::Settings;
use tenantops_core::{QuotaDefaults, QuotaReconciler, QuotaRequest, QuotaTarget};

/// Validate the quota arguments before any remote call
fn resolve_target(args: &QuotaArgs) -> anyhow::Result<QuotaTarget> {
    if args.defaults {
        let (path, defaults) = QuotaDefaults::discover()?;
        tracing::info!(
            "Loaded {} quota default(s) from {}",
            defaults.len(),
            path.display()
        );
        return Ok(QuotaTarget::Defaults(defaults));
    }

    match (&args.quota_name, &args.quota_value) {
        (Some(name), Some(value)) => Ok(QuotaTarget::Single(QuotaRequest::parse(name, value)?)),
        _ => anyhow::bail!("--quota-name and --quota-value are required unless --defaults is given"),
    }
}

pub async fn handle_apply_all(settings: &Settings, args: QuotaArgs) -> anyhow::Result<()> {
    settings.require_quota_endpoint()?;
    let target = resolve_target(&args)?;

    let ctx = connect(settings).await?;
    let mut projects = ctx.client().list_projects().await?;
    projects.sort_by(|a, b| a.name.cmp(&b.name));

    let report = QuotaReconciler::new(&ctx)
        .apply_to_all(&projects, &target, args.force)
        .await;

    for result in &report.succeeded {
        eprintln!("  {} {}: {}", "✓".green(), result.target, result.message);
    }
    for result in &report.refused {
        eprintln!("  {} {}: {}", "⚠".yellow(), result.target, result.message);
    }
    for result in &report.failed {
        eprintln!("  {} {}: {}", "✗".red(), result.target, result.message);
    }
    eprintln!("{}", report.to_string().bold());

    if !report.is_success() {
        anyhow::bail!("{} project(s) failed", report.failed.len());
    }
    Ok(())
}

pub async fn handle_apply(
    settings: &Settings,
    project_name: &str,
    args: QuotaArgs,
) -> anyhow::Result<()> {
    settings.require_quota_endpoint()?;
    let target = resolve_target(&args)?;

    let ctx = connect(settings).await?;
    let project = ctx.project_by_name(project_name).await?;
    let reconciler = QuotaReconciler::new(&ctx);

    let quota_set = match target {
        QuotaTarget::Single(request) => {
            let change = reconciler.apply(&project, request, args.force).await?;
            change
                .outcome
                .require_not_refused(&project.name, change.kind)?;
            change.quota_set
        }
        QuotaTarget::Defaults(defaults) => {
            let report = reconciler
                .apply_defaults(&project, &defaults, args.force)
                .await?;
            for (kind, outcome) in &report.entries {
                eprintln!("  {}: {}", kind, outcome);
            }
            reconciler.get_quota(&project).await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&quota_set.values)?);
    Ok(())
}

pub async fn handle_get(settings: &Settings, project_name: &str) -> anyhow::Result<()> {
    settings.require_quota_endpoint()?;

    let ctx = connect(settings).await?;
    let project = ctx.project_by_name(project_name).await?;
    let quota_set = QuotaReconciler::new(&ctx).get_quota(&project).await?;

    println!("{}", serde_json::to_string_pretty(&quota_set.values)?);
    Ok(())
}
