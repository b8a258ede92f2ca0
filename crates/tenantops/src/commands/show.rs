use super::connect;
use tenantops_config::Settings;
use tenantops_core::Inspector;

pub async fn handle(settings: &Settings, name: &str, json: bool) -> anyhow::Result<()> {
    let ctx = connect(settings).await?;
    let report = Inspector::new(&ctx).show_project(name).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report);
    }
    Ok(())
}
