use super::connect;
use colored::Colorize;
use tenantops_config::Settings;
use tenantops_core::MembershipSync;
use tenantops_ldap::{LdapConfig, LdapDirectory};

pub async fn handle(
    settings: &Settings,
    name: &str,
    group_cn: Option<String>,
    uid: &str,
    password: Option<String>,
) -> anyhow::Result<()> {
    let config = LdapConfig::from_env()?;
    let group_cn = group_cn.unwrap_or_else(|| name.to_string());
    let password = match password {
        Some(password) => password,
        None => dialoguer::Password::new()
            .with_prompt(format!("LDAP password for {}", uid))
            .interact()
            .map_err(|e| anyhow::anyhow!("Failed to read the LDAP password: {}", e))?,
    };
    let directory = LdapDirectory::new(config, uid, password);

    let ctx = connect(settings).await?;
    let report = MembershipSync::new(&ctx)
        .ensure_ldap_project(name, &group_cn, &directory)
        .await?;

    for user in &report.users_created {
        eprintln!("  {} user {}", "+".green(), user);
    }
    for user in &report.members_added {
        eprintln!("  {} member {}", "+".green(), user);
    }
    for user in &report.members_removed {
        eprintln!("  {} member {}", "-".red(), user);
    }
    println!("Project \"{}\" [{}]", report.project.name, report.project.id);
    Ok(())
}
