mod commands;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;

#[derive(Parser)]
#[command(name = "tenantops")]
#[command(about = "Multi-tenant OpenStack project administration", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage projects
    #[command(subcommand)]
    Project(ProjectCommands),
    /// Show the version
    Version,
}

#[derive(Subcommand)]
pub enum ProjectCommands {
    /// Find or create a project with its network, router and security group
    Ensure {
        /// Project name
        name: String,
        /// Also check an existing project's topology and repair what is missing
        #[arg(long)]
        deep: bool,
    },
    /// Show a project's networks, routers, security groups, volumes and servers
    Show {
        /// Project name
        name: String,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Apply a quota to every project
    ApplyQuotaAll {
        #[command(flatten)]
        quota: QuotaArgs,
    },
    /// Apply a quota to one project
    ApplyQuota {
        /// Project name
        #[arg(long)]
        project_name: String,
        #[command(flatten)]
        quota: QuotaArgs,
    },
    /// Print a project's quota set as JSON
    GetQuota {
        /// Project name
        #[arg(long)]
        project_name: String,
    },
    /// List project names
    List,
    /// Delete projects and everything they own
    Delete {
        /// Project names
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Mirror a directory group onto a project
    EnsureLdap {
        /// Project name
        name: String,
        /// Directory group (defaults to the project name)
        #[arg(long)]
        group_cn: Option<String>,
        /// Directory uid to bind as
        #[arg(long, env = "TENANTOPS_LDAP_UID")]
        uid: String,
        /// Directory password (prompted when absent)
        #[arg(long, env = "TENANTOPS_LDAP_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Print server and volume usage of every project as CSV
    Stats,
}

/// Either one quota or the defaults file
#[derive(Args, Debug, Clone)]
pub struct QuotaArgs {
    /// Quota name (e.g. instances, cores, ram)
    #[arg(
        long,
        requires = "quota_value",
        conflicts_with = "defaults",
        required_unless_present = "defaults"
    )]
    pub quota_name: Option<String>,
    /// Quota value; -1 means unlimited
    #[arg(
        long,
        requires = "quota_name",
        conflicts_with = "defaults",
        required_unless_present = "defaults",
        allow_hyphen_values = true
    )]
    pub quota_value: Option<String>,
    /// Apply every quota from the defaults file
    #[arg(long)]
    pub defaults: bool,
    /// Lower quotas that are currently larger
    #[arg(long)]
    pub force: bool,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing();

    let result = match cli.command {
        Commands::Version => {
            println!("tenantops {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Project(command) => commands::handle(command).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}
