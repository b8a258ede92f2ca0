pub mod error;

pub use error::*;

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Quota service endpoint, required by every quota command
pub const QUOTA_ENDPOINT_VAR: &str = "OS_NOVA_URL";
/// Direct path to the quota defaults file
pub const DEFAULTS_PATH_VAR: &str = "TENANTOPS_QUOTA_DEFAULTS";

const DOMAIN_VAR: &str = "TENANTOPS_DOMAIN";
const EXTERNAL_NETWORK_VAR: &str = "TENANTOPS_EXTERNAL_NETWORK";
const MEMBER_ROLE_VAR: &str = "TENANTOPS_MEMBER_ROLE";
const HTTP_TIMEOUT_VAR: &str = "TENANTOPS_HTTP_TIMEOUT";

const DEFAULT_DOMAIN: &str = "default";
const DEFAULT_MEMBER_ROLE: &str = "member";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

/// tenantops settings read from the process environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Domain new projects, users and groups are created in
    pub domain: String,
    /// External network for router gateways; first external network when unset
    pub external_network: Option<String>,
    /// Role granted to users and groups on their projects
    pub member_role: String,
    pub http_timeout: Duration,
    pub quota_endpoint: Option<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let http_timeout = match non_empty_var(HTTP_TIMEOUT_VAR) {
            Some(raw) => {
                let secs = raw.parse::<u64>().map_err(|_| ConfigError::InvalidEnvVar {
                    var: HTTP_TIMEOUT_VAR.to_string(),
                    value: raw.clone(),
                })?;
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        Ok(Self {
            domain: non_empty_var(DOMAIN_VAR).unwrap_or_else(|| DEFAULT_DOMAIN.to_string()),
            external_network: non_empty_var(EXTERNAL_NETWORK_VAR),
            member_role: non_empty_var(MEMBER_ROLE_VAR)
                .unwrap_or_else(|| DEFAULT_MEMBER_ROLE.to_string()),
            http_timeout,
            quota_endpoint: non_empty_var(QUOTA_ENDPOINT_VAR),
        })
    }

    /// The quota endpoint, or a configuration error naming the variable
    pub fn require_quota_endpoint(&self) -> Result<&str> {
        self.quota_endpoint
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar(QUOTA_ENDPOINT_VAR.to_string()))
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            domain: DEFAULT_DOMAIN.to_string(),
            external_network: None,
            member_role: DEFAULT_MEMBER_ROLE.to_string(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            quota_endpoint: None,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Read a required environment variable
pub fn require_var(name: &str) -> Result<String> {
    non_empty_var(name).ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

/// tenantops' directory under the user configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("tenantops"))
}

/// Find the quota defaults file
///
/// Search order:
/// 1. `TENANTOPS_QUOTA_DEFAULTS` (direct path)
/// 2. current directory: `conf/defaults.ini`, `defaults.ini`
/// 3. `~/.config/tenantops/defaults.ini`
pub fn find_defaults_file() -> Result<PathBuf> {
    if let Some(path) = non_empty_var(DEFAULTS_PATH_VAR) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!(
            "{} points at {}, which does not exist",
            DEFAULTS_PATH_VAR,
            path.display()
        );
    }

    let current_dir = std::env::current_dir()?;
    for candidate in ["conf/defaults.ini", "defaults.ini"] {
        let path = current_dir.join(candidate);
        if path.exists() {
            return Ok(path);
        }
    }

    if let Ok(config_dir) = get_config_dir() {
        let global = config_dir.join("defaults.ini");
        if global.exists() {
            return Ok(global);
        }
    }

    Err(ConfigError::DefaultsFileNotFound)
}

/// Load the raw `name -> value` pairs of a quota defaults file
///
/// The format follows the file extension (INI, TOML, YAML, JSON). Entries
/// come from a `[DEFAULT]` section when there is one, otherwise from the top
/// level. Values are returned as written; validating them is the caller's job.
pub fn load_defaults_file(path: &Path) -> Result<BTreeMap<String, String>> {
    let load_error = |source| ConfigError::Load {
        path: path.display().to_string(),
        source,
    };

    let settings = config::Config::builder()
        .add_source(config::File::from(path))
        .build()
        .map_err(load_error)?;

    let mut top = settings
        .try_deserialize::<HashMap<String, config::Value>>()
        .map_err(load_error)?;

    // INI files nest `[DEFAULT]` as a table; its key case is not guaranteed
    let section = top
        .keys()
        .find(|key| key.eq_ignore_ascii_case("default"))
        .cloned();
    let table: HashMap<String, config::Value> = match section.and_then(|key| top.remove(&key)) {
        Some(value) => value.into_table().map_err(load_error)?,
        None => top
            .into_iter()
            .filter(|(_, value)| {
                !matches!(
                    value.kind,
                    config::ValueKind::Table(_) | config::ValueKind::Array(_)
                )
            })
            .collect(),
    };

    let mut defaults = BTreeMap::new();
    for (key, value) in table {
        let raw = value.into_string().map_err(load_error)?;
        defaults.insert(key, raw);
    }

    tracing::debug!(
        "Loaded {} quota defaults from {}",
        defaults.len(),
        path.display()
    );
    Ok(defaults)
}
