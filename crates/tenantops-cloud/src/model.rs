//! Typed records for the remote resources tenantops manages
//!
//! Every record is decoded at the client boundary; nothing above the
//! [`CloudClient`](crate::CloudClient) trait sees raw API payloads.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Tenant namespace owning networks, servers, volumes and security groups
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub domain_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub id: String,
    pub name: String,
    pub project_id: String,
    /// Whether routers may use this network as their external gateway
    #[serde(default)]
    pub external: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    pub id: String,
    pub name: String,
    pub network_id: String,
    pub project_id: String,
    pub cidr: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Router {
    pub id: String,
    pub name: String,
    pub project_id: String,
    pub external_network_id: Option<String>,
}

/// A port attached to a device (router interfaces are the ones we care about)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub id: String,
    pub device_id: String,
    pub device_owner: String,
    pub fixed_ips: Vec<FixedIp>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedIp {
    pub subnet_id: String,
    pub ip_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroup {
    pub id: String,
    pub name: String,
    pub project_id: String,
}

/// Traffic direction of a security group rule
///
/// Variant order is the sort order used by reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Egress,
    Ingress,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Egress => "egress",
            Direction::Ingress => "ingress",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The match criteria of a security group rule, without identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub direction: Direction,
    pub ether_type: String,
    /// `None` means all protocols
    pub protocol: Option<String>,
    pub remote_group_id: Option<String>,
    /// `None` together with no remote group means everywhere
    pub remote_ip_prefix: Option<String>,
    /// `None` means all ports
    pub port_range_min: Option<u16>,
    pub port_range_max: Option<u16>,
}

impl RuleSpec {
    /// IPv4 ingress from anywhere, any protocol, all ports
    pub fn external_access() -> Self {
        Self {
            direction: Direction::Ingress,
            ether_type: "IPv4".to_string(),
            protocol: None,
            remote_group_id: None,
            remote_ip_prefix: Some("0.0.0.0/0".to_string()),
            port_range_min: None,
            port_range_max: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroupRule {
    pub id: String,
    pub security_group_id: String,
    #[serde(flatten)]
    pub spec: RuleSpec,
}

impl SecurityGroupRule {
    pub fn matches(&self, spec: &RuleSpec) -> bool {
        &self.spec == spec
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub id: String,
    pub name: String,
    pub status: String,
    /// Hypervisor power state; anything above zero counts as powered on
    pub power_state: i32,
}

impl Server {
    pub fn is_powered_on(&self) -> bool {
        self.power_state > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub id: String,
    pub name: String,
    pub status: String,
    /// Size in GB
    pub size: u64,
}

impl Volume {
    pub fn is_in_use(&self) -> bool {
        self.status == "in-use"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub domain_id: String,
    pub default_project_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub domain_id: String,
}

/// Quota kinds the compute quota service accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaKind {
    Instances,
    Ram,
    Cores,
    FixedIps,
    FloatingIps,
    InjectedFileContentBytes,
    InjectedFilePathBytes,
    InjectedFiles,
    KeyPairs,
    MetadataItems,
    SecurityGroups,
    SecurityGroupRules,
    ServerGroups,
    ServerGroupMembers,
    Networks,
    Subnets,
    Routers,
    RootGb,
}

impl QuotaKind {
    pub const ALL: [QuotaKind; 18] = [
        QuotaKind::Instances,
        QuotaKind::Ram,
        QuotaKind::Cores,
        QuotaKind::FixedIps,
        QuotaKind::FloatingIps,
        QuotaKind::InjectedFileContentBytes,
        QuotaKind::InjectedFilePathBytes,
        QuotaKind::InjectedFiles,
        QuotaKind::KeyPairs,
        QuotaKind::MetadataItems,
        QuotaKind::SecurityGroups,
        QuotaKind::SecurityGroupRules,
        QuotaKind::ServerGroups,
        QuotaKind::ServerGroupMembers,
        QuotaKind::Networks,
        QuotaKind::Subnets,
        QuotaKind::Routers,
        QuotaKind::RootGb,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuotaKind::Instances => "instances",
            QuotaKind::Ram => "ram",
            QuotaKind::Cores => "cores",
            QuotaKind::FixedIps => "fixed_ips",
            QuotaKind::FloatingIps => "floating_ips",
            QuotaKind::InjectedFileContentBytes => "injected_file_content_bytes",
            QuotaKind::InjectedFilePathBytes => "injected_file_path_bytes",
            QuotaKind::InjectedFiles => "injected_files",
            QuotaKind::KeyPairs => "key_pairs",
            QuotaKind::MetadataItems => "metadata_items",
            QuotaKind::SecurityGroups => "security_groups",
            QuotaKind::SecurityGroupRules => "security_group_rules",
            QuotaKind::ServerGroups => "server_groups",
            QuotaKind::ServerGroupMembers => "server_group_members",
            QuotaKind::Networks => "networks",
            QuotaKind::Subnets => "subnets",
            QuotaKind::Routers => "routers",
            QuotaKind::RootGb => "root_gb",
        }
    }
}

impl fmt::Display for QuotaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not one of the known quota kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownQuotaKind(pub String);

impl fmt::Display for UnknownQuotaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let known: Vec<&str> = QuotaKind::ALL.iter().map(|k| k.as_str()).collect();
        write!(
            f,
            "quota \"{}\" is invalid, try one of: {}",
            self.0,
            known.join(", ")
        )
    }
}

impl std::error::Error for UnknownQuotaKind {}

impl FromStr for QuotaKind {
    type Err = UnknownQuotaKind;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        QuotaKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownQuotaKind(s.to_string()))
    }
}

/// Quota limits of a single project as reported by the quota service
///
/// Keys are kept as the service sent them so extra fields (such as `id`)
/// survive for display. `-1` means unlimited.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuotaSet {
    pub values: BTreeMap<String, serde_json::Value>,
}

impl QuotaSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(mut self, kind: QuotaKind, value: i64) -> Self {
        self.set(kind, value);
        self
    }

    pub fn set(&mut self, kind: QuotaKind, value: i64) {
        self.values
            .insert(kind.as_str().to_string(), serde_json::json!(value));
    }

    /// Current limit for `kind`, if the service reported one
    pub fn get(&self, kind: QuotaKind) -> Option<i64> {
        self.values.get(kind.as_str()).and_then(|v| match v {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        })
    }
}
