//! Read-only project reports

use crate::context::Context;
use crate::error::Result;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use tenantops_cloud::{
    CloudError, Direction, Network, Project, Router, SecurityGroup, SecurityGroupRule, Server,
    Subnet, Volume,
};

#[derive(Debug, Clone, Serialize)]
pub struct ProjectReport {
    pub project: Project,
    pub networks: Vec<NetworkReport>,
    pub routers: Vec<RouterReport>,
    pub security_groups: Vec<SecurityGroupReport>,
    /// Empty when the deployment has no volume service
    pub volumes: Vec<Volume>,
    pub servers: Vec<Server>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkReport {
    pub network: Network,
    pub subnets: Vec<Subnet>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouterReport {
    pub router: Router,
    pub ports: Vec<PortReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortReport {
    pub id: String,
    pub device_owner: String,
    pub fixed_ips: Vec<AddressReport>,
}

/// A fixed IP annotated with the name of its subnet
#[derive(Debug, Clone, Serialize)]
pub struct AddressReport {
    pub ip_address: String,
    pub subnet_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SecurityGroupReport {
    pub group: SecurityGroup,
    /// Sorted with [`compare_rules`]
    pub rules: Vec<RuleReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RuleReport {
    pub rule: SecurityGroupRule,
    /// Name of the remote group, when the rule references one
    pub remote_group_name: Option<String>,
}

impl RuleReport {
    /// One-line rendering, e.g. `IPv4 tcp from everywhere on port 22`
    pub fn describe(&self) -> String {
        let spec = &self.rule.spec;
        let direction = match spec.direction {
            Direction::Egress => "to",
            Direction::Ingress => "from",
        };
        let remote = match (&spec.remote_group_id, &spec.remote_ip_prefix) {
            (Some(id), _) => format!("<{}>", self.remote_group_name.as_deref().unwrap_or(id)),
            (None, Some(prefix)) => prefix.clone(),
            (None, None) => "everywhere".to_string(),
        };
        let ports = match (spec.port_range_min, spec.port_range_max) {
            (None, _) => "all ports".to_string(),
            (Some(min), Some(max)) if min != max => format!("ports {}-{}", min, max),
            (Some(min), _) => format!("port {}", min),
        };
        format!(
            "{} {} {} {} on {}",
            spec.ether_type,
            spec.protocol.as_deref().unwrap_or("all"),
            direction,
            remote,
            ports
        )
    }
}

/// Report ordering: direction, ether type, protocol, remote group, remote
/// prefix, port min, port max
///
/// Every field compares as text and an absent value reads `None`, so
/// `"0.0.0.0/0"` sorts before an absent prefix and port `1024` before `22`.
/// Reports stay diffable against listings produced with the same key.
pub fn compare_rules(a: &SecurityGroupRule, b: &SecurityGroupRule) -> Ordering {
    fn text<T: ToString>(value: &Option<T>) -> String {
        value
            .as_ref()
            .map_or_else(|| "None".to_string(), ToString::to_string)
    }

    let key = |r: &SecurityGroupRule| {
        let s = &r.spec;
        [
            s.direction.to_string(),
            s.ether_type.clone(),
            text(&s.protocol),
            text(&s.remote_group_id),
            text(&s.remote_ip_prefix),
            text(&s.port_range_min),
            text(&s.port_range_max),
        ]
    };
    key(a).cmp(&key(b))
}

pub fn sort_rules(rules: &mut [SecurityGroupRule]) {
    rules.sort_by(compare_rules);
}

impl fmt::Display for ProjectReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Project \"{}\" [{}]", self.project.name, self.project.id)?;

        for entry in &self.networks {
            writeln!(
                f,
                "  Network \"{}\" [{}]",
                entry.network.name, entry.network.id
            )?;
            for subnet in &entry.subnets {
                writeln!(
                    f,
                    "    Subnet \"{}\" [{}] {}",
                    subnet.name, subnet.id, subnet.cidr
                )?;
            }
        }

        for entry in &self.routers {
            writeln!(f, "  Router \"{}\" [{}]", entry.router.name, entry.router.id)?;
            for port in &entry.ports {
                writeln!(f, "    Port {} [{}]", port.device_owner, port.id)?;
                for ip in &port.fixed_ips {
                    writeln!(f, "      {} ({})", ip.ip_address, ip.subnet_name)?;
                }
            }
        }

        for entry in &self.security_groups {
            writeln!(
                f,
                "  Security group \"{}\" [{}]",
                entry.group.name, entry.group.id
            )?;
            for rule in &entry.rules {
                writeln!(f, "    {}", rule.describe())?;
            }
        }

        for volume in &self.volumes {
            writeln!(
                f,
                "  Volume \"{}\" [{}] {} GB, {}",
                volume.name, volume.id, volume.size, volume.status
            )?;
        }

        for server in &self.servers {
            writeln!(
                f,
                "  Server \"{}\" [{}] {}",
                server.name, server.id, server.status
            )?;
        }

        Ok(())
    }
}

/// Builds [`ProjectReport`]s, resolving subnet and group names once each
pub struct Inspector<'a> {
    ctx: &'a Context,
    subnet_names: HashMap<String, String>,
    group_names: HashMap<String, String>,
}

impl<'a> Inspector<'a> {
    pub fn new(ctx: &'a Context) -> Self {
        Self {
            ctx,
            subnet_names: HashMap::new(),
            group_names: HashMap::new(),
        }
    }

    pub async fn show_project(mut self, name: &str) -> Result<ProjectReport> {
        let ctx = self.ctx;
        let client = ctx.client();
        let project = ctx.project_by_name(name).await?;

        let mut networks = Vec::new();
        for network in client.list_networks(&project.id).await? {
            let subnets = client.list_subnets(&network.id).await?;
            for subnet in &subnets {
                self.subnet_names
                    .insert(subnet.id.clone(), subnet.name.clone());
            }
            networks.push(NetworkReport { network, subnets });
        }

        let mut routers = Vec::new();
        for router in client.list_routers(&project.id).await? {
            let mut ports = Vec::new();
            for port in client.list_router_ports(&router.id).await? {
                let mut fixed_ips = Vec::with_capacity(port.fixed_ips.len());
                for ip in port.fixed_ips {
                    fixed_ips.push(AddressReport {
                        subnet_name: self.subnet_name(&ip.subnet_id).await,
                        ip_address: ip.ip_address,
                    });
                }
                ports.push(PortReport {
                    id: port.id,
                    device_owner: port.device_owner,
                    fixed_ips,
                });
            }
            routers.push(RouterReport { router, ports });
        }

        let groups = client.list_security_groups(&project.id).await?;
        for group in &groups {
            self.group_names.insert(group.id.clone(), group.name.clone());
        }
        let mut security_groups = Vec::new();
        for group in groups {
            let mut rules = client.list_security_group_rules(&group.id).await?;
            sort_rules(&mut rules);
            let mut reports = Vec::with_capacity(rules.len());
            for rule in rules {
                let remote_group_name = match &rule.spec.remote_group_id {
                    Some(id) => Some(self.group_name(id).await),
                    None => None,
                };
                reports.push(RuleReport {
                    rule,
                    remote_group_name,
                });
            }
            security_groups.push(SecurityGroupReport {
                group,
                rules: reports,
            });
        }

        let volumes = match client.list_volumes(&project.id).await {
            Ok(volumes) => volumes,
            Err(CloudError::ServiceUnavailable(service)) => {
                tracing::warn!("No volume endpoint ({})", service);
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        let servers = client.list_servers(&project.id).await?;

        Ok(ProjectReport {
            project,
            networks,
            routers,
            security_groups,
            volumes,
            servers,
        })
    }

    /// Subnet name for display; the id when the subnet cannot be read
    async fn subnet_name(&mut self, subnet_id: &str) -> String {
        if let Some(name) = self.subnet_names.get(subnet_id) {
            return name.clone();
        }
        let name = match self.ctx.client().get_subnet(subnet_id).await {
            Ok(subnet) => subnet.name,
            Err(e) => {
                tracing::debug!("Cannot resolve subnet {}: {}", subnet_id, e);
                subnet_id.to_string()
            }
        };
        self.subnet_names
            .insert(subnet_id.to_string(), name.clone());
        name
    }

    async fn group_name(&mut self, group_id: &str) -> String {
        if let Some(name) = self.group_names.get(group_id) {
            return name.clone();
        }
        let name = match self.ctx.client().get_security_group(group_id).await {
            Ok(group) => group.name,
            Err(e) => {
                tracing::debug!("Cannot resolve security group {}: {}", group_id, e);
                group_id.to_string()
            }
        };
        self.group_names.insert(group_id.to_string(), name.clone());
        name
    }
}
