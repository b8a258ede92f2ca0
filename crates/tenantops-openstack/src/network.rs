//! Neutron v2.0 wire records

use serde::{Deserialize, Serialize};
use tenantops_cloud::{
    Direction, FixedIp, Network, Port, Router, RuleSpec, SecurityGroup, SecurityGroupRule, Subnet,
};

#[derive(Debug, Deserialize)]
pub(crate) struct NetworkRecord {
    id: String,
    name: String,
    #[serde(default)]
    project_id: String,
    #[serde(rename = "router:external", default)]
    external: bool,
}

impl From<NetworkRecord> for Network {
    fn from(r: NetworkRecord) -> Self {
        Network {
            id: r.id,
            name: r.name,
            project_id: r.project_id,
            external: r.external,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct NetworkEnvelope {
    pub network: NetworkRecord,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NetworkList {
    pub networks: Vec<NetworkRecord>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubnetEnvelope {
    pub subnet: Subnet,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubnetList {
    pub subnets: Vec<Subnet>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RouterRecord {
    id: String,
    name: String,
    #[serde(default)]
    project_id: String,
    #[serde(default)]
    external_gateway_info: Option<GatewayInfo>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GatewayInfo {
    pub network_id: String,
}

impl From<RouterRecord> for Router {
    fn from(r: RouterRecord) -> Self {
        Router {
            id: r.id,
            name: r.name,
            project_id: r.project_id,
            external_network_id: r.external_gateway_info.map(|g| g.network_id),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RouterEnvelope {
    pub router: RouterRecord,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RouterList {
    pub routers: Vec<RouterRecord>,
}

/// Response of `add_router_interface`
#[derive(Debug, Deserialize)]
pub(crate) struct InterfaceInfo {
    pub port_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PortRecord {
    id: String,
    #[serde(default)]
    device_id: String,
    #[serde(default)]
    device_owner: String,
    #[serde(default)]
    fixed_ips: Vec<FixedIp>,
}

impl From<PortRecord> for Port {
    fn from(r: PortRecord) -> Self {
        Port {
            id: r.id,
            device_id: r.device_id,
            device_owner: r.device_owner,
            fixed_ips: r.fixed_ips,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct PortEnvelope {
    pub port: PortRecord,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PortList {
    pub ports: Vec<PortRecord>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SecurityGroupRecord {
    id: String,
    name: String,
    #[serde(default)]
    project_id: String,
}

impl From<SecurityGroupRecord> for SecurityGroup {
    fn from(r: SecurityGroupRecord) -> Self {
        SecurityGroup {
            id: r.id,
            name: r.name,
            project_id: r.project_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SecurityGroupEnvelope {
    pub security_group: SecurityGroupRecord,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SecurityGroupList {
    pub security_groups: Vec<SecurityGroupRecord>,
}

/// Neutron spells the ether type `ethertype`
#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct RuleRecord {
    #[serde(skip_serializing)]
    #[serde(default)]
    id: String,
    security_group_id: String,
    direction: Direction,
    ethertype: String,
    protocol: Option<String>,
    remote_group_id: Option<String>,
    remote_ip_prefix: Option<String>,
    port_range_min: Option<u16>,
    port_range_max: Option<u16>,
}

impl RuleRecord {
    pub fn new(security_group_id: &str, spec: &RuleSpec) -> Self {
        Self {
            id: String::new(),
            security_group_id: security_group_id.to_string(),
            direction: spec.direction,
            ethertype: spec.ether_type.clone(),
            protocol: spec.protocol.clone(),
            remote_group_id: spec.remote_group_id.clone(),
            remote_ip_prefix: spec.remote_ip_prefix.clone(),
            port_range_min: spec.port_range_min,
            port_range_max: spec.port_range_max,
        }
    }
}

impl From<RuleRecord> for SecurityGroupRule {
    fn from(r: RuleRecord) -> Self {
        SecurityGroupRule {
            id: r.id,
            security_group_id: r.security_group_id,
            spec: RuleSpec {
                direction: r.direction,
                ether_type: r.ethertype,
                protocol: r.protocol,
                remote_group_id: r.remote_group_id,
                remote_ip_prefix: r.remote_ip_prefix,
                port_range_min: r.port_range_min,
                port_range_max: r.port_range_max,
            },
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct RuleEnvelope {
    pub security_group_rule: RuleRecord,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RuleList {
    pub security_group_rules: Vec<RuleRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_external_network() {
        let body = r#"{"networks": [
            {"id": "ext-1", "name": "public", "project_id": "admin", "router:external": true,
             "status": "ACTIVE", "subnets": ["s-ext"], "shared": false},
            {"id": "net-1", "name": "network1", "project_id": "p1", "status": "ACTIVE"}
        ]}"#;
        let list: NetworkList = serde_json::from_str(body).unwrap();
        let networks: Vec<Network> = list.networks.into_iter().map(Network::from).collect();
        assert!(networks[0].external);
        assert!(!networks[1].external);
    }

    #[test]
    fn test_decode_router_gateway() {
        let body = r#"{"router": {"id": "r1", "name": "router0", "project_id": "p1",
            "status": "ACTIVE", "admin_state_up": true,
            "external_gateway_info": {"network_id": "ext-1", "enable_snat": true,
                "external_fixed_ips": [{"subnet_id": "s-ext", "ip_address": "203.0.113.10"}]}}}"#;
        let envelope: RouterEnvelope = serde_json::from_str(body).unwrap();
        let router: Router = envelope.router.into();
        assert_eq!(router.external_network_id.as_deref(), Some("ext-1"));

        let body = r#"{"router": {"id": "r2", "name": "router0", "project_id": "p1",
            "external_gateway_info": null}}"#;
        let envelope: RouterEnvelope = serde_json::from_str(body).unwrap();
        let router: Router = envelope.router.into();
        assert_eq!(router.external_network_id, None);
    }

    #[test]
    fn test_decode_router_ports() {
        let body = r#"{"ports": [{"id": "port-1", "device_id": "r1",
            "device_owner": "network:router_interface", "network_id": "net-1",
            "fixed_ips": [{"subnet_id": "s1", "ip_address": "192.168.0.1"}]}]}"#;
        let list: PortList = serde_json::from_str(body).unwrap();
        let port: Port = list.ports.into_iter().next().unwrap().into();
        assert_eq!(port.device_owner, "network:router_interface");
        assert_eq!(port.fixed_ips[0].ip_address, "192.168.0.1");
    }

    #[test]
    fn test_rule_wire_format() {
        let body = r#"{"security_group_rules": [{"id": "rule-1", "security_group_id": "sg1",
            "direction": "ingress", "ethertype": "IPv4", "protocol": "tcp",
            "remote_group_id": null, "remote_ip_prefix": "0.0.0.0/0",
            "port_range_min": 22, "port_range_max": 22, "description": ""}]}"#;
        let list: RuleList = serde_json::from_str(body).unwrap();
        let rule: SecurityGroupRule = list.security_group_rules.into_iter().next().unwrap().into();
        assert_eq!(rule.spec.direction, Direction::Ingress);
        assert_eq!(rule.spec.ether_type, "IPv4");
        assert_eq!(rule.spec.port_range_min, Some(22));

        let request = RuleEnvelope {
            security_group_rule: RuleRecord::new("sg1", &RuleSpec::external_access()),
        };
        let json = serde_json::to_value(&request).unwrap();
        let rule = &json["security_group_rule"];
        assert_eq!(rule["ethertype"], "IPv4");
        assert_eq!(rule["direction"], "ingress");
        assert_eq!(rule["remote_ip_prefix"], "0.0.0.0/0");
        assert!(rule["protocol"].is_null());
        assert!(rule.get("id").is_none());
    }
}
