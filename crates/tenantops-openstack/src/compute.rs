//! Nova wire records: servers and quota sets

use serde::Deserialize;
use std::collections::BTreeMap;
use tenantops_cloud::{QuotaKind, QuotaSet, Server};

#[derive(Debug, Deserialize)]
pub(crate) struct ServerRecord {
    id: String,
    name: String,
    status: String,
    /// Only present for admin callers; absent counts as powered off
    #[serde(rename = "OS-EXT-STS:power_state", default)]
    power_state: Option<i32>,
}

impl From<ServerRecord> for Server {
    fn from(r: ServerRecord) -> Self {
        Server {
            id: r.id,
            name: r.name,
            status: r.status,
            power_state: r.power_state.unwrap_or(0),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServerList {
    pub servers: Vec<ServerRecord>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuotaEnvelope {
    pub quota_set: BTreeMap<String, serde_json::Value>,
}

impl From<QuotaEnvelope> for QuotaSet {
    fn from(envelope: QuotaEnvelope) -> Self {
        QuotaSet {
            values: envelope.quota_set,
        }
    }
}

pub(crate) fn quota_update_body(kind: QuotaKind, value: i64) -> serde_json::Value {
    let mut quota_set = serde_json::Map::new();
    quota_set.insert(kind.as_str().to_string(), serde_json::json!(value));
    serde_json::json!({ "quota_set": quota_set })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_servers() {
        let body = r#"{"servers": [
            {"id": "s1", "name": "vm1", "status": "ACTIVE", "OS-EXT-STS:power_state": 1,
             "tenant_id": "p1", "flavor": {"original_name": "m1.small"}},
            {"id": "s2", "name": "vm2", "status": "SHUTOFF", "OS-EXT-STS:power_state": 4},
            {"id": "s3", "name": "vm3", "status": "BUILD"}
        ]}"#;
        let list: ServerList = serde_json::from_str(body).unwrap();
        let servers: Vec<Server> = list.servers.into_iter().map(Server::from).collect();
        assert!(servers[0].is_powered_on());
        assert_eq!(servers[1].power_state, 4);
        assert_eq!(servers[2].power_state, 0);
    }

    #[test]
    fn test_decode_quota_set_keeps_extra_keys() {
        let body = r#"{"quota_set": {"id": "p1", "instances": 10, "cores": 20, "ram": 51200,
            "key_pairs": 100, "server_groups": 10}}"#;
        let envelope: QuotaEnvelope = serde_json::from_str(body).unwrap();
        let quota: QuotaSet = envelope.into();
        assert_eq!(quota.get(QuotaKind::Ram), Some(51200));
        assert_eq!(quota.values["id"], "p1");
    }

    #[test]
    fn test_quota_update_body() {
        let body = quota_update_body(QuotaKind::Cores, -1);
        assert_eq!(body, serde_json::json!({"quota_set": {"cores": -1}}));
    }
}
