//! Cinder wire records

use serde::Deserialize;
use tenantops_cloud::Volume;

/// Unnamed volumes come back with `"name": null`
#[derive(Debug, Deserialize)]
pub(crate) struct VolumeRecord {
    id: String,
    #[serde(default)]
    name: Option<String>,
    status: String,
    size: u64,
}

impl From<VolumeRecord> for Volume {
    fn from(r: VolumeRecord) -> Self {
        Volume {
            id: r.id,
            name: r.name.unwrap_or_default(),
            status: r.status,
            size: r.size,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct VolumeList {
    pub volumes: Vec<VolumeRecord>,
}
