//! Per-project usage statistics

use crate::context::Context;
use crate::error::Result;
use serde::Serialize;
use tenantops_cloud::{CloudError, Project, Server, Volume};

/// Column names of the CSV export, in record order
pub const CSV_HEADER: [&str; 8] = [
    "project_id",
    "project_name",
    "count_servers",
    "count_servers_on",
    "count_volumes",
    "size_volumes",
    "count_volumes_inuse",
    "size_volumes_inuse",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProjectStats {
    pub count_servers: u64,
    pub count_servers_on: u64,
    pub count_volumes: u64,
    /// GB
    pub size_volumes: u64,
    pub count_volumes_inuse: u64,
    pub size_volumes_inuse: u64,
}

impl ProjectStats {
    pub fn from_resources(servers: &[Server], volumes: &[Volume]) -> Self {
        let mut stats = servers.iter().fold(Self::default(), |mut acc, server| {
            acc.count_servers += 1;
            if server.is_powered_on() {
                acc.count_servers_on += 1;
            }
            acc
        });

        for volume in volumes {
            stats.count_volumes += 1;
            stats.size_volumes += volume.size;
            if volume.is_in_use() {
                stats.count_volumes_inuse += 1;
                stats.size_volumes_inuse += volume.size;
            }
        }
        stats
    }

    /// Values in CSV column order, project columns included
    pub fn to_record(&self, project: &Project) -> Vec<String> {
        vec![
            project.id.clone(),
            project.name.clone(),
            self.count_servers.to_string(),
            self.count_servers_on.to_string(),
            self.count_volumes.to_string(),
            self.size_volumes.to_string(),
            self.count_volumes_inuse.to_string(),
            self.size_volumes_inuse.to_string(),
        ]
    }
}

/// Collect statistics for one project; no volume service means no volumes
pub async fn get_stats(ctx: &Context, project: &Project) -> Result<ProjectStats> {
    let client = ctx.client();
    let servers = client.list_servers(&project.id).await?;
    let volumes = match client.list_volumes(&project.id).await {
        Ok(volumes) => volumes,
        Err(CloudError::ServiceUnavailable(service)) => {
            tracing::warn!("No volume endpoint ({})", service);
            Vec::new()
        }
        Err(e) => return Err(e.into()),
    };
    Ok(ProjectStats::from_resources(&servers, &volumes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tenantops_cloud::{CloudClient, MemoryCloud};

    #[tokio::test]
    async fn test_stats_fold() {
        let cloud = Arc::new(MemoryCloud::new());
        let ctx = Context::new(cloud.clone());
        let project = cloud.create_project("alpha", "default").await.unwrap();
        for (name, power_state) in [("a", 1), ("b", 0), ("c", 1)] {
            cloud.add_server(&project.id, name, power_state);
        }
        cloud.add_volume(&project.id, "data", 10, "in-use");
        cloud.add_volume(&project.id, "spare", 5, "available");

        let stats = get_stats(&ctx, &project).await.unwrap();

        assert_eq!(
            stats,
            ProjectStats {
                count_servers: 3,
                count_servers_on: 2,
                count_volumes: 2,
                size_volumes: 15,
                count_volumes_inuse: 1,
                size_volumes_inuse: 10,
            }
        );
        assert_eq!(
            stats.to_record(&project)[2..],
            ["3", "2", "2", "15", "1", "10"]
        );
    }

    #[tokio::test]
    async fn test_stats_without_volume_service() {
        let cloud = Arc::new(MemoryCloud::new().without_volume_service());
        let ctx = Context::new(cloud.clone());
        let project = cloud.create_project("alpha", "default").await.unwrap();
        cloud.add_server(&project.id, "a", 4);

        let stats = get_stats(&ctx, &project).await.unwrap();
        assert_eq!(stats.count_servers_on, 1);
        assert_eq!(stats.count_volumes, 0);
        assert_eq!(stats.size_volumes, 0);
    }

    #[test]
    fn test_empty_project() {
        assert_eq!(ProjectStats::from_resources(&[], &[]), ProjectStats::default());
    }
}
