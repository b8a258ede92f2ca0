//! Keystone v3 wire records

use serde::Deserialize;
use tenantops_cloud::{Group, Project, User};

#[derive(Debug, Deserialize)]
pub(crate) struct ProjectEnvelope {
    pub project: Project,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProjectList {
    pub projects: Vec<Project>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserEnvelope {
    pub user: UserRecord,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserList {
    pub users: Vec<UserRecord>,
}

/// Keystone omits `default_project_id` for users without one
#[derive(Debug, Deserialize)]
pub(crate) struct UserRecord {
    id: String,
    name: String,
    domain_id: String,
    #[serde(default)]
    default_project_id: Option<String>,
}

impl From<UserRecord> for User {
    fn from(r: UserRecord) -> Self {
        User {
            id: r.id,
            name: r.name,
            domain_id: r.domain_id,
            default_project_id: r.default_project_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct GroupEnvelope {
    pub group: Group,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GroupList {
    pub groups: Vec<Group>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RoleList {
    pub roles: Vec<RoleRecord>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RoleRecord {
    pub id: String,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_project_list() {
        let body = r#"{
            "links": {"self": "https://keystone.example.org/v3/projects"},
            "projects": [
                {"id": "0c4e939acacf4376bdcd1129f1a054ad", "name": "alpha", "domain_id": "default",
                 "enabled": true, "is_domain": false, "parent_id": "default", "tags": []}
            ]
        }"#;
        let list: ProjectList = serde_json::from_str(body).unwrap();
        assert_eq!(list.projects.len(), 1);
        assert_eq!(list.projects[0].name, "alpha");
        assert_eq!(list.projects[0].domain_id, "default");
    }

    #[test]
    fn test_decode_user_without_default_project() {
        let body = r#"{"user": {"id": "u1", "name": "ana", "domain_id": "default", "enabled": true}}"#;
        let envelope: UserEnvelope = serde_json::from_str(body).unwrap();
        let user: User = envelope.user.into();
        assert_eq!(user.name, "ana");
        assert_eq!(user.default_project_id, None);
    }

    #[test]
    fn test_decode_roles() {
        let body = r#"{"roles": [{"id": "r1", "name": "member", "domain_id": null}]}"#;
        let list: RoleList = serde_json::from_str(body).unwrap();
        assert_eq!(list.roles[0].id, "r1");
        assert_eq!(list.roles[0].name, "member");
    }
}
