//! Directory-driven project membership
//!
//! Mirrors a directory group onto the cloud: every member gets a platform
//! user and a personal project, and a platform group named after the
//! project holds exactly the directory members.

use crate::context::Context;
use crate::error::{Error, Result};
use crate::provision::{Provisioner, VerifyMode};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeSet;
use tenantops_cloud::{CloudError, Group, Project, ResourceKind, User};

/// A person as the directory knows them
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryUser {
    pub uid: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

impl DirectoryUser {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            display_name: None,
            email: None,
        }
    }
}

/// Source of group membership
#[async_trait]
pub trait Directory: Send + Sync {
    /// Members of the group `group_cn`; an unknown group is an error
    async fn group_members(&self, group_cn: &str) -> Result<Vec<DirectoryUser>>;
}

#[derive(Debug, Clone, Serialize)]
pub struct MembershipReport {
    pub project: Project,
    pub group: Group,
    pub users_created: Vec<String>,
    pub projects_created: Vec<String>,
    pub members_added: Vec<String>,
    pub members_removed: Vec<String>,
}

pub struct MembershipSync<'a> {
    ctx: &'a Context,
}

impl<'a> MembershipSync<'a> {
    pub fn new(ctx: &'a Context) -> Self {
        Self { ctx }
    }

    pub async fn ensure_ldap_project(
        &self,
        project_name: &str,
        group_cn: &str,
        directory: &dyn Directory,
    ) -> Result<MembershipReport> {
        let ctx = self.ctx;
        let client = ctx.client();

        let members = directory.group_members(group_cn).await?;
        if members.is_empty() {
            return Err(Error::EmptyDirectoryGroup(group_cn.to_string()));
        }
        tracing::info!(
            "Directory group {} has {} member(s)",
            group_cn,
            members.len()
        );

        let mut users_created = Vec::new();
        let mut projects_created = Vec::new();
        let mut users = Vec::with_capacity(members.len());

        for member in &members {
            let personal = Provisioner::new(ctx)
                .ensure_project(&member.uid, &ctx.domain, VerifyMode::Shallow)
                .await?;
            if personal.newly_created {
                projects_created.push(personal.project.name.clone());
            }

            let (user, created) = self.ensure_user(&member.uid, &personal.project).await?;
            if created {
                users_created.push(user.name.clone());
            }
            client
                .grant_user_role(&personal.project.id, &user.id, &ctx.member_role)
                .await?;
            users.push(user);
        }

        let group = self.ensure_group(project_name).await?;
        let (members_added, members_removed) = self.sync_members(&group, &users).await?;

        let ensured = Provisioner::new(ctx)
            .ensure_project(project_name, &ctx.domain, VerifyMode::Shallow)
            .await?;
        if ensured.newly_created {
            projects_created.push(ensured.project.name.clone());
        }
        client
            .grant_group_role(&ensured.project.id, &group.id, &ctx.member_role)
            .await?;
        tracing::info!(
            "Granted {} on project \"{}\" to group \"{}\"",
            ctx.member_role,
            ensured.project.name,
            group.name
        );

        Ok(MembershipReport {
            project: ensured.project,
            group,
            users_created,
            projects_created,
            members_added,
            members_removed,
        })
    }

    async fn ensure_user(&self, name: &str, personal: &Project) -> Result<(User, bool)> {
        let client = self.ctx.client();
        let domain = self.ctx.domain.as_str();

        if let Some(user) = client.find_user(name, domain).await? {
            return Ok((user, false));
        }
        match client.create_user(name, domain, Some(&personal.id)).await {
            Ok(user) => {
                tracing::info!("Created user \"{}\" [{}]", user.name, user.id);
                Ok((user, true))
            }
            Err(CloudError::AlreadyExists { .. }) => {
                let user = client
                    .find_user(name, domain)
                    .await?
                    .ok_or_else(|| Error::not_found(ResourceKind::User, name))?;
                Ok((user, false))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn ensure_group(&self, name: &str) -> Result<Group> {
        let client = self.ctx.client();
        let domain = self.ctx.domain.as_str();

        if let Some(group) = client.find_group(name, domain).await? {
            return Ok(group);
        }
        match client.create_group(name, domain).await {
            Ok(group) => {
                tracing::info!("Created group \"{}\" [{}]", group.name, group.id);
                Ok(group)
            }
            Err(CloudError::AlreadyExists { .. }) => client
                .find_group(name, domain)
                .await?
                .ok_or_else(|| Error::not_found(ResourceKind::Group, name)),
            Err(e) => Err(e.into()),
        }
    }

    /// Make the group hold exactly `users`; returns (added, removed) names
    async fn sync_members(&self, group: &Group, users: &[User]) -> Result<(Vec<String>, Vec<String>)> {
        let client = self.ctx.client();
        let current = client.list_group_users(&group.id).await?;
        let current_ids: BTreeSet<&str> = current.iter().map(|u| u.id.as_str()).collect();
        let wanted_ids: BTreeSet<&str> = users.iter().map(|u| u.id.as_str()).collect();

        let mut added = Vec::new();
        for user in users {
            if !current_ids.contains(user.id.as_str()) {
                client.add_user_to_group(&group.id, &user.id).await?;
                tracing::info!("Added \"{}\" to group \"{}\"", user.name, group.name);
                added.push(user.name.clone());
            }
        }

        let mut removed = Vec::new();
        for user in &current {
            if !wanted_ids.contains(user.id.as_str()) {
                client.remove_user_from_group(&group.id, &user.id).await?;
                tracing::info!("Removed \"{}\" from group \"{}\"", user.name, group.name);
                removed.push(user.name.clone());
            }
        }

        Ok((added, removed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tenantops_cloud::{CloudClient, MemoryCloud};

    struct StaticDirectory(Vec<DirectoryUser>);

    #[async_trait]
    impl Directory for StaticDirectory {
        async fn group_members(&self, _group_cn: &str) -> Result<Vec<DirectoryUser>> {
            Ok(self.0.clone())
        }
    }

    fn directory(uids: &[&str]) -> StaticDirectory {
        StaticDirectory(uids.iter().map(|uid| DirectoryUser::new(*uid)).collect())
    }

    #[tokio::test]
    async fn test_sync_creates_users_projects_and_group() {
        let cloud = Arc::new(MemoryCloud::new());
        let ctx = Context::new(cloud.clone());

        let report = MembershipSync::new(&ctx)
            .ensure_ldap_project("lab", "lab", &directory(&["ana", "bo"]))
            .await
            .unwrap();

        assert_eq!(report.users_created, vec!["ana", "bo"]);
        assert_eq!(report.projects_created, vec!["ana", "bo", "lab"]);
        assert_eq!(report.members_added, vec!["ana", "bo"]);
        assert!(report.members_removed.is_empty());

        let users = cloud.users();
        let ana = users.iter().find(|u| u.name == "ana").unwrap();
        let personal = cloud.find_project("ana", "default").await.unwrap().unwrap();
        assert_eq!(ana.default_project_id.as_deref(), Some(personal.id.as_str()));

        let grants = cloud.grants();
        assert!(grants.contains(&(personal.id.clone(), ana.id.clone(), "member".to_string())));
        assert!(grants.contains(&(
            report.project.id.clone(),
            report.group.id.clone(),
            "member".to_string()
        )));
    }

    #[tokio::test]
    async fn test_sync_removes_departed_members() {
        let cloud = Arc::new(MemoryCloud::new());
        let ctx = Context::new(cloud.clone());
        let sync = MembershipSync::new(&ctx);
        sync.ensure_ldap_project("lab", "lab", &directory(&["ana", "bo"]))
            .await
            .unwrap();

        let report = sync
            .ensure_ldap_project("lab", "lab", &directory(&["bo", "cy"]))
            .await
            .unwrap();

        assert_eq!(report.users_created, vec!["cy"]);
        assert_eq!(report.members_added, vec!["cy"]);
        assert_eq!(report.members_removed, vec!["ana"]);

        let members: Vec<String> = cloud
            .list_group_users(&report.group.id)
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.name)
            .collect();
        assert_eq!(members.len(), 2);
        assert!(members.contains(&"bo".to_string()));
        assert!(members.contains(&"cy".to_string()));
    }

    #[tokio::test]
    async fn test_empty_group_is_an_error() {
        let cloud = Arc::new(MemoryCloud::new());
        let ctx = Context::new(cloud.clone());

        let err = MembershipSync::new(&ctx)
            .ensure_ldap_project("lab", "lab", &directory(&[]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmptyDirectoryGroup(cn) if cn == "lab"));
        assert!(cloud.journal().is_empty());
    }
}
