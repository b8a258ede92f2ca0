//! ldapsearch CLI wrapper
//!
//! Binds as the operator and reads group membership with the OpenLDAP
//! client tools. The password is written to the child's stdin so it never
//! appears in the process list.

use crate::error::{LdapError, Result};
use crate::ldif::{LdifEntry, escape_filter_value, leading_rdn_value, parse_ldif};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::process::Stdio;
use tenantops_config::require_var;
use tenantops_core::{Directory, DirectoryUser};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

const URL_VAR: &str = "TENANTOPS_LDAP_URL";
const BASE_DN_VAR: &str = "TENANTOPS_LDAP_BASE_DN";
const PEOPLE_OU_VAR: &str = "TENANTOPS_LDAP_PEOPLE_OU";
const GROUP_OU_VAR: &str = "TENANTOPS_LDAP_GROUP_OU";

/// ldapsearch exit status for an unknown search base
const NO_SUCH_OBJECT: i32 = 32;
/// ldapsearch exit status for a rejected bind
const INVALID_CREDENTIALS: i32 = 49;

const MEMBER_ATTRIBUTES: [&str; 3] = ["memberUid", "member", "uniqueMember"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LdapConfig {
    pub url: String,
    pub base_dn: String,
    pub people_ou: String,
    pub group_ou: String,
}

impl LdapConfig {
    pub fn from_env() -> Result<Self> {
        let optional = |name: &str, default: &str| {
            std::env::var(name)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Ok(Self {
            url: require_var(URL_VAR)?,
            base_dn: require_var(BASE_DN_VAR)?,
            people_ou: optional(PEOPLE_OU_VAR, "ou=people"),
            group_ou: optional(GROUP_OU_VAR, "ou=groups"),
        })
    }

    pub fn people_base(&self) -> String {
        format!("{},{}", self.people_ou, self.base_dn)
    }

    pub fn group_base(&self) -> String {
        format!("{},{}", self.group_ou, self.base_dn)
    }

    pub fn bind_dn(&self, uid: &str) -> String {
        format!("uid={},{}", uid, self.people_base())
    }
}

/// Directory backed by `ldapsearch`
pub struct LdapDirectory {
    config: LdapConfig,
    bind_dn: String,
    password: String,
}

impl LdapDirectory {
    pub fn new(config: LdapConfig, uid: &str, password: impl Into<String>) -> Self {
        let bind_dn = config.bind_dn(uid);
        Self {
            config,
            bind_dn,
            password: password.into(),
        }
    }

    /// Run one search and parse its LDIF output
    async fn search(&self, base: &str, filter: &str, attributes: &[&str]) -> Result<Vec<LdifEntry>> {
        let mut cmd = Command::new("ldapsearch");
        cmd.args(["-x", "-LLL", "-o", "ldif-wrap=no"]);
        cmd.arg("-H").arg(&self.config.url);
        cmd.arg("-D").arg(&self.bind_dn);
        cmd.args(["-y", "/dev/stdin"]);
        cmd.arg("-b").arg(base);
        cmd.arg(filter);
        cmd.args(attributes);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!(
            "Running: ldapsearch -H {} -D {} -b {} {} {}",
            self.config.url,
            self.bind_dn,
            base,
            filter,
            attributes.join(" ")
        );

        let mut child = cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => LdapError::LdapsearchNotFound,
            _ => LdapError::IoError(e),
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(self.password.as_bytes()).await?;
        }

        let output = child.wait_with_output().await?;
        match output.status.code() {
            Some(0) => {}
            Some(NO_SUCH_OBJECT) => return Ok(Vec::new()),
            Some(INVALID_CREDENTIALS) => {
                return Err(LdapError::AuthenticationFailed(self.bind_dn.clone()));
            }
            _ => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(LdapError::CommandFailed(stderr.trim().to_string()));
            }
        }

        parse_ldif(&String::from_utf8_lossy(&output.stdout))
    }

    /// uids of the members of `group_cn`
    pub async fn member_uids(&self, group_cn: &str) -> Result<BTreeSet<String>> {
        let filter = format!("(cn={})", escape_filter_value(group_cn));
        let entries = self
            .search(&self.config.group_base(), &filter, &MEMBER_ATTRIBUTES)
            .await?;
        let entry = entries
            .first()
            .ok_or_else(|| LdapError::GroupNotFound(group_cn.to_string()))?;
        Ok(member_uids(entry))
    }

    /// Display name and mail of each uid found under the people base
    async fn people(&self, uids: &BTreeSet<String>) -> Result<BTreeMap<String, DirectoryUser>> {
        let clauses: String = uids
            .iter()
            .map(|uid| format!("(uid={})", escape_filter_value(uid)))
            .collect();
        let filter = format!("(|{})", clauses);
        let entries = self
            .search(&self.config.people_base(), &filter, &["uid", "cn", "mail"])
            .await?;

        Ok(entries
            .iter()
            .filter_map(|entry| {
                let uid = entry.first("uid")?.to_string();
                let user = DirectoryUser {
                    uid: uid.clone(),
                    display_name: entry.first("cn").map(str::to_string),
                    email: entry.first("mail").map(str::to_string),
                };
                Some((uid, user))
            })
            .collect())
    }
}

/// uids named by a group entry, whatever membership attribute it uses
pub fn member_uids(entry: &LdifEntry) -> BTreeSet<String> {
    let mut uids: BTreeSet<String> = entry
        .values("memberUid")
        .iter()
        .map(|uid| uid.trim().to_string())
        .filter(|uid| !uid.is_empty())
        .collect();

    for attribute in ["member", "uniqueMember"] {
        uids.extend(
            entry
                .values(attribute)
                .iter()
                .filter_map(|dn| leading_rdn_value(dn))
                .map(str::to_string),
        );
    }
    uids
}

#[async_trait]
impl Directory for LdapDirectory {
    async fn group_members(&self, group_cn: &str) -> tenantops_core::Result<Vec<DirectoryUser>> {
        let uids = self.member_uids(group_cn).await?;
        if uids.is_empty() {
            return Ok(Vec::new());
        }

        let mut people = self.people(&uids).await?;
        let members = uids
            .into_iter()
            .map(|uid| {
                people.remove(&uid).unwrap_or_else(|| {
                    tracing::warn!("{} is a member of {} but has no people entry", uid, group_cn);
                    DirectoryUser::new(uid)
                })
            })
            .collect::<Vec<_>>();

        tracing::debug!("Directory group {} has {} members", group_cn, members.len());
        Ok(members)
    }
}
