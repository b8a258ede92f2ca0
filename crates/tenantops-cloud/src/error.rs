//! Cloud client error types

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Kind of remote resource, used to label errors and journal entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Project,
    Network,
    Subnet,
    Router,
    Port,
    SecurityGroup,
    SecurityGroupRule,
    Server,
    Volume,
    QuotaSet,
    User,
    Group,
    Role,
    Domain,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Project => "project",
            ResourceKind::Network => "network",
            ResourceKind::Subnet => "subnet",
            ResourceKind::Router => "router",
            ResourceKind::Port => "port",
            ResourceKind::SecurityGroup => "security group",
            ResourceKind::SecurityGroupRule => "security group rule",
            ResourceKind::Server => "server",
            ResourceKind::Volume => "volume",
            ResourceKind::QuotaSet => "quota set",
            ResourceKind::User => "user",
            ResourceKind::Group => "group",
            ResourceKind::Role => "role",
            ResourceKind::Domain => "domain",
        };
        f.write_str(name)
    }
}

/// Cloud client errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("{kind} not found: {name}")]
    NotFound { kind: ResourceKind, name: String },

    #[error("{kind} already exists: {name}")]
    AlreadyExists { kind: ResourceKind, name: String },

    #[error("{kind} name is ambiguous: {name} matches {count} resources")]
    Ambiguous {
        kind: ResourceKind,
        name: String,
        count: usize,
    },

    #[error("Service not available in this deployment: {0}")]
    ServiceUnavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    pub fn not_found(kind: ResourceKind, name: impl Into<String>) -> Self {
        CloudError::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn already_exists(kind: ResourceKind, name: impl Into<String>) -> Self {
        CloudError::AlreadyExists {
            kind,
            name: name.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, CloudError::AlreadyExists { .. })
    }

    pub fn is_service_unavailable(&self) -> bool {
        matches!(self, CloudError::ServiceUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_resource() {
        let err = CloudError::not_found(ResourceKind::SecurityGroup, "default");
        assert_eq!(err.to_string(), "security group not found: default");
        assert!(err.is_not_found());
        assert!(!err.is_already_exists());

        let err = CloudError::already_exists(ResourceKind::Network, "network1");
        assert!(err.is_already_exists());
    }

    #[test]
    fn test_service_unavailable() {
        let err = CloudError::ServiceUnavailable("volumev3".to_string());
        assert!(err.is_service_unavailable());
        assert!(err.to_string().contains("volumev3"));
    }
}
