//! OpenStack client error types

use tenantops_cloud::{CloudError, ResourceKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OpenStackError {
    #[error("Configuration error: {0}")]
    Config(#[from] tenantops_config::ConfigError),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("No {0} endpoint in the service catalog")]
    EndpointNotFound(String),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl OpenStackError {
    pub fn status(&self) -> Option<u16> {
        match self {
            OpenStackError::ApiError { status, .. } => Some(*status),
            OpenStackError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Convert for a call acting on an existing resource (404 means missing)
    pub fn for_resource(self, kind: ResourceKind, name: &str) -> CloudError {
        match self.status() {
            Some(404) => CloudError::not_found(kind, name),
            _ => self.into(),
        }
    }

    /// Convert for a create call (409 means someone else created it first)
    pub fn for_create(self, kind: ResourceKind, name: &str) -> CloudError {
        match self.status() {
            Some(409) => CloudError::already_exists(kind, name),
            _ => self.into(),
        }
    }
}

impl From<OpenStackError> for CloudError {
    fn from(e: OpenStackError) -> Self {
        match e {
            OpenStackError::Config(e) => CloudError::InvalidConfig(e.to_string()),
            OpenStackError::AuthenticationFailed(message) => {
                CloudError::AuthenticationFailed(message)
            }
            OpenStackError::EndpointNotFound(service) => CloudError::ServiceUnavailable(service),
            OpenStackError::ApiError { status, message } => CloudError::ApiError { status, message },
            OpenStackError::Http(e) => CloudError::Transport(e.to_string()),
            OpenStackError::JsonError(e) => CloudError::Json(e),
        }
    }
}

/// Attach resource context to results of REST calls
pub(crate) trait ResultExt<T> {
    fn for_resource(self, kind: ResourceKind, name: &str) -> tenantops_cloud::Result<T>;
    fn for_create(self, kind: ResourceKind, name: &str) -> tenantops_cloud::Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn for_resource(self, kind: ResourceKind, name: &str) -> tenantops_cloud::Result<T> {
        self.map_err(|e| e.for_resource(kind, name))
    }

    fn for_create(self, kind: ResourceKind, name: &str) -> tenantops_cloud::Result<T> {
        self.map_err(|e| e.for_create(kind, name))
    }
}

pub type Result<T> = std::result::Result<T, OpenStackError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16) -> OpenStackError {
        OpenStackError::ApiError {
            status,
            message: "boom".to_string(),
        }
    }

    #[test]
    fn test_status_mapping() {
        assert!(api(404).for_resource(ResourceKind::Router, "r1").is_not_found());
        assert!(api(409).for_create(ResourceKind::Network, "n1").is_already_exists());

        // A conflict on delete is not a duplicate
        let err = api(409).for_resource(ResourceKind::Network, "n1");
        assert!(matches!(err, CloudError::ApiError { status: 409, .. }));
    }

    #[test]
    fn test_missing_endpoint_is_unavailable() {
        let err: CloudError = OpenStackError::EndpointNotFound("volumev3".to_string()).into();
        assert!(err.is_service_unavailable());
    }
}
