//! Engine error types

use tenantops_cloud::{CloudError, QuotaKind, ResourceKind};
use tenantops_config::ConfigError;
use thiserror::Error;

/// Engine errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("{kind} \"{name}\" not found")]
    NotFound { kind: ResourceKind, name: String },

    #[error(
        "quota {kind} on project \"{project}\" is {current}; refusing to lower it to {requested} without force"
    )]
    RequiresForce {
        project: String,
        kind: QuotaKind,
        current: i64,
        requested: i64,
    },

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Directory lookup failed: {0}")]
    Directory(String),

    #[error("Directory group {0} does not contain any users")]
    EmptyDirectoryGroup(String),

    #[error(transparent)]
    Cloud(#[from] CloudError),
}

impl Error {
    pub fn not_found(kind: ResourceKind, name: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            name: name.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
