//! Directory lookup error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LdapError {
    #[error("ldapsearch not found. Please install the OpenLDAP client tools")]
    LdapsearchNotFound,

    #[error("LDAP bind as {0} failed: invalid credentials")]
    AuthenticationFailed(String),

    #[error("ldapsearch failed: {0}")]
    CommandFailed(String),

    #[error("Directory group {0} not found")]
    GroupNotFound(String),

    #[error("Malformed LDIF: {0}")]
    InvalidLdif(String),

    #[error("Configuration error: {0}")]
    Config(#[from] tenantops_config::ConfigError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<LdapError> for tenantops_core::Error {
    fn from(e: LdapError) -> Self {
        match e {
            LdapError::Config(e) => tenantops_core::Error::Config(e),
            other => tenantops_core::Error::Directory(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, LdapError>;
