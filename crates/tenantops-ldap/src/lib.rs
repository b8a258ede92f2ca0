//! LDAP directory for tenantops
//!
//! Resolves directory groups to their members for `project ensure-ldap`.
//!
//! # Requirements
//!
//! - `ldapsearch` (OpenLDAP client tools) on `PATH`
//! - `TENANTOPS_LDAP_URL`, `TENANTOPS_LDAP_BASE_DN`
//! - Optional: `TENANTOPS_LDAP_PEOPLE_OU` (`ou=people`),
//!   `TENANTOPS_LDAP_GROUP_OU` (`ou=groups`)

pub mod directory;
pub mod error;
pub mod ldif;

pub use directory::{LdapConfig, LdapDirectory};
pub use error::{LdapError, Result};
