//! OpenStack client for tenantops
//!
//! Implements [`CloudClient`](tenantops_cloud::CloudClient) over the
//! Keystone v3, Neutron v2.0, Nova and Cinder v3 REST APIs.
//!
//! # Requirements
//!
//! - `OS_AUTH_URL`, `OS_USERNAME`, `OS_PASSWORD`, `OS_PROJECT_NAME`
//! - Optional: `OS_USER_DOMAIN_NAME`, `OS_PROJECT_DOMAIN_NAME`,
//!   `OS_REGION_NAME`, `OS_INTERFACE`
//!
//! # Example
//!
//! ```ignore
//! use tenantops_openstack::{AuthConfig, OpenStackCloud};
//! use tenantops_config::Settings;
//!
//! let auth = AuthConfig::from_env()?;
//! let cloud = OpenStackCloud::connect(&auth, &Settings::from_env()?).await?;
//! ```

mod block_storage;
mod compute;
pub mod error;
mod identity;
mod network;
pub mod provider;
pub mod session;

pub use error::{OpenStackError, Result};
pub use provider::OpenStackCloud;
pub use session::{AuthConfig, Session};
