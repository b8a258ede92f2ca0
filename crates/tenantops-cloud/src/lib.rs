//! tenantops cloud client abstraction
//!
//! This crate defines the boundary between the tenant administration engine
//! and the cloud control plane: typed resource records, the
//! [`CloudClient`] trait, and the error type every client reports.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  tenantops CLI                   │
//! │          (project ensure/delete/quota)           │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                tenantops-core                    │
//! │  provisioner · reconciler · decommissioner       │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │               tenantops-cloud                    │
//! │  trait CloudClient { ... }   typed records       │
//! └───────┬─────────────────┬───────────────────────┘
//!         │                 │
//! ┌───────▼───────┐ ┌───────▼───────┐
//! │   openstack   │ │    memory     │
//! │  (REST API)   │ │   (tests)     │
//! └───────────────┘ └───────────────┘
//! ```

pub mod client;
pub mod error;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod model;

// Re-exports
pub use client::CloudClient;
pub use error::{CloudError, ResourceKind, Result};
#[cfg(any(test, feature = "testing"))]
pub use memory::MemoryCloud;
pub use model::{
    Direction, FixedIp, Group, Network, Port, Project, QuotaKind, QuotaSet, Router, RuleSpec,
    SecurityGroup, SecurityGroupRule, Server, Subnet, UnknownQuotaKind, User, Volume,
};
