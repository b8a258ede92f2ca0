//! tenantops engine
//!
//! Everything here talks to the cloud through a [`Context`], which carries
//! the [`CloudClient`](tenantops_cloud::CloudClient) handle and the
//! per-invocation settings.
//!
//! - [`quota`]: decide and apply quota changes, refusing to lower without force
//! - [`provision`]: find-or-create a project and its standard topology
//! - [`decommission`]: delete a project and everything it owns
//! - [`inspect`] and [`stats`]: read-only reports
//! - [`membership`]: mirror a directory group onto a project

pub mod context;
pub mod decommission;
pub mod error;
pub mod inspect;
pub mod membership;
pub mod plan;
pub mod provision;
pub mod quota;
pub mod stats;

pub use context::Context;
pub use decommission::{DecommissionReport, Decommissioner};
pub use error::{Error, Result};
pub use inspect::{Inspector, ProjectReport, compare_rules, sort_rules};
pub use membership::{Directory, DirectoryUser, MembershipReport, MembershipSync};
pub use plan::{BatchReport, DefaultsReport, PlanSummary, PlannedQuota, QuotaPlan, TargetResult};
pub use provision::{CreatedResource, EnsuredProject, Provisioner, Topology, VerifyMode};
pub use quota::{
    MAX_QUOTA_VALUE, QuotaAction, QuotaChange, QuotaDefaults, QuotaOutcome, QuotaReconciler,
    QuotaRequest, QuotaTarget, UNLIMITED, reconcile,
};
pub use stats::{CSV_HEADER, ProjectStats, get_stats};
