//! Quota reconciliation
//!
//! Raising a quota or making it unlimited is always applied. Lowering one
//! could strand running workloads, so it is refused unless forced.

use crate::context::Context;
use crate::error::{Error, Result};
use crate::plan::{BatchReport, DefaultsReport, QuotaPlan};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tenantops_cloud::{Project, QuotaKind, QuotaSet, ResourceKind};

/// Sentinel value meaning "no limit"
pub const UNLIMITED: i64 = -1;

/// Largest value accepted as a quota target
pub const MAX_QUOTA_VALUE: i64 = 1_000_000;

/// What to do with one quota kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "value", rename_all = "snake_case")]
pub enum QuotaAction {
    NoOp,
    Apply(i64),
    /// Lowering without force
    Refuse,
}

/// Decide how to move a quota from `current` to `requested`
pub fn reconcile(current: i64, requested: i64, force: bool) -> QuotaAction {
    if requested == current {
        QuotaAction::NoOp
    } else if requested == UNLIMITED || requested > current || force {
        QuotaAction::Apply(requested)
    } else {
        QuotaAction::Refuse
    }
}

pub fn parse_quota_kind(name: &str) -> Result<QuotaKind> {
    name.trim()
        .parse::<QuotaKind>()
        .map_err(|e| Error::Validation(e.to_string()))
}

pub fn parse_quota_value(kind: QuotaKind, raw: &str) -> Result<i64> {
    let value = raw.trim().parse::<i64>().map_err(|_| {
        Error::Validation(format!(
            "quota value \"{}\" for {} is not an integer",
            raw, kind
        ))
    })?;
    validate_quota_value(kind, value)
}

pub fn validate_quota_value(kind: QuotaKind, value: i64) -> Result<i64> {
    if value < UNLIMITED {
        return Err(Error::Validation(format!(
            "quota value {} for {} must be -1 (unlimited) or a non-negative integer",
            value, kind
        )));
    }
    if value > MAX_QUOTA_VALUE {
        return Err(Error::Validation(format!(
            "a setting of {} for {} seems unreasonable (maximum {})",
            value, kind, MAX_QUOTA_VALUE
        )));
    }
    Ok(value)
}

/// A validated single-quota change request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaRequest {
    pub kind: QuotaKind,
    pub value: i64,
}

impl QuotaRequest {
    pub fn parse(name: &str, value: &str) -> Result<Self> {
        let kind = parse_quota_kind(name)?;
        let value = parse_quota_value(kind, value)?;
        Ok(Self { kind, value })
    }
}

/// Default quota limits, validated
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuotaDefaults {
    limits: BTreeMap<QuotaKind, i64>,
}

impl QuotaDefaults {
    /// Validate raw `name -> value` pairs; every bad entry is reported at once
    pub fn from_raw(raw: &BTreeMap<String, String>) -> Result<Self> {
        let mut limits = BTreeMap::new();
        let mut problems = Vec::new();

        for (name, value) in raw {
            let parsed = parse_quota_kind(name)
                .and_then(|kind| parse_quota_value(kind, value).map(|value| (kind, value)));
            match parsed {
                Ok((kind, value)) => {
                    limits.insert(kind, value);
                }
                Err(Error::Validation(message)) => problems.push(message),
                Err(other) => return Err(other),
            }
        }

        if !problems.is_empty() {
            return Err(Error::Validation(problems.join("; ")));
        }
        Ok(Self { limits })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = tenantops_config::load_defaults_file(path)?;
        Self::from_raw(&raw)
    }

    /// Find the defaults file in the standard locations and load it
    pub fn discover() -> Result<(PathBuf, Self)> {
        let path = tenantops_config::find_defaults_file()?;
        let defaults = Self::load(&path)?;
        Ok((path, defaults))
    }

    pub fn iter(&self) -> impl Iterator<Item = (QuotaKind, i64)> + '_ {
        self.limits.iter().map(|(kind, value)| (*kind, *value))
    }

    pub fn get(&self, kind: QuotaKind) -> Option<i64> {
        self.limits.get(&kind).copied()
    }

    pub fn len(&self) -> usize {
        self.limits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limits.is_empty()
    }
}

impl FromIterator<(QuotaKind, i64)> for QuotaDefaults {
    fn from_iter<I: IntoIterator<Item = (QuotaKind, i64)>>(iter: I) -> Self {
        Self {
            limits: iter.into_iter().collect(),
        }
    }
}

/// What happened to one quota kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum QuotaOutcome {
    Unchanged { value: i64 },
    Applied { from: i64, to: i64 },
    Refused { current: i64, requested: i64 },
    /// The quota service does not offer this kind
    Unavailable,
}

impl QuotaOutcome {
    /// Turn a refusal into [`Error::RequiresForce`]
    pub fn require_not_refused(self, project: &str, kind: QuotaKind) -> Result<Self> {
        match self {
            QuotaOutcome::Refused { current, requested } => Err(Error::RequiresForce {
                project: project.to_string(),
                kind,
                current,
                requested,
            }),
            other => Ok(other),
        }
    }
}

impl std::fmt::Display for QuotaOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuotaOutcome::Unchanged { value } => write!(f, "already {}", value),
            QuotaOutcome::Applied { from, to } => write!(f, "{} -> {}", from, to),
            QuotaOutcome::Refused { current, requested } => write!(
                f,
                "kept {} (lowering to {} requires force)",
                current, requested
            ),
            QuotaOutcome::Unavailable => write!(f, "not offered by the quota service"),
        }
    }
}

/// Result of a single-quota change
#[derive(Debug, Clone)]
pub struct QuotaChange {
    pub kind: QuotaKind,
    pub outcome: QuotaOutcome,
    /// Quota set after the change (or as found, when nothing was sent)
    pub quota_set: QuotaSet,
}

/// What a batch run applies to every project
#[derive(Debug, Clone)]
pub enum QuotaTarget {
    Single(QuotaRequest),
    Defaults(QuotaDefaults),
}

/// Applies quota changes through the quota service
pub struct QuotaReconciler<'a> {
    ctx: &'a Context,
}

impl<'a> QuotaReconciler<'a> {
    pub fn new(ctx: &'a Context) -> Self {
        Self { ctx }
    }

    pub async fn get_quota(&self, project: &Project) -> Result<QuotaSet> {
        Ok(self.ctx.client().get_quota_set(&project.id).await?)
    }

    /// Apply one quota to one project
    ///
    /// A refusal is returned as [`QuotaOutcome::Refused`], not as an error;
    /// callers decide whether it is fatal.
    pub async fn apply(
        &self,
        project: &Project,
        request: QuotaRequest,
        force: bool,
    ) -> Result<QuotaChange> {
        let QuotaRequest { kind, value } = request;
        let quota_set = self.get_quota(project).await?;
        let current = quota_set.get(kind).ok_or_else(|| {
            Error::not_found(
                ResourceKind::QuotaSet,
                format!("{} on project {}", kind, project.name),
            )
        })?;

        match reconcile(current, value, force) {
            QuotaAction::NoOp => {
                tracing::debug!(
                    "Quota {} already set to {} on project \"{}\"",
                    kind,
                    value,
                    project.name
                );
                Ok(QuotaChange {
                    kind,
                    outcome: QuotaOutcome::Unchanged { value },
                    quota_set,
                })
            }
            QuotaAction::Apply(new_value) => {
                tracing::info!(
                    "Changing quota {} from {} to {} on project \"{}\"",
                    kind,
                    current,
                    new_value,
                    project.name
                );
                let quota_set = self
                    .ctx
                    .client()
                    .update_quota(&project.id, kind, new_value)
                    .await?;
                Ok(QuotaChange {
                    kind,
                    outcome: QuotaOutcome::Applied {
                        from: current,
                        to: new_value,
                    },
                    quota_set,
                })
            }
            QuotaAction::Refuse => {
                tracing::warn!(
                    "Existing quota {} ({}) on project \"{}\" is larger than {}; doing nothing",
                    kind,
                    current,
                    project.name,
                    value
                );
                Ok(QuotaChange {
                    kind,
                    outcome: QuotaOutcome::Refused {
                        current,
                        requested: value,
                    },
                    quota_set,
                })
            }
        }
    }

    /// Apply every default to one project
    ///
    /// Refused and unavailable kinds are skipped with a warning; the other
    /// kinds are still applied.
    pub async fn apply_defaults(
        &self,
        project: &Project,
        defaults: &QuotaDefaults,
        force: bool,
    ) -> Result<DefaultsReport> {
        let current = self.get_quota(project).await?;
        let plan = QuotaPlan::build(&project.name, &current, defaults, force);
        if plan.has_changes {
            tracing::debug!("Quota plan for \"{}\": {}", project.name, plan.summary());
        } else {
            tracing::info!(
                "Quotas of project \"{}\" already satisfy the defaults",
                project.name
            );
        }

        let mut entries = Vec::with_capacity(plan.entries.len());
        for entry in &plan.entries {
            let outcome = match (entry.current, entry.action) {
                (Some(current), Some(QuotaAction::Apply(to))) => {
                    tracing::info!(
                        "Changing quota {} from {} to {} on project \"{}\"",
                        entry.kind,
                        current,
                        to,
                        project.name
                    );
                    self.ctx
                        .client()
                        .update_quota(&project.id, entry.kind, to)
                        .await?;
                    QuotaOutcome::Applied { from: current, to }
                }
                (Some(current), Some(QuotaAction::Refuse)) => {
                    tracing::warn!(
                        "Existing quota {} ({}) for project \"{}\" is larger than new quota {}; doing nothing",
                        entry.kind,
                        current,
                        project.name,
                        entry.requested
                    );
                    QuotaOutcome::Refused {
                        current,
                        requested: entry.requested,
                    }
                }
                (Some(current), _) => QuotaOutcome::Unchanged { value: current },
                (None, _) => {
                    tracing::warn!(
                        "Quota service does not offer {} for project \"{}\"; skipping",
                        entry.kind,
                        project.name
                    );
                    QuotaOutcome::Unavailable
                }
            };
            entries.push((entry.kind, outcome));
        }

        Ok(DefaultsReport {
            project: project.name.clone(),
            entries,
        })
    }

    /// Apply `target` to every project, one after another
    ///
    /// Nothing here aborts the loop: refusals and errors are collected per
    /// project in the returned report.
    pub async fn apply_to_all(
        &self,
        projects: &[Project],
        target: &QuotaTarget,
        force: bool,
    ) -> BatchReport {
        let mut report = BatchReport::new();

        for project in projects {
            match target {
                QuotaTarget::Single(request) => match self.apply(project, *request, force).await {
                    Ok(change) => match change.outcome {
                        QuotaOutcome::Refused { .. } => {
                            tracing::warn!(
                                "Skipping project \"{}\" because its quota {} is greater than the requested quota; use --force",
                                project.name,
                                request.kind
                            );
                            report.add_refusal(
                                &project.name,
                                format!("{}: {}", request.kind, change.outcome),
                            );
                        }
                        outcome => report
                            .add_success(&project.name, format!("{}: {}", request.kind, outcome)),
                    },
                    Err(e) => {
                        tracing::error!("Failed to apply quota to \"{}\": {}", project.name, e);
                        report.add_failure(&project.name, e.to_string());
                    }
                },
                QuotaTarget::Defaults(defaults) => {
                    match self.apply_defaults(project, defaults, force).await {
                        Ok(defaults_report) => {
                            let refused = defaults_report.refused();
                            let message = format!("{} quota(s) changed", defaults_report.applied());
                            if refused.is_empty() {
                                report.add_success(&project.name, message);
                            } else {
                                let names: Vec<&str> = refused.iter().map(|k| k.as_str()).collect();
                                report.add_refusal(
                                    &project.name,
                                    format!("{}; kept larger {}", message, names.join(", ")),
                                );
                            }
                        }
                        Err(e) => {
                            tracing::error!(
                                "Failed to apply quota defaults to \"{}\": {}",
                                project.name,
                                e
                            );
                            report.add_failure(&project.name, e.to_string());
                        }
                    }
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::sync::Arc;
    use tenantops_cloud::{CloudClient, MemoryCloud};

    #[test]
    fn test_reconcile_noop() {
        assert_eq!(reconcile(10, 10, false), QuotaAction::NoOp);
        assert_eq!(reconcile(10, 10, true), QuotaAction::NoOp);
        assert_eq!(reconcile(-1, -1, false), QuotaAction::NoOp);
    }

    #[test]
    fn test_reconcile_raise_and_unlimited() {
        assert_eq!(reconcile(10, 20, false), QuotaAction::Apply(20));
        assert_eq!(reconcile(10, -1, false), QuotaAction::Apply(-1));
        assert_eq!(reconcile(0, 1, false), QuotaAction::Apply(1));
    }

    #[test]
    fn test_reconcile_lowering_needs_force() {
        assert_eq!(reconcile(20, 10, false), QuotaAction::Refuse);
        assert_eq!(reconcile(20, 0, false), QuotaAction::Refuse);
        assert_eq!(reconcile(20, 10, true), QuotaAction::Apply(10));
    }

    #[test]
    fn test_reconcile_monotonic_safety_grid() {
        let values = [-1, 0, 1, 5, 10, 1000];
        for current in values {
            for requested in values {
                let action = reconcile(current, requested, false);
                if requested == current {
                    assert_eq!(action, QuotaAction::NoOp);
                } else if requested == -1 || requested > current {
                    assert_eq!(action, QuotaAction::Apply(requested));
                } else {
                    assert_eq!(action, QuotaAction::Refuse);
                }

                let forced = reconcile(current, requested, true);
                if requested == current {
                    assert_eq!(forced, QuotaAction::NoOp);
                } else {
                    assert_eq!(forced, QuotaAction::Apply(requested));
                }
            }
        }
    }

    #[test]
    fn test_request_validation() {
        let request = QuotaRequest::parse("cores", "40").unwrap();
        assert_eq!(request.kind, QuotaKind::Cores);
        assert_eq!(request.value, 40);
        assert_eq!(QuotaRequest::parse("ram", "-1").unwrap().value, -1);

        assert!(matches!(
            QuotaRequest::parse("gpus", "1"),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            QuotaRequest::parse("cores", "many"),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            QuotaRequest::parse("cores", "-2"),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            QuotaRequest::parse("cores", "1000001"),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_defaults_from_raw_reports_every_problem() {
        let raw: BTreeMap<String, String> = [
            ("instances", "20"),
            ("gpus", "4"),
            ("cores", "lots"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let err = QuotaDefaults::from_raw(&raw).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("gpus"));
        assert!(message.contains("lots"));
    }

    #[test]
    fn test_defaults_load_ini() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("defaults.ini");
        std::fs::write(&path, "[DEFAULT]\ninstances = 20\nram = -1\n").unwrap();

        let defaults = QuotaDefaults::load(&path).unwrap();
        assert_eq!(defaults.len(), 2);
        assert_eq!(defaults.get(QuotaKind::Instances), Some(20));
        assert_eq!(defaults.get(QuotaKind::Ram), Some(-1));
    }

    #[test]
    #[serial]
    fn test_discover_conf_defaults_covers_every_kind() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        let mut contents = String::from("[DEFAULT]\n");
        for (i, kind) in QuotaKind::ALL.iter().enumerate() {
            contents.push_str(&format!("{} = {}\n", kind, (i as i64 + 1) * 10));
        }
        std::fs::create_dir(temp_dir.path().join("conf")).unwrap();
        std::fs::write(temp_dir.path().join("conf/defaults.ini"), contents).unwrap();

        std::env::set_current_dir(&temp_dir).unwrap();
        let result = temp_env::with_var_unset(
            tenantops_config::DEFAULTS_PATH_VAR,
            QuotaDefaults::discover,
        );
        std::env::set_current_dir(original_dir).unwrap();

        let (path, defaults) = result.unwrap();
        assert!(path.ends_with("conf/defaults.ini"));
        assert_eq!(defaults.len(), QuotaKind::ALL.len());
        for (i, kind) in QuotaKind::ALL.iter().enumerate() {
            assert_eq!(defaults.get(*kind), Some((i as i64 + 1) * 10), "{kind}");
        }
    }

    async fn setup() -> (Arc<MemoryCloud>, Context, Project) {
        let cloud = Arc::new(MemoryCloud::new());
        let ctx = Context::new(cloud.clone());
        let project = cloud.create_project("alpha", "default").await.unwrap();
        (cloud, ctx, project)
    }

    #[tokio::test]
    async fn test_apply_raises_quota() {
        let (cloud, ctx, project) = setup().await;
        cloud.set_quota(&project.id, QuotaKind::Cores, 20);

        let change = QuotaReconciler::new(&ctx)
            .apply(&project, QuotaRequest::parse("cores", "40").unwrap(), false)
            .await
            .unwrap();

        assert_eq!(change.outcome, QuotaOutcome::Applied { from: 20, to: 40 });
        assert_eq!(change.quota_set.get(QuotaKind::Cores), Some(40));
    }

    #[tokio::test]
    async fn test_apply_refuses_lowering_without_remote_write() {
        let (cloud, ctx, project) = setup().await;
        cloud.set_quota(&project.id, QuotaKind::Cores, 20);
        cloud.clear_journal();

        let change = QuotaReconciler::new(&ctx)
            .apply(&project, QuotaRequest::parse("cores", "5").unwrap(), false)
            .await
            .unwrap();

        assert_eq!(
            change.outcome,
            QuotaOutcome::Refused {
                current: 20,
                requested: 5
            }
        );
        assert!(cloud.journal().is_empty());

        let err = change
            .outcome
            .require_not_refused(&project.name, QuotaKind::Cores)
            .unwrap_err();
        assert!(matches!(err, Error::RequiresForce { current: 20, .. }));
    }

    #[tokio::test]
    async fn test_apply_forced_lowering() {
        let (cloud, ctx, project) = setup().await;
        cloud.set_quota(&project.id, QuotaKind::Cores, 20);

        let change = QuotaReconciler::new(&ctx)
            .apply(&project, QuotaRequest::parse("cores", "5").unwrap(), true)
            .await
            .unwrap();

        assert_eq!(change.outcome, QuotaOutcome::Applied { from: 20, to: 5 });
    }

    #[tokio::test]
    async fn test_defaults_keep_going_after_refusal() {
        let (cloud, ctx, project) = setup().await;
        cloud.set_quota(&project.id, QuotaKind::Instances, 10);
        cloud.set_quota(&project.id, QuotaKind::Cores, 64);
        cloud.set_quota(&project.id, QuotaKind::Ram, 51200);
        cloud.clear_journal();

        let defaults: QuotaDefaults = [
            (QuotaKind::Instances, 20),
            (QuotaKind::Cores, 32),
            (QuotaKind::Ram, 102400),
        ]
        .into_iter()
        .collect();

        let report = QuotaReconciler::new(&ctx)
            .apply_defaults(&project, &defaults, false)
            .await
            .unwrap();

        assert_eq!(report.applied(), 2);
        assert_eq!(report.refused(), vec![QuotaKind::Cores]);
        assert_eq!(
            cloud.journal(),
            vec!["update_quota:instances=20", "update_quota:ram=102400"]
        );

        let quota = cloud.get_quota_set(&project.id).await.unwrap();
        assert_eq!(quota.get(QuotaKind::Cores), Some(64));
    }

    #[tokio::test]
    async fn test_defaults_already_satisfied_write_nothing() {
        let (cloud, ctx, project) = setup().await;
        cloud.set_quota(&project.id, QuotaKind::Instances, 20);
        cloud.set_quota(&project.id, QuotaKind::Cores, 64);
        cloud.clear_journal();

        let defaults: QuotaDefaults = [(QuotaKind::Instances, 20), (QuotaKind::Cores, 32)]
            .into_iter()
            .collect();

        let report = QuotaReconciler::new(&ctx)
            .apply_defaults(&project, &defaults, false)
            .await
            .unwrap();

        assert_eq!(report.applied(), 0);
        assert_eq!(report.refused(), vec![QuotaKind::Cores]);
        assert!(cloud.journal().is_empty());
    }

    #[tokio::test]
    async fn test_apply_to_all_collects_refusals_and_failures() {
        let cloud = Arc::new(MemoryCloud::new());
        let ctx = Context::new(cloud.clone());
        let small = cloud.create_project("small", "default").await.unwrap();
        let large = cloud.create_project("large", "default").await.unwrap();
        cloud.set_quota(&small.id, QuotaKind::Instances, 5);
        cloud.set_quota(&large.id, QuotaKind::Instances, 50);

        let ghost = Project {
            id: "missing".to_string(),
            name: "ghost".to_string(),
            domain_id: "default".to_string(),
        };
        let projects = vec![ghost, small.clone(), large.clone()];
        let target = QuotaTarget::Single(QuotaRequest::parse("instances", "20").unwrap());

        let report = QuotaReconciler::new(&ctx)
            .apply_to_all(&projects, &target, false)
            .await;

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].target, "ghost");
        assert_eq!(report.succeeded.len(), 1);
        assert_eq!(report.succeeded[0].target, "small");
        assert_eq!(report.refused.len(), 1);
        assert_eq!(report.refused[0].target, "large");

        let quota = cloud.get_quota_set(&small.id).await.unwrap();
        assert_eq!(quota.get(QuotaKind::Instances), Some(20));
    }
}
