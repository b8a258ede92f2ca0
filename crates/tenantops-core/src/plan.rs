//! Planned quota changes and batch results

use crate::quota::{QuotaAction, QuotaDefaults, QuotaOutcome, reconcile};
use serde::Serialize;
use tenantops_cloud::{QuotaKind, QuotaSet};

/// One quota kind of a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedQuota {
    pub kind: QuotaKind,

    /// Limit currently set; `None` when the quota service does not offer the kind
    pub current: Option<i64>,

    pub requested: i64,

    /// `None` when `current` is unknown
    pub action: Option<QuotaAction>,
}

/// Quota changes computed against a single snapshot of a project's quota set
#[derive(Debug, Clone, Serialize)]
pub struct QuotaPlan {
    pub project: String,

    pub entries: Vec<PlannedQuota>,

    /// Whether the plan contains anything to apply
    pub has_changes: bool,
}

impl QuotaPlan {
    pub fn build(
        project: impl Into<String>,
        current: &QuotaSet,
        defaults: &QuotaDefaults,
        force: bool,
    ) -> Self {
        let entries: Vec<PlannedQuota> = defaults
            .iter()
            .map(|(kind, requested)| {
                let current = current.get(kind);
                PlannedQuota {
                    kind,
                    current,
                    requested,
                    action: current.map(|value| reconcile(value, requested, force)),
                }
            })
            .collect();
        let has_changes = entries
            .iter()
            .any(|e| matches!(e.action, Some(QuotaAction::Apply(_))));

        Self {
            project: project.into(),
            entries,
            has_changes,
        }
    }

    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for entry in &self.entries {
            match entry.action {
                Some(QuotaAction::Apply(_)) => summary.apply += 1,
                Some(QuotaAction::Refuse) => summary.refuse += 1,
                Some(QuotaAction::NoOp) => summary.no_change += 1,
                None => summary.unavailable += 1,
            }
        }
        summary
    }
}

/// Summary of planned quota changes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanSummary {
    pub apply: usize,
    pub refuse: usize,
    pub no_change: usize,
    pub unavailable: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to apply, {} refused, {} unchanged, {} unavailable",
            self.apply, self.refuse, self.no_change, self.unavailable
        )
    }
}

/// Outcome of applying quota defaults to one project
#[derive(Debug, Clone, Serialize)]
pub struct DefaultsReport {
    pub project: String,
    pub entries: Vec<(QuotaKind, QuotaOutcome)>,
}

impl DefaultsReport {
    pub fn applied(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, o)| matches!(o, QuotaOutcome::Applied { .. }))
            .count()
    }

    pub fn refused(&self) -> Vec<QuotaKind> {
        self.entries
            .iter()
            .filter(|(_, o)| matches!(o, QuotaOutcome::Refused { .. }))
            .map(|(kind, _)| *kind)
            .collect()
    }
}

/// Result of processing many targets (projects) in one run
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    /// Targets that were brought to the requested state
    pub succeeded: Vec<TargetResult>,

    /// Targets skipped because the change would lower a quota
    pub refused: Vec<TargetResult>,

    /// Targets that failed with an error
    pub failed: Vec<TargetResult>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when nothing failed; refusals are not failures
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn add_success(&mut self, target: impl Into<String>, message: impl Into<String>) {
        self.succeeded.push(TargetResult::new(target, message));
    }

    pub fn add_refusal(&mut self, target: impl Into<String>, message: impl Into<String>) {
        self.refused.push(TargetResult::new(target, message));
    }

    pub fn add_failure(&mut self, target: impl Into<String>, message: impl Into<String>) {
        self.failed.push(TargetResult::new(target, message));
    }
}

impl std::fmt::Display for BatchReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} succeeded, {} skipped, {} failed",
            self.succeeded.len(),
            self.refused.len(),
            self.failed.len()
        )
    }
}

/// Result for a single target of a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetResult {
    pub target: String,
    pub message: String,
}

impl TargetResult {
    fn new(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            message: message.into(),
        }
    }
}
