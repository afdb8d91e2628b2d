//! Run report types
//!
//! The run report is the only surface for execution-time failures. Every
//! handle the executor created shows up in exactly one directive record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of one directive, or of one placement of a fault directive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DirectiveStatus {
    /// Applied and still live, or irreversible
    Applied,
    /// Applied, then reverted
    Reverted,
    FailedToApply,
    /// Revert failed twice; the fault may still be live
    FailedToRevert,
    /// Condition evaluated and a branch ran
    BranchTaken,
    /// Condition false with no else branch, or step never reached
    Skipped,
    /// Metric query failed; the branch was skipped
    SkippedConditionError,
}

impl DirectiveStatus {
    /// Kebab-case label used in text reports
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Reverted => "reverted",
            Self::FailedToApply => "failed-to-apply",
            Self::FailedToRevert => "failed-to-revert",
            Self::BranchTaken => "branch-taken",
            Self::Skipped => "skipped",
            Self::SkippedConditionError => "skipped-condition-error",
        }
    }

    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::FailedToApply | Self::FailedToRevert)
    }

    /// True when a fault took effect on the target
    #[must_use]
    pub const fn took_effect(self) -> bool {
        matches!(self, Self::Applied | Self::Reverted | Self::FailedToRevert)
    }
}

/// One line of the run report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectiveRecord {
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<String>,
    pub status: DirectiveStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<Uuid>,
    /// Milliseconds from the run's start barrier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_at_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reverted_at_ms: Option<u64>,
}

impl DirectiveRecord {
    fn new(description: impl Into<String>, status: DirectiveStatus) -> Self {
        Self {
            description: description.into(),
            targets: Vec::new(),
            status,
            detail: None,
            handle: None,
            applied_at_ms: None,
            reverted_at_ms: None,
        }
    }

    /// Record for a successful apply
    pub fn applied(
        description: impl Into<String>,
        targets: Vec<String>,
        handle: Uuid,
        at_ms: u64,
    ) -> Self {
        Self {
            targets,
            handle: Some(handle),
            applied_at_ms: Some(at_ms),
            ..Self::new(description, DirectiveStatus::Applied)
        }
    }

    /// Record for a failed apply or a failed resolution
    pub fn failed_to_apply(
        description: impl Into<String>,
        targets: Vec<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            targets,
            detail: Some(error.into()),
            ..Self::new(description, DirectiveStatus::FailedToApply)
        }
    }

    pub fn branch_taken(description: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            detail: Some(detail.into()),
            ..Self::new(description, DirectiveStatus::BranchTaken)
        }
    }

    pub fn skipped(description: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            detail: Some(reason.into()),
            ..Self::new(description, DirectiveStatus::Skipped)
        }
    }

    pub fn condition_error(description: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            detail: Some(error.into()),
            ..Self::new(description, DirectiveStatus::SkippedConditionError)
        }
    }

    /// Settle a previously applied record after its revert finished
    pub fn settle(&mut self, outcome: Result<(), String>, at_ms: u64) {
        match outcome {
            Ok(()) => {
                self.status = DirectiveStatus::Reverted;
                self.reverted_at_ms = Some(at_ms);
            },
            Err(error) => {
                self.status = DirectiveStatus::FailedToRevert;
                self.detail = Some(error);
            },
        }
    }
}

/// How a chain ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainStatus {
    Completed,
    /// Stopped by an apply, resolution, or timeout error
    Aborted,
    Cancelled,
    /// Task died before it could report; its records are gone
    Lost,
}

/// Outcome of one directive chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainReport {
    pub id: String,
    pub label: String,
    pub status: ChainStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub records: Vec<DirectiveRecord>,
}

impl ChainReport {
    /// Placeholder for a chain task that died without reporting
    pub fn lost(id: impl Into<String>, label: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            status: ChainStatus::Lost,
            error: Some(error.into()),
            records: Vec::new(),
        }
    }

    /// Numeric sort key for dotted chain ids (`2` < `2.1` < `10`)
    pub(crate) fn sort_key(&self) -> Vec<u64> {
        self.id
            .split('.')
            .map(|segment| segment.parse().unwrap_or(u64::MAX))
            .collect()
    }
}

/// Aggregate outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStatus {
    Success,
    PartialFailure,
    Failure,
}

impl RunStatus {
    /// Fold directive outcomes into a status
    ///
    /// Success when nothing failed, failure when something failed and no
    /// fault took effect, partial failure otherwise.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a DirectiveRecord>) -> Self {
        let (failed, effective) = Self::fold(records, false);
        Self::classify(failed, effective)
    }

    /// Fold chain outcomes; a lost chain always counts as a failure
    pub fn from_chains<'a>(chains: impl IntoIterator<Item = &'a ChainReport>) -> Self {
        let mut failed = false;
        let mut effective = false;
        for chain in chains {
            let (f, e) = Self::fold(&chain.records, chain.status == ChainStatus::Lost);
            failed |= f;
            effective |= e;
        }
        Self::classify(failed, effective)
    }

    fn fold<'a>(
        records: impl IntoIterator<Item = &'a DirectiveRecord>,
        mut failed: bool,
    ) -> (bool, bool) {
        let mut effective = false;
        for record in records {
            failed |= record.status.is_failure();
            effective |= record.status.took_effect();
        }
        (failed, effective)
    }

    const fn classify(failed: bool, effective: bool) -> Self {
        match (failed, effective) {
            (false, _) => Self::Success,
            (true, false) => Self::Failure,
            (true, true) => Self::PartialFailure,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::PartialFailure => "partial-failure",
            Self::Failure => "failure",
        }
    }
}

/// Report for one scenario run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub name: String,
    /// False for runs built from top-level statements
    pub declared: bool,
    pub status: RunStatus,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub chains: Vec<ChainReport>,
    /// Reversible handles registered during the run
    pub handles_created: usize,
    /// Handles for which a revert was attempted
    pub revert_attempts: usize,
}

impl ScenarioReport {
    pub fn records(&self) -> impl Iterator<Item = &DirectiveRecord> {
        self.chains.iter().flat_map(|chain| &chain.records)
    }

    /// Handles whose revert failed; these may still be live
    pub fn leaked(&self) -> impl Iterator<Item = &DirectiveRecord> {
        self.records()
            .filter(|record| record.status == DirectiveStatus::FailedToRevert)
    }
}

/// Report for a whole plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub scenarios: Vec<ScenarioReport>,
    pub status: RunStatus,
    pub cancelled: bool,
    /// Runs skipped because of cancellation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub not_started: Vec<String>,
}

impl RunReport {
    pub fn new(scenarios: Vec<ScenarioReport>, not_started: Vec<String>, cancelled: bool) -> Self {
        let status = RunStatus::from_chains(scenarios.iter().flat_map(|s| &s.chains));
        Self {
            scenarios,
            status,
            cancelled,
            not_started,
        }
    }

    pub fn handles_created(&self) -> usize {
        self.scenarios.iter().map(|s| s.handles_created).sum()
    }

    pub fn revert_attempts(&self) -> usize {
        self.scenarios.iter().map(|s| s.revert_attempts).sum()
    }
}
