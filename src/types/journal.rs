//! Journal record types. Records are append-only JSON lines; nothing here is mutated
//! after it has been written.
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::baseline::BaselineItem;
use super::errors::ActionError;
use super::plan::ActionKind;
use super::value::{Snapshot, Value};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    DependencyFailed { dependency: String },
    Unsupported { detail: String },
    Cancelled,
    Aborted { detail: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::DependencyFailed { dependency } => {
                write!(f, "dependency `{dependency}` not satisfied")
            }
            SkipReason::Unsupported { detail } => write!(f, "unsupported: {detail}"),
            SkipReason::Cancelled => f.write_str("cancelled"),
            SkipReason::Aborted { detail } => write!(f, "aborted: {detail}"),
        }
    }
}

/// Terminal state of one action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Applied,
    NoOp,
    Failed(ActionError),
    Skipped(SkipReason),
}

impl Outcome {
    /// Whether dependents of this item may proceed.
    #[must_use]
    pub const fn is_satisfied(&self) -> bool {
        matches!(self, Outcome::Applied | Outcome::NoOp)
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Outcome::Applied => "applied",
            Outcome::NoOp => "noop",
            Outcome::Failed(_) => "failed",
            Outcome::Skipped(_) => "skipped",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Failed(e) => write!(f, "failed ({e})"),
            Outcome::Skipped(r) => write!(f, "skipped ({r})"),
            other => f.write_str(other.label()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    PartialFailure,
    AbortedBeforeApply,
}

impl RunStatus {
    /// Derive the terminal status from per-item outcomes.
    ///
    /// `dispatched` is false when the orchestrator stopped before handing any action
    /// to the executor.
    #[must_use]
    pub fn derive<'a>(outcomes: impl IntoIterator<Item = &'a Outcome>, dispatched: bool) -> Self {
        if !dispatched {
            return RunStatus::AbortedBeforeApply;
        }
        if outcomes.into_iter().all(Outcome::is_satisfied) {
            RunStatus::Success
        } else {
            RunStatus::PartialFailure
        }
    }

    /// Process exit code of the `apply` command.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            RunStatus::Success => 0,
            RunStatus::PartialFailure => 1,
            RunStatus::AbortedBeforeApply => 2,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::PartialFailure => "partial_failure",
            RunStatus::AbortedBeforeApply => "aborted_before_apply",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunHeader {
    pub run_id: Uuid,
    pub host_id: String,
    pub started_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback_of: Option<Uuid>,
    /// Filesystem root the run was applied under; rollback restores onto the same root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
    /// Definitions of the items this run may touch, so that it can be reversed later.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<BaselineItem>,
}

/// Written immediately before a mutation so that a crash mid-action is still reversible.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub ts: String,
    pub host_id: String,
    pub run_id: Uuid,
    pub item_id: String,
    pub action: ActionKind,
    pub prior_value_snapshot: Snapshot,
    pub new_value: Option<Value>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub ts: String,
    pub host_id: String,
    pub run_id: Uuid,
    pub item_id: String,
    pub action: ActionKind,
    #[serde(flatten)]
    pub outcome: Outcome,
    pub prior_value_snapshot: Option<Snapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFooter {
    pub run_id: Uuid,
    pub completed_at: String,
    pub status: RunStatus,
}

/// One line of a journal partition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum JournalRecord {
    RunStarted(RunHeader),
    Intent(Intent),
    Entry(JournalEntry),
    RunCompleted(RunFooter),
}

impl JournalRecord {
    #[must_use]
    pub const fn run_id(&self) -> &Uuid {
        match self {
            JournalRecord::RunStarted(h) => &h.run_id,
            JournalRecord::Intent(i) => &i.run_id,
            JournalRecord::Entry(e) => &e.run_id,
            JournalRecord::RunCompleted(f) => &f.run_id,
        }
    }
}

/// All records of one orchestrator pass, reassembled from a partition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconciliationRun {
    pub run_id: Uuid,
    pub host_id: String,
    pub plan_id: Option<Uuid>,
    pub started_at: String,
    pub completed_at: Option<String>,
    /// `None` when the run never completed (crash or abort without footer).
    pub status: Option<RunStatus>,
    pub rollback_of: Option<Uuid>,
    pub root: Option<PathBuf>,
    pub items: Vec<BaselineItem>,
    pub entries: Vec<JournalEntry>,
    /// Intents with no matching terminal entry: the mutation may or may not have landed.
    pub dangling_intents: Vec<Intent>,
}
