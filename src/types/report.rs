use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::journal::{Outcome, ReconciliationRun, RunStatus};
use super::plan::ActionKind;
use super::value::{Snapshot, Value};

/// Final state of one item in a run. Every item appears, NoOps included.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemReport {
    pub item_id: String,
    pub action: ActionKind,
    /// `None` for dry runs and for actions interrupted before their outcome was recorded.
    pub outcome: Option<Outcome>,
    pub prior: Option<Snapshot>,
    pub new_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// `None` for dry runs, which are never journaled.
    pub run_id: Option<Uuid>,
    pub host_id: String,
    pub plan_id: Option<Uuid>,
    pub status: RunStatus,
    pub dry_run: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback_of: Option<Uuid>,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub duration_ms: u64,
    pub items: Vec<ItemReport>,
    pub errors: Vec<String>,
}

impl RunReport {
    /// Rebuild a report from journal records.
    #[must_use]
    pub fn from_run(run: &ReconciliationRun) -> Self {
        let mut items: Vec<ItemReport> = Vec::new();
        for e in &run.entries {
            let item = ItemReport {
                item_id: e.item_id.clone(),
                action: e.action,
                outcome: Some(e.outcome.clone()),
                prior: e.prior_value_snapshot.clone(),
                new_value: e.new_value.clone(),
                reason: None,
            };
            // Later entries for the same item are corrections and win.
            match items.iter_mut().find(|i| i.item_id == e.item_id) {
                Some(slot) => *slot = item,
                None => items.push(item),
            }
        }
        for i in &run.dangling_intents {
            items.push(ItemReport {
                item_id: i.item_id.clone(),
                action: i.action,
                outcome: None,
                prior: Some(i.prior_value_snapshot.clone()),
                new_value: i.new_value.clone(),
                reason: Some("interrupted before outcome was recorded".to_string()),
            });
        }
        let mut errors = Vec::new();
        let status = run.status.unwrap_or_else(|| {
            errors.push("run did not complete".to_string());
            RunStatus::PartialFailure
        });
        RunReport {
            run_id: Some(run.run_id),
            host_id: run.host_id.clone(),
            plan_id: run.plan_id,
            status,
            dry_run: false,
            rollback_of: run.rollback_of,
            started_at: run.started_at.clone(),
            completed_at: run.completed_at.clone(),
            duration_ms: 0,
            items,
            errors,
        }
    }

    #[must_use]
    pub fn item(&self, item_id: &str) -> Option<&ItemReport> {
        self.items.iter().find(|i| i.item_id == item_id)
    }

    #[must_use]
    pub fn outcome_of(&self, item_id: &str) -> Option<&Outcome> {
        self.item(item_id).and_then(|i| i.outcome.as_ref())
    }

    #[must_use]
    pub fn count(&self, label: &str) -> usize {
        self.items
            .iter()
            .filter(|i| i.outcome.as_ref().map(Outcome::label) == Some(label))
            .count()
    }

    /// Operator-facing table.
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let run = self
            .run_id
            .map_or_else(|| "dry-run".to_string(), |r| r.to_string());
        let _ = writeln!(out, "host {}  run {}  status {}", self.host_id, run, self.status);
        if let Some(of) = self.rollback_of {
            let _ = writeln!(out, "rollback of {of}");
        }
        let width = self
            .items
            .iter()
            .map(|i| i.item_id.len())
            .max()
            .unwrap_or(0)
            .max(4);
        for i in &self.items {
            let outcome = i
                .outcome
                .as_ref()
                .map_or_else(|| "planned".to_string(), ToString::to_string);
            let prior = i
                .prior
                .as_ref()
                .map_or_else(|| "-".to_string(), ToString::to_string);
            let new = i
                .new_value
                .as_ref()
                .map_or_else(|| "-".to_string(), ToString::to_string);
            let _ = write!(
                out,
                "  {:<width$}  {:<11}  {}  [{} -> {}]",
                i.item_id,
                i.action.as_str(),
                outcome,
                prior,
                new
            );
            if let Some(r) = &i.reason {
                let _ = write!(out, "  ({r})");
            }
            out.push('\n');
        }
        for e in &self.errors {
            let _ = writeln!(out, "error: {e}");
        }
        let _ = writeln!(
            out,
            "{} applied, {} noop, {} failed, {} skipped",
            self.count("applied"),
            self.count("noop"),
            self.count("failed"),
            self.count("skipped")
        );
        out
    }
}
