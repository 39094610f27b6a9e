//! Applies one action at a time through a pluggable backend.
//!
//! Every mutation follows the same sequence: fresh probe, idempotence check, intent hook,
//! backend write, post-probe verification. The executor never retries and always reports
//! exactly one outcome per call.
use std::path::Path;
use std::time::Duration;

use crate::adapters::{CommandRunner, ServiceManager};
use crate::fs::{sha256_hex_of, Fault};
use crate::probe::{line_selector, probe};
use crate::types::errors::{ActionError, JournalWriteError};
use crate::types::{
    Action, ActionKind, BaselineItem, Desired, Outcome, ProbeResult, SkipReason, Snapshot, Target,
    Value,
};

mod command;
mod file;
mod service;

/// Result of one executor call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecOutcome {
    pub outcome: Outcome,
    /// State observed right before the write (or at planning time for NoOp/Unsupported).
    pub prior: Option<Snapshot>,
    /// State observed after the write, when a write was attempted.
    pub after: Option<Snapshot>,
    pub before_hash: Option<String>,
    pub after_hash: Option<String>,
    pub fsync_ms: u64,
}

impl ExecOutcome {
    /// An outcome reached without writing anything.
    #[must_use]
    pub fn bare(outcome: Outcome, prior: Option<Snapshot>) -> Self {
        Self {
            outcome,
            prior,
            after: None,
            before_hash: None,
            after_hash: None,
            fsync_ms: 0,
        }
    }
}

/// What a write should converge the target to.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Goal {
    Value(Value),
    /// The target must not exist (restoring a file the run created).
    Absent,
}

impl Goal {
    fn reached(&self, r: &ProbeResult) -> bool {
        match self {
            Goal::Absent => !r.present_on_disk,
            Goal::Value(v) => r.current_value.as_ref().is_some_and(|c| v.satisfied_by(c)),
        }
    }
}

/// Callback run after the fresh probe and before the first byte is changed. An error
/// prevents the mutation.
pub type IntentHook<'h> = dyn FnMut(&Snapshot) -> Result<(), JournalWriteError> + 'h;

/// Per-host executor. Cheap to construct; holds only borrowed adapters.
pub struct Executor<'a> {
    root: &'a Path,
    services: &'a dyn ServiceManager,
    commands: &'a dyn CommandRunner,
    timeout: Duration,
    fault: Option<Fault>,
}

impl<'a> Executor<'a> {
    pub fn new(
        root: &'a Path,
        services: &'a dyn ServiceManager,
        commands: &'a dyn CommandRunner,
        timeout: Duration,
    ) -> Self {
        Self {
            root,
            services,
            commands,
            timeout,
            fault: None,
        }
    }

    /// Interrupt every file write at `fault`.
    #[must_use]
    pub fn with_fault(mut self, fault: Option<Fault>) -> Self {
        self.fault = fault;
        self
    }

    fn live(&self) -> bool {
        self.root == Path::new("/")
    }

    /// Apply a planned action.
    ///
    /// # Errors
    ///
    /// Only when `on_intent` fails; the target is then left untouched.
    pub fn apply(
        &self,
        item: &BaselineItem,
        action: &Action,
        on_intent: &mut IntentHook<'_>,
    ) -> Result<ExecOutcome, JournalWriteError> {
        match action.kind {
            ActionKind::NoOp => Ok(ExecOutcome::bare(Outcome::NoOp, action.prior.clone())),
            ActionKind::Unsupported => Ok(ExecOutcome::bare(
                Outcome::Skipped(SkipReason::Unsupported {
                    detail: action.reason.clone().unwrap_or_else(|| "unsupported".into()),
                }),
                action.prior.clone(),
            )),
            ActionKind::Create | ActionKind::Modify => {
                self.converge(item, &Goal::Value(item.desired_value()), on_intent)
            }
        }
    }

    /// Converge a target back to a journaled snapshot. An absent snapshot removes the file.
    ///
    /// # Errors
    ///
    /// Only when `on_intent` fails.
    pub fn restore(
        &self,
        item: &BaselineItem,
        snapshot: &Snapshot,
        on_intent: &mut IntentHook<'_>,
    ) -> Result<ExecOutcome, JournalWriteError> {
        let goal = match (&snapshot.value, snapshot.present) {
            (_, false) => Goal::Absent,
            (Some(v), true) => Goal::Value(v.clone()),
            (None, true) => {
                return Ok(ExecOutcome::bare(
                    Outcome::Failed(ActionError::Unsupported(
                        "prior state was unreadable and cannot be restored".into(),
                    )),
                    None,
                ))
            }
        };
        self.converge(item, &goal, on_intent)
    }

    fn file_hash(&self, item: &BaselineItem) -> Option<String> {
        match &item.target {
            Target::File(p) => sha256_hex_of(&p.resolve(self.root)),
            _ => None,
        }
    }

    fn converge(
        &self,
        item: &BaselineItem,
        goal: &Goal,
        on_intent: &mut IntentHook<'_>,
    ) -> Result<ExecOutcome, JournalWriteError> {
        let fresh = match probe(item, self.root, self.services) {
            Ok(r) => r,
            Err(e) => {
                return Ok(ExecOutcome::bare(
                    Outcome::Failed(ActionError::Unsupported(e.reason)),
                    None,
                ))
            }
        };
        let prior = fresh.snapshot();
        if goal.reached(&fresh) {
            return Ok(ExecOutcome::bare(Outcome::NoOp, Some(prior)));
        }
        if fresh.present_on_disk && !fresh.readable {
            return Ok(ExecOutcome::bare(
                Outcome::Failed(ActionError::PermissionDenied(format!(
                    "{} is not readable",
                    item.target.display()
                ))),
                Some(prior),
            ));
        }

        on_intent(&prior)?;

        let before_hash = self.file_hash(item);
        let written = self.write(item, goal, &fresh);
        let after_hash = self.file_hash(item);
        let (outcome, after, fsync_ms) = match written {
            Err(e) => (Outcome::Failed(e), None, 0),
            Ok(ms) => match probe(item, self.root, self.services) {
                Err(e) => (
                    Outcome::Failed(ActionError::NotConverged(format!("post-probe failed: {}", e.reason))),
                    None,
                    ms,
                ),
                Ok(post) if goal.reached(&post) => (Outcome::Applied, Some(post.snapshot()), ms),
                Ok(post) => {
                    let snap = post.snapshot();
                    (
                        Outcome::Failed(ActionError::NotConverged(format!("observed {snap}"))),
                        Some(snap),
                        ms,
                    )
                }
            },
        };
        Ok(ExecOutcome {
            outcome,
            prior: Some(prior),
            after,
            before_hash,
            after_hash,
            fsync_ms,
        })
    }

    /// Dispatch to the backend for this item's target. Returns fsync time for file writes.
    fn write(&self, item: &BaselineItem, goal: &Goal, current: &ProbeResult) -> Result<u64, ActionError> {
        match (&item.target, &item.desired, goal) {
            (Target::File(p), Desired::Setting { .. } | Desired::Line { .. }, Goal::Absent) => {
                file::remove(&p.resolve(self.root)).map(|()| 0)
            }
            (
                Target::File(p),
                Desired::Setting {
                    key: Some(key),
                    separator,
                    ..
                },
                Goal::Value(Value::Setting { value }),
            ) => file::patch_text(
                &p.resolve(self.root),
                |text| crate::fs::edit::render_setting(text, key, *separator, value.as_deref()),
                self.fault,
            )
            .map(Option::unwrap_or_default),
            (Target::File(p), d @ Desired::Line { .. }, Goal::Value(Value::Lines { lines })) => {
                let select = line_selector(d);
                file::patch_text(
                    &p.resolve(self.root),
                    |text| crate::fs::edit::render_lines(text, &select, lines),
                    self.fault,
                )
                .map(Option::unwrap_or_default)
            }
            (
                Target::File(p),
                Desired::Permission { .. },
                Goal::Value(Value::Permission { mode, uid, gid }),
            ) => file::chmod_chown(&p.resolve(self.root), *mode, *uid, *gid).map(|()| 0),
            (Target::Sysctl(key), _, Goal::Value(Value::Setting { value: Some(v) })) => {
                command::set_sysctl(self.commands, self.live(), key, v, self.timeout).map(|()| 0)
            }
            (Target::Service(unit), _, Goal::Value(Value::Service { enabled, running })) => {
                let have = match &current.current_value {
                    Some(Value::Service { enabled, running }) => (*enabled, *running),
                    _ => (None, None),
                };
                service::converge_service(self.services, self.root, unit, (*enabled, *running), have)
                    .map(|()| 0)
            }
            (target, _, goal) => Err(ActionError::Unsupported(format!(
                "no backend converges {} to {}",
                target.display(),
                match goal {
                    Goal::Absent => "absence".to_string(),
                    Goal::Value(v) => v.to_string(),
                }
            ))),
        }
    }
}
