//! Reverse replay of a journaled run.
//!
//! Every `applied` entry and every dangling intent (a mutation that may have landed before
//! a crash) is restored to its prior snapshot, newest first. Restores are best-effort: a
//! failure is recorded and the remaining items are still attempted. The rollback is
//! journaled as a run of its own with `rollback_of` set, so it can itself be reversed.
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use log::Level;
use serde_json::json;
use uuid::Uuid;

use crate::api::apply::finish;
use crate::api::errors::{exit_code_for, id_str, outcome_error_id, ApiError};
use crate::api::plan::audit_ctx;
use crate::api::Hardline;
use crate::executor::{ExecOutcome, Executor};
use crate::logging::{now_iso, AuditSink, FactsEmitter, StageLogger};
use crate::types::errors::{ActionError, JournalWriteError};
use crate::types::ids::new_run_id;
use crate::types::{
    ActionKind, Host, Intent, ItemReport, JournalEntry, Outcome, ReconciliationRun, RunHeader,
    RunReport, RunStatus, SkipReason, Snapshot,
};

/// One item to put back, in the order it was originally changed.
struct Step {
    item_id: String,
    snapshot: Snapshot,
}

/// Items to restore, newest change first. Each item appears once, with the earliest
/// snapshot the run recorded for it.
fn steps_of(run: &ReconciliationRun) -> Vec<Step> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut steps: Vec<Step> = Vec::new();
    let applied = run.entries.iter().filter_map(|e| match (&e.outcome, &e.prior_value_snapshot) {
        (Outcome::Applied, Some(s)) => Some((e.item_id.as_str(), s)),
        _ => None,
    });
    // A dangling intent can only be the last mutation attempted.
    let dangling = run
        .dangling_intents
        .iter()
        .map(|i| (i.item_id.as_str(), &i.prior_value_snapshot));
    for (id, snap) in applied.chain(dangling) {
        if seen.insert(id) {
            steps.push(Step {
                item_id: id.to_string(),
                snapshot: snap.clone(),
            });
        }
    }
    steps.reverse();
    steps
}

fn same_dir(a: &Path, b: &Path) -> bool {
    let canon = |p: &Path| std::fs::canonicalize(p).unwrap_or_else(|_| p.to_path_buf());
    canon(a) == canon(b)
}

/// The root to restore onto: the one the run recorded, which an explicit `root` must match.
fn target_root(run: &ReconciliationRun, root: Option<&Path>) -> Result<PathBuf, ApiError> {
    match (root, run.root.as_deref()) {
        (Some(given), Some(recorded)) if !same_dir(given, recorded) => {
            Err(ApiError::PolicyViolation(format!(
                "run {} was applied under {}, refusing to restore onto {}",
                run.run_id,
                recorded.display(),
                given.display()
            )))
        }
        (Some(given), _) => Ok(given.to_path_buf()),
        (None, Some(recorded)) => Ok(recorded.to_path_buf()),
        (None, None) => Err(ApiError::PolicyViolation(format!(
            "run {} does not record its host root; pass one explicitly",
            run.run_id
        ))),
    }
}

#[allow(
    clippy::too_many_lines,
    reason = "Mirrors the apply loop; splitting hides the journal ordering"
)]
pub(crate) fn run<E: FactsEmitter, A: AuditSink>(
    api: &Hardline<E, A>,
    run_id: &Uuid,
    root: Option<&Path>,
) -> Result<RunReport, ApiError> {
    let t0 = Instant::now();
    let journal = api.journal();
    let original = journal.read_run(run_id)?;
    let host = Host::new(original.host_id.clone(), target_root(&original, root)?);
    let steps = steps_of(&original);
    api.audit.log(
        Level::Info,
        &format!(
            "rollback: run={run_id} host={} steps={}",
            host.id,
            steps.len()
        ),
    );

    let started_at = now_iso();
    let header = RunHeader {
        run_id: new_run_id(),
        host_id: host.id.clone(),
        started_at: started_at.clone(),
        plan_id: None,
        rollback_of: Some(*run_id),
        root: Some(host.root.clone()),
        items: steps
            .iter()
            .filter_map(|s| original.items.iter().find(|i| i.id == s.item_id).cloned())
            .collect(),
    };
    let mut writer = journal.open_run(header)?;
    let new_id = writer.run_id();
    let tctx = audit_ctx(api, &host.id, String::new(), false).with_run(new_id);
    let slog = StageLogger::new(&tctx);

    let exec = Executor::new(
        &host.root,
        api.services.as_ref(),
        api.commands.as_ref(),
        api.policy.action_timeout(),
    )
    .with_fault(api.overrides.fault);

    let mut items: Vec<ItemReport> = Vec::with_capacity(steps.len());
    let mut errors: Vec<String> = Vec::new();
    let mut fatal: Option<String> = None;
    let mut mutated = false;

    for step in &steps {
        let item = original.items.iter().find(|i| i.id == step.item_id);
        let result = match (item, fatal.clone()) {
            (_, Some(detail)) => {
                ExecOutcome::bare(Outcome::Skipped(SkipReason::Aborted { detail }), None)
            }
            (None, None) => ExecOutcome::bare(
                Outcome::Failed(ActionError::Unsupported(
                    "item definition was not journaled".into(),
                )),
                None,
            ),
            (Some(item), None) => {
                let mut on_intent = |prior: &Snapshot| -> Result<(), JournalWriteError> {
                    writer.intent(Intent {
                        ts: now_iso(),
                        host_id: host.id.clone(),
                        run_id: new_id,
                        item_id: item.id.clone(),
                        action: ActionKind::Modify,
                        prior_value_snapshot: prior.clone(),
                        new_value: step.snapshot.value.clone(),
                    })?;
                    mutated = true;
                    Ok(())
                };
                match exec.restore(item, &step.snapshot, &mut on_intent) {
                    Ok(x) => x,
                    Err(e) => {
                        let msg = e.to_string();
                        errors.push(msg.clone());
                        fatal = Some(msg.clone());
                        ExecOutcome::bare(Outcome::Skipped(SkipReason::Aborted { detail: msg }), None)
                    }
                }
            }
        };

        if fatal.is_none() {
            let entry = JournalEntry {
                ts: now_iso(),
                host_id: host.id.clone(),
                run_id: new_id,
                item_id: step.item_id.clone(),
                action: ActionKind::Modify,
                outcome: result.outcome.clone(),
                prior_value_snapshot: result.prior.clone(),
                new_value: step.snapshot.value.clone(),
            };
            if let Err(e) = writer.record(entry) {
                errors.push(e.to_string());
                fatal = Some(e.to_string());
            }
        }

        let ev = slog.rollback().item(&step.item_id).merge(json!({
            "outcome": result.outcome.label(),
            "restored": step.snapshot,
            "before_hash": result.before_hash,
            "after_hash": result.after_hash,
            "hash_alg": "sha256",
        }));
        match outcome_error_id(&result.outcome) {
            None => ev.emit_success(),
            Some(id) => {
                api.audit.log(
                    Level::Warn,
                    &format!("rollback: {} {}", step.item_id, result.outcome),
                );
                ev.merge(json!({
                    "detail": result.outcome.to_string(),
                    "error_id": id_str(id),
                    "exit_code": exit_code_for(id),
                }))
                .emit_failure();
            }
        }
        items.push(ItemReport {
            item_id: step.item_id.clone(),
            action: ActionKind::Modify,
            outcome: Some(result.outcome),
            prior: result.prior,
            new_value: step.snapshot.value.clone(),
            reason: None,
        });
    }

    let status = if fatal.is_some() && !mutated {
        RunStatus::AbortedBeforeApply
    } else {
        RunStatus::derive(items.iter().filter_map(|i| i.outcome.as_ref()), true)
    };
    let completed_at = if fatal.is_none() {
        writer.complete(status).unwrap_or_else(|e| {
            errors.push(e.to_string());
            now_iso()
        })
    } else {
        drop(writer);
        now_iso()
    };

    let failed = items
        .iter()
        .filter(|i| !i.outcome.as_ref().is_some_and(Outcome::is_satisfied))
        .count();
    let ev = slog.rollback_summary().merge(json!({
        "rollback_of": run_id.to_string(),
        "restored": items.len() - failed,
        "failed": failed,
    }));
    if failed == 0 {
        ev.emit_success();
    } else {
        ev.emit_failure();
    }

    let report = RunReport {
        run_id: Some(new_id),
        host_id: host.id.clone(),
        plan_id: None,
        status,
        dry_run: false,
        rollback_of: Some(*run_id),
        started_at,
        completed_at: Some(completed_at),
        duration_ms: u64::try_from(t0.elapsed().as_millis()).unwrap_or(u64::MAX),
        items,
        errors,
    };
    finish(api, &slog, &report);
    Ok(report)
}
