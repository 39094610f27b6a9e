//! Apply stage: drives one host from probing to reporting.
//!
//! Side-effects:
//! - Holds the host's journal partition lock for the whole pass (bounded wait, `E_LOCKING`).
//! - Journals an `intent` before every mutation and an `entry` for every item, NoOps included.
//! - Emits `confirm`, `apply.attempt` and `apply.result` facts, then a `report` summary.
//! - Continues past item failures; dependents of a failed item are skipped.
//! - A journal write failure stops the pass: history that cannot be recorded is not mutated.

use std::collections::HashMap;
use std::time::Instant;

use log::Level;
use serde_json::json;

use crate::api::errors::{action_error_id, exit_code_for, id_str, outcome_error_id, ApiError, ErrorId};
use crate::api::plan::{audit_ctx, build, probe};
use crate::api::Hardline;
use crate::executor::{ExecOutcome, Executor};
use crate::journal::JournalError;
use crate::logging::{now_iso, AuditSink, FactsEmitter, StageLogger};
use crate::types::errors::JournalWriteError;
use crate::types::ids::{action_id, new_run_id, plan_id};
use crate::types::{
    Action, ActionKind, Baseline, BaselineItem, Host, Intent, ItemReport, JournalEntry, Outcome,
    RunHeader, RunReport, RunStatus, SkipReason, Snapshot,
};

mod gate;
mod summary;

pub(crate) use summary::{finish, planned_report};

/// Why an item was not handed to the executor.
fn pre_outcome(
    action: &Action,
    item: &BaselineItem,
    gate: Option<&str>,
    fatal: Option<&str>,
    cancelled: bool,
    outcomes: &HashMap<String, Outcome>,
) -> Option<Outcome> {
    if let Some(detail) = gate {
        return Some(match action.kind {
            ActionKind::NoOp => Outcome::NoOp,
            ActionKind::Unsupported => Outcome::Skipped(SkipReason::Unsupported {
                detail: action.reason.clone().unwrap_or_default(),
            }),
            ActionKind::Create | ActionKind::Modify => Outcome::Skipped(SkipReason::Aborted {
                detail: detail.to_string(),
            }),
        });
    }
    if let Some(detail) = fatal {
        return Some(Outcome::Skipped(SkipReason::Aborted {
            detail: detail.to_string(),
        }));
    }
    if cancelled {
        return Some(Outcome::Skipped(SkipReason::Cancelled));
    }
    item.depends_on
        .iter()
        .find(|d| !outcomes.get(d.as_str()).is_some_and(Outcome::is_satisfied))
        .map(|d| {
            Outcome::Skipped(SkipReason::DependencyFailed {
                dependency: d.clone(),
            })
        })
}

#[allow(
    clippy::too_many_lines,
    reason = "Linear state machine; the stages read best in one place"
)]
pub(crate) fn run<E: FactsEmitter, A: AuditSink>(
    api: &Hardline<E, A>,
    baseline: &Baseline,
    host: &Host,
) -> Result<RunReport, ApiError> {
    let t0 = Instant::now();
    let started_at = now_iso();
    api.audit
        .log(Level::Info, &format!("apply: starting host={}", host.id));

    let probes = probe(api, baseline, host);
    let plan = build(api, baseline, host, &probes);
    let pid = plan_id(&plan);
    let every_probe_failed = !baseline.is_empty() && probes.values().all(Result::is_err);

    if api.policy.dry_run {
        let mut report = planned_report(host, pid, &plan, started_at, t0);
        if every_probe_failed {
            report.status = RunStatus::AbortedBeforeApply;
            report.errors.push("every item failed to probe".to_string());
        }
        let tctx = audit_ctx(api, &host.id, pid.to_string(), true);
        finish(api, &StageLogger::new(&tctx), &report);
        return Ok(report);
    }

    let header = RunHeader {
        run_id: new_run_id(),
        host_id: host.id.clone(),
        started_at: started_at.clone(),
        plan_id: Some(pid),
        rollback_of: None,
        root: Some(host.root.clone()),
        items: plan
            .actions
            .iter()
            .filter_map(|a| baseline.get(&a.item_id).cloned())
            .collect(),
    };
    let mut writer = match api.journal().open_run(header) {
        Ok(w) => w,
        Err(e @ JournalError::Locking { .. }) => {
            let tctx = audit_ctx(api, &host.id, pid.to_string(), false);
            StageLogger::new(&tctx)
                .apply_attempt()
                .merge(json!({
                    "error": e.to_string(),
                    "error_id": id_str(ErrorId::E_LOCKING),
                    "exit_code": exit_code_for(ErrorId::E_LOCKING),
                }))
                .emit_failure();
            api.audit.log(Level::Error, &format!("apply: {e}"));
            return Err(e.into());
        }
        Err(e) => {
            // Nothing was recorded, so nothing may be mutated.
            api.audit.log(Level::Error, &format!("apply: {e}"));
            let mut report = planned_report(host, pid, &plan, started_at, t0);
            report.dry_run = false;
            report.status = RunStatus::AbortedBeforeApply;
            report.errors.push(e.to_string());
            let tctx = audit_ctx(api, &host.id, pid.to_string(), false);
            finish(api, &StageLogger::new(&tctx), &report);
            return Ok(report);
        }
    };
    let run_id = writer.run_id();
    let tctx = audit_ctx(api, &host.id, pid.to_string(), false).with_run(run_id);
    let slog = StageLogger::new(&tctx);
    slog.apply_attempt()
        .merge(json!({
            "lock_wait_ms": writer.lock_wait_ms(),
            "actions": plan.actions.len(),
        }))
        .emit_success();

    let gate = gate::check(api, host, &plan, every_probe_failed, &slog);
    let mut errors: Vec<String> = gate.iter().cloned().collect();

    let exec = Executor::new(
        &host.root,
        api.services.as_ref(),
        api.commands.as_ref(),
        api.policy.action_timeout(),
    )
    .with_fault(api.overrides.fault);

    let mut outcomes: HashMap<String, Outcome> = HashMap::new();
    let mut items: Vec<ItemReport> = Vec::with_capacity(plan.actions.len());
    let mut dispatched = plan.actions.is_empty();
    let mut mutated = false;
    let mut fatal: Option<String> = None;

    for (idx, action) in plan.actions.iter().enumerate() {
        let Some(item) = baseline.get(&action.item_id) else {
            continue;
        };
        let aid = action_id(&pid, action, idx).to_string();
        let pre = pre_outcome(
            action,
            item,
            gate.as_deref(),
            fatal.as_deref(),
            api.cancel.is_cancelled(),
            &outcomes,
        );

        let at = Instant::now();
        let result = match pre {
            Some(o) => ExecOutcome::bare(o, action.prior.clone()),
            None => {
                dispatched = true;
                if action.kind.is_mutating() {
                    slog.apply_attempt()
                        .item(&item.id)
                        .action(aid.clone())
                        .target(item.target.display())
                        .merge(json!({ "kind": action.kind.as_str() }))
                        .emit_success();
                }
                let mut on_intent = |prior: &Snapshot| -> Result<(), JournalWriteError> {
                    writer.intent(Intent {
                        ts: now_iso(),
                        host_id: host.id.clone(),
                        run_id,
                        item_id: item.id.clone(),
                        action: action.kind,
                        prior_value_snapshot: prior.clone(),
                        new_value: action.new_value.clone(),
                    })?;
                    mutated = true;
                    Ok(())
                };
                match exec.apply(item, action, &mut on_intent) {
                    Ok(x) => x,
                    Err(e) => {
                        let msg = e.to_string();
                        api.audit.log(Level::Error, &format!("apply: {}: {msg}", item.id));
                        errors.push(msg.clone());
                        fatal = Some(msg.clone());
                        ExecOutcome::bare(
                            Outcome::Skipped(SkipReason::Aborted { detail: msg }),
                            action.prior.clone(),
                        )
                    }
                }
            }
        };

        if fatal.is_none() {
            let entry = JournalEntry {
                ts: now_iso(),
                host_id: host.id.clone(),
                run_id,
                item_id: item.id.clone(),
                action: action.kind,
                outcome: result.outcome.clone(),
                prior_value_snapshot: result.prior.clone(),
                new_value: action.new_value.clone(),
            };
            if let Err(e) = writer.record(entry) {
                let msg = e.to_string();
                api.audit.log(Level::Error, &format!("apply: {}: {msg}", item.id));
                errors.push(msg.clone());
                fatal = Some(msg);
            }
        }

        let ev = slog
            .apply_result()
            .item(&item.id)
            .action(aid)
            .target(item.target.display())
            .merge(json!({
                "kind": action.kind.as_str(),
                "outcome": result.outcome.label(),
                "prior": result.prior,
                "after": result.after,
                "before_hash": result.before_hash,
                "after_hash": result.after_hash,
                "hash_alg": "sha256",
                "fsync_ms": result.fsync_ms,
                "duration_ms": u64::try_from(at.elapsed().as_millis()).unwrap_or(u64::MAX),
            }));
        match outcome_error_id(&result.outcome) {
            None => ev.emit_success(),
            Some(id) => {
                let ev = ev.merge(json!({
                    "detail": result.outcome.to_string(),
                    "error_id": id_str(id),
                    "exit_code": exit_code_for(id),
                }));
                match &result.outcome {
                    Outcome::Failed(e) => {
                        api.audit.log(
                            Level::Warn,
                            &format!("apply: {} failed ({}): {e}", item.id, id_str(action_error_id(e))),
                        );
                        ev.emit_failure();
                    }
                    _ => ev.emit_warn(),
                }
            }
        }

        outcomes.insert(item.id.clone(), result.outcome.clone());
        items.push(ItemReport {
            item_id: item.id.clone(),
            action: action.kind,
            outcome: Some(result.outcome),
            prior: result.prior,
            new_value: action.new_value.clone(),
            reason: action.reason.clone(),
        });
    }

    let status = if fatal.is_some() && !mutated {
        RunStatus::AbortedBeforeApply
    } else {
        RunStatus::derive(outcomes.values(), dispatched && gate.is_none())
    };
    let completed_at = if fatal.is_none() {
        match writer.complete(status) {
            Ok(ts) => ts,
            Err(e) => {
                errors.push(e.to_string());
                now_iso()
            }
        }
    } else {
        drop(writer);
        now_iso()
    };

    let report = RunReport {
        run_id: Some(run_id),
        host_id: host.id.clone(),
        plan_id: Some(pid),
        status,
        dry_run: false,
        rollback_of: None,
        started_at,
        completed_at: Some(completed_at),
        duration_ms: u64::try_from(t0.elapsed().as_millis()).unwrap_or(u64::MAX),
        items,
        errors,
    };
    finish(api, &slog, &report);
    Ok(report)
}
