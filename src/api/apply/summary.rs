use std::time::Instant;

use log::Level;
use serde_json::json;
use uuid::Uuid;

use crate::api::errors::{id_str, ErrorId};
use crate::api::Hardline;
use crate::logging::{AuditSink, FactsEmitter, StageLogger};
use crate::types::{Host, ItemReport, Plan, RunReport, RunStatus};

/// Report of a pass that stopped after planning. Outcomes stay empty.
pub(crate) fn planned_report(
    host: &Host,
    pid: Uuid,
    plan: &Plan,
    started_at: String,
    t0: Instant,
) -> RunReport {
    RunReport {
        run_id: None,
        host_id: host.id.clone(),
        plan_id: Some(pid),
        status: RunStatus::Success,
        dry_run: true,
        rollback_of: None,
        started_at,
        completed_at: None,
        duration_ms: u64::try_from(t0.elapsed().as_millis()).unwrap_or(u64::MAX),
        items: plan
            .actions
            .iter()
            .map(|a| ItemReport {
                item_id: a.item_id.clone(),
                action: a.kind,
                outcome: None,
                prior: a.prior.clone(),
                new_value: a.new_value.clone(),
                reason: a.reason.clone(),
            })
            .collect(),
        errors: Vec::new(),
    }
}

/// Emit the `report` fact and send the alert the policy asks for.
pub(crate) fn finish<E: FactsEmitter, A: AuditSink>(
    api: &Hardline<E, A>,
    slog: &StageLogger<'_>,
    report: &RunReport,
) {
    let ev = slog.report().merge(json!({
        "status": report.status.as_str(),
        "rollback_of": report.rollback_of.map(|r| r.to_string()),
        "applied": report.count("applied"),
        "noop": report.count("noop"),
        "failed": report.count("failed"),
        "skipped": report.count("skipped"),
        "errors": report.errors,
        "duration_ms": report.duration_ms,
    }));
    match report.status {
        RunStatus::Success => ev.emit_success(),
        RunStatus::PartialFailure => ev
            .field("exit_code", json!(report.status.exit_code()))
            .emit_failure(),
        RunStatus::AbortedBeforeApply => ev
            .field("error_id", json!(id_str(ErrorId::E_ABORTED)))
            .field("exit_code", json!(report.status.exit_code()))
            .emit_failure(),
    }
    api.audit.log(
        if report.status == RunStatus::Success {
            Level::Info
        } else {
            Level::Warn
        },
        &format!(
            "report: host={} run={} status={}",
            report.host_id,
            report
                .run_id
                .map_or_else(|| "dry-run".to_string(), |r| r.to_string()),
            report.status
        ),
    );

    if report.dry_run || !api.policy.notify.on.wants(report.status) {
        return;
    }
    let Some(notifier) = &api.notifier else {
        return;
    };
    let subject = format!("hardline: {} {}", report.host_id, report.status);
    if let Err(e) = notifier.notify(&subject, &report.render_text()) {
        api.audit
            .log(Level::Warn, &format!("notify: {} not delivered: {e}", report.host_id));
    }
}
