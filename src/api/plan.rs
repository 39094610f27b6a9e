//! Loading, Probing and Planning stages. Nothing here writes to a host or the journal.
use std::collections::HashMap;

use log::Level;
use serde_json::json;

use super::errors::{exit_code_for, id_str, ApiError, ErrorId};
use super::Hardline;
use crate::logging::audit::{AuditCtx, AuditMode};
use crate::logging::{ts_for_mode, AuditSink, FactsEmitter, StageLogger};
use crate::probe::probe_all;
use crate::reconcile;
use crate::types::errors::{ParseError, ProbeError};
use crate::types::ids::{action_id, plan_id};
use crate::types::{ActionKind, ApplyMode, Baseline, Host, Plan, ProbeResult};

/// Audit context for one host. Dry runs get deterministic, redacted facts.
pub(super) fn audit_ctx<'a, E: FactsEmitter, A: AuditSink>(
    api: &'a Hardline<E, A>,
    host_id: &str,
    plan_id: String,
    dry_run: bool,
) -> AuditCtx<'a> {
    let mode = if dry_run {
        ApplyMode::DryRun
    } else {
        ApplyMode::Commit
    };
    AuditCtx::new(
        &api.facts as &dyn FactsEmitter,
        host_id,
        plan_id,
        ts_for_mode(&mode),
        AuditMode {
            dry_run,
            redact: dry_run,
        },
    )
}

pub(super) fn load<E: FactsEmitter, A: AuditSink>(
    api: &Hardline<E, A>,
    loaded: Result<Baseline, ParseError>,
) -> Result<Baseline, ApiError> {
    let tctx = audit_ctx(api, "", String::new(), api.policy.dry_run);
    let slog = StageLogger::new(&tctx);
    match loaded {
        Ok(b) => {
            slog.load()
                .merge(json!({ "version": b.version, "items": b.len() }))
                .emit_success();
            Ok(b)
        }
        Err(e) => {
            api.audit.log(Level::Error, &format!("load: {e}"));
            slog.load()
                .merge(json!({
                    "error": e.to_string(),
                    "error_id": id_str(ErrorId::E_PARSE),
                    "exit_code": exit_code_for(ErrorId::E_PARSE),
                }))
                .emit_failure();
            Err(ApiError::Parse(e))
        }
    }
}

pub(super) fn probe<E: FactsEmitter, A: AuditSink>(
    api: &Hardline<E, A>,
    baseline: &Baseline,
    host: &Host,
) -> HashMap<String, Result<ProbeResult, ProbeError>> {
    let probes = probe_all(baseline, &host.root, api.services.as_ref());
    let tctx = audit_ctx(api, &host.id, String::new(), api.policy.dry_run);
    let slog = StageLogger::new(&tctx);
    let mut failed = 0usize;
    for item in &baseline.items {
        match probes.get(&item.id) {
            Some(Ok(r)) => slog
                .probe()
                .item(&item.id)
                .target(item.target.display())
                .merge(json!({
                    "present": r.present_on_disk,
                    "readable": r.readable,
                }))
                .emit_success(),
            Some(Err(e)) => {
                failed += 1;
                api.audit.log(Level::Warn, &format!("probe: {e}"));
                slog.probe()
                    .item(&item.id)
                    .target(item.target.display())
                    .merge(json!({
                        "error": e.reason,
                        "error_id": id_str(ErrorId::E_PROBE),
                    }))
                    .emit_warn();
            }
            None => {}
        }
    }
    api.audit.log(
        Level::Info,
        &format!(
            "probe: host={} items={} failed={failed}",
            host.id,
            baseline.len()
        ),
    );
    probes
}

pub(super) fn build<E: FactsEmitter, A: AuditSink>(
    api: &Hardline<E, A>,
    baseline: &Baseline,
    host: &Host,
    probes: &HashMap<String, Result<ProbeResult, ProbeError>>,
) -> Plan {
    let plan = reconcile::plan(baseline, probes);
    let pid = plan_id(&plan);
    let tctx = audit_ctx(api, &host.id, pid.to_string(), api.policy.dry_run);
    let slog = StageLogger::new(&tctx);
    for (idx, a) in plan.actions.iter().enumerate() {
        let target = baseline
            .get(&a.item_id)
            .map(|i| i.target.display())
            .unwrap_or_default();
        let ev = slog
            .plan()
            .item(&a.item_id)
            .action(action_id(&pid, a, idx).to_string())
            .target(target)
            .merge(json!({
                "kind": a.kind.as_str(),
                "prior": a.prior,
                "new_value": a.new_value,
            }));
        if a.kind == ActionKind::Unsupported {
            let reason = a.reason.clone().unwrap_or_default();
            api.audit
                .log(Level::Warn, &format!("plan: {} unsupported: {reason}", a.item_id));
            ev.merge(json!({
                "reason": reason,
                "error_id": id_str(ErrorId::E_UNSUPPORTED),
            }))
            .emit_warn();
        } else {
            ev.emit_success();
        }
    }
    api.audit.log(
        Level::Info,
        &format!(
            "plan: host={} plan_id={pid} create={} modify={} noop={} unsupported={}",
            host.id,
            plan.count(ActionKind::Create),
            plan.count(ActionKind::Modify),
            plan.count(ActionKind::NoOp),
            plan.count(ActionKind::Unsupported),
        ),
    );
    plan
}
