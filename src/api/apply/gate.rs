//! Pre-apply gates: conditions under which a planned pass stops before any dispatch.
use log::Level;
use serde_json::json;

use crate::api::errors::{exit_code_for, id_str, ErrorId};
use crate::api::Hardline;
use crate::logging::{AuditSink, FactsEmitter, StageLogger};
use crate::types::{ActionKind, Host, Plan};

/// Returns the abort reason, or `None` when applying may proceed.
///
/// Confirmation is only asked for plans that would change something. A policy that
/// requires confirmation with no `Confirmer` configured fails closed.
pub(crate) fn check<E: FactsEmitter, A: AuditSink>(
    api: &Hardline<E, A>,
    host: &Host,
    plan: &Plan,
    every_probe_failed: bool,
    slog: &StageLogger<'_>,
) -> Option<String> {
    if every_probe_failed {
        let msg = "every item failed to probe".to_string();
        api.audit.log(Level::Error, &format!("apply: {}: {msg}", host.id));
        slog.apply_attempt()
            .merge(json!({
                "error": msg,
                "error_id": id_str(ErrorId::E_PROBE),
                "exit_code": exit_code_for(ErrorId::E_PROBE),
            }))
            .emit_failure();
        return Some(msg);
    }
    if !api.policy.confirm_before_apply || !plan.has_mutations() {
        return None;
    }
    let changes = plan.count(ActionKind::Create) + plan.count(ActionKind::Modify);
    let (confirmed, msg) = match &api.confirmer {
        None => (false, "confirmation required but no confirmer is configured"),
        Some(c) if c.confirm(&host.id, plan) => (true, "confirmed"),
        Some(_) => (false, "confirmation declined"),
    };
    let ev = slog
        .confirm()
        .merge(json!({ "changes": changes, "detail": msg }));
    if confirmed {
        ev.emit_success();
        None
    } else {
        api.audit.log(Level::Warn, &format!("apply: {}: {msg}", host.id));
        ev.merge(json!({
            "error_id": id_str(ErrorId::E_ABORTED),
            "exit_code": exit_code_for(ErrorId::E_ABORTED),
        }))
        .emit_failure();
        Some(msg.to_string())
    }
}
