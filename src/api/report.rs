use serde_json::json;
use uuid::Uuid;

use crate::api::errors::{exit_code_for, id_str, ApiError};
use crate::api::plan::audit_ctx;
use crate::api::Hardline;
use crate::logging::redact::millis_between;
use crate::logging::{AuditSink, FactsEmitter, StageLogger};
use crate::types::RunReport;

/// Rebuild a report purely from journal records; the host is not consulted.
pub(crate) fn run<E: FactsEmitter, A: AuditSink>(
    api: &Hardline<E, A>,
    run_id: &Uuid,
) -> Result<RunReport, ApiError> {
    let found = api.journal().read_run(run_id);
    let run = match found {
        Ok(r) => r,
        Err(e) => {
            let err = ApiError::from(e);
            let tctx = audit_ctx(api, "", String::new(), false).with_run(run_id);
            StageLogger::new(&tctx)
                .report()
                .merge(json!({
                    "error": err.to_string(),
                    "error_id": id_str(err.id()),
                    "exit_code": exit_code_for(err.id()),
                }))
                .emit_failure();
            return Err(err);
        }
    };
    let mut report = RunReport::from_run(&run);
    if let Some(done) = &run.completed_at {
        report.duration_ms = millis_between(&run.started_at, done);
    }
    let tctx = audit_ctx(
        api,
        &run.host_id,
        run.plan_id.map(|p| p.to_string()).unwrap_or_default(),
        false,
    )
    .with_run(run_id);
    StageLogger::new(&tctx)
        .report()
        .merge(json!({
            "status": report.status.as_str(),
            "items": report.items.len(),
            "from_journal": true,
        }))
        .emit_success();
    Ok(report)
}
