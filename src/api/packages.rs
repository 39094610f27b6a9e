//! Package operations. Outcomes are recorded as `packages` facts; nothing is journaled,
//! because package changes cannot be reversed from a snapshot.
use log::Level;
use serde::Serialize;
use serde_json::json;

use crate::adapters::{
    AptPackageManager, InstalledPackage, PackageManager, UpdateOutcome, VerifyOutcome,
};
use crate::api::errors::{action_error_id, exit_code_for, id_str, ApiError};
use crate::api::plan::audit_ctx;
use crate::api::Hardline;
use crate::logging::{AuditSink, FactsEmitter, StageLogger};
use crate::types::Host;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PackageCommand {
    List,
    Update,
    Verify,
}

impl PackageCommand {
    const fn as_str(self) -> &'static str {
        match self {
            PackageCommand::List => "list",
            PackageCommand::Update => "update",
            PackageCommand::Verify => "verify",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum PackageResult {
    List { packages: Vec<InstalledPackage> },
    Update(UpdateOutcome),
    Verify(VerifyOutcome),
}

pub(crate) fn run<E: FactsEmitter, A: AuditSink>(
    api: &Hardline<E, A>,
    host: &Host,
    cmd: PackageCommand,
) -> Result<PackageResult, ApiError> {
    let fallback;
    let pm: &dyn PackageManager = if let Some(p) = &api.packages {
        p.as_ref()
    } else {
        if !host.is_live() {
            return Err(ApiError::PolicyViolation(format!(
                "package operations need the live root, not {}",
                host.root.display()
            )));
        }
        fallback = AptPackageManager::new(api.commands.clone(), api.policy.action_timeout());
        &fallback
    };
    if cmd == PackageCommand::Update && api.policy.dry_run {
        return Err(ApiError::PolicyViolation(
            "package updates are disabled in dry-run mode".into(),
        ));
    }

    let tctx = audit_ctx(api, &host.id, String::new(), false);
    let slog = StageLogger::new(&tctx);
    let res = match cmd {
        PackageCommand::List => pm
            .query_installed()
            .map(|packages| PackageResult::List { packages }),
        PackageCommand::Update => pm.apply_security_updates().map(PackageResult::Update),
        PackageCommand::Verify => pm.verify_integrity().map(PackageResult::Verify),
    };
    match res {
        Ok(r) => {
            let detail = match &r {
                PackageResult::List { packages } => json!({ "installed": packages.len() }),
                PackageResult::Update(u) => json!(u),
                PackageResult::Verify(v) => json!(v),
            };
            let ev = slog
                .packages()
                .merge(json!({ "command": cmd.as_str() }))
                .merge(detail);
            if matches!(r, PackageResult::Verify(VerifyOutcome::Modified { .. })) {
                api.audit
                    .log(Level::Warn, &format!("packages: {}: integrity check found changes", host.id));
                ev.emit_warn();
            } else {
                if let PackageResult::Update(UpdateOutcome::Updated { upgraded }) = &r {
                    api.audit
                        .log(Level::Info, &format!("packages: {}: upgraded {upgraded}", host.id));
                }
                ev.emit_success();
            }
            Ok(r)
        }
        Err(e) => {
            let id = action_error_id(&e);
            api.audit
                .log(Level::Error, &format!("packages {}: {e}", cmd.as_str()));
            slog.packages()
                .merge(json!({
                    "command": cmd.as_str(),
                    "error": e.to_string(),
                    "error_id": id_str(id),
                    "exit_code": exit_code_for(id),
                }))
                .emit_failure();
            Err(ApiError::Package(e))
        }
    }
}
