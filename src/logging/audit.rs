// Audit helpers that emit facts across Hardline stages.
//
// Side-effects:
// - Emits JSON facts via `FactsEmitter` for every orchestrator stage (see `Stage`).
// - Ensures a minimal envelope is present on every fact: `schema_version`, `ts`, `plan_id`,
//   `run_id`, `host_id`, `item_id`, `dry_run`.
// - Applies redaction in dry-run to zero timestamps and drop volatile fields.
use crate::logging::{redact_event, FactsEmitter};
use serde_json::{json, Value};

pub(crate) const SCHEMA_VERSION: i64 = 1;

#[derive(Clone, Debug, Default)]
pub(crate) struct AuditMode {
    pub dry_run: bool,
    pub redact: bool,
}

pub(crate) struct AuditCtx<'a> {
    pub facts: &'a dyn FactsEmitter,
    pub plan_id: String,
    pub run_id: Option<String>,
    pub host_id: String,
    pub ts: String,
    pub mode: AuditMode,
}

impl<'a> AuditCtx<'a> {
    pub(crate) fn new(
        facts: &'a dyn FactsEmitter,
        host_id: impl Into<String>,
        plan_id: String,
        ts: String,
        mode: AuditMode,
    ) -> Self {
        Self {
            facts,
            plan_id,
            run_id: None,
            host_id: host_id.into(),
            ts,
            mode,
        }
    }

    pub(crate) fn with_run(mut self, run_id: impl ToString) -> Self {
        self.run_id = Some(run_id.to_string());
        self
    }
}

/// Stage for typed audit emission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Load,
    Probe,
    Plan,
    Confirm,
    ApplyAttempt,
    ApplyResult,
    Rollback,
    RollbackSummary,
    Report,
    Packages,
}

impl Stage {
    pub const fn as_event(&self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::Probe => "probe",
            Stage::Plan => "plan",
            Stage::Confirm => "confirm",
            Stage::ApplyAttempt => "apply.attempt",
            Stage::ApplyResult => "apply.result",
            Stage::Rollback => "rollback",
            Stage::RollbackSummary => "rollback.summary",
            Stage::Report => "report",
            Stage::Packages => "packages",
        }
    }
}

/// Decision severity for audit events.
#[derive(Clone, Copy, Debug)]
pub enum Decision {
    Success,
    Failure,
    Warn,
}

impl Decision {
    const fn as_str(&self) -> &'static str {
        match self {
            Decision::Success => "success",
            Decision::Failure => "failure",
            Decision::Warn => "warn",
        }
    }
}

/// Builder facade over audit emission with centralized envelope+redaction.
pub struct StageLogger<'a> {
    ctx: &'a AuditCtx<'a>,
}

impl<'a> StageLogger<'a> {
    pub(crate) fn new(ctx: &'a AuditCtx<'a>) -> Self {
        Self { ctx }
    }

    pub fn stage(&self, stage: Stage) -> EventBuilder<'a> {
        EventBuilder::new(self.ctx, stage)
    }

    pub fn load(&self) -> EventBuilder<'a> { self.stage(Stage::Load) }
    pub fn probe(&self) -> EventBuilder<'a> { self.stage(Stage::Probe) }
    pub fn plan(&self) -> EventBuilder<'a> { self.stage(Stage::Plan) }
    pub fn confirm(&self) -> EventBuilder<'a> { self.stage(Stage::Confirm) }
    pub fn apply_attempt(&self) -> EventBuilder<'a> { self.stage(Stage::ApplyAttempt) }
    pub fn apply_result(&self) -> EventBuilder<'a> { self.stage(Stage::ApplyResult) }
    pub fn rollback(&self) -> EventBuilder<'a> { self.stage(Stage::Rollback) }
    pub fn rollback_summary(&self) -> EventBuilder<'a> { self.stage(Stage::RollbackSummary) }
    pub fn report(&self) -> EventBuilder<'a> { self.stage(Stage::Report) }
    pub fn packages(&self) -> EventBuilder<'a> { self.stage(Stage::Packages) }
}

pub struct EventBuilder<'a> {
    ctx: &'a AuditCtx<'a>,
    stage: Stage,
    fields: serde_json::Map<String, Value>,
}

impl<'a> EventBuilder<'a> {
    fn new(ctx: &'a AuditCtx<'a>, stage: Stage) -> Self {
        let mut fields = serde_json::Map::new();
        fields.insert("stage".to_string(), json!(stage.as_event()));
        Self { ctx, stage, fields }
    }

    pub fn item(mut self, item_id: impl Into<String>) -> Self {
        self.fields.insert("item_id".into(), json!(item_id.into()));
        self
    }

    pub fn action(mut self, action_id: impl Into<String>) -> Self {
        self.fields.insert("action_id".into(), json!(action_id.into()));
        self
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.fields.insert("target".into(), json!(target.into()));
        self
    }

    pub fn field(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }

    pub fn merge(mut self, extra: Value) -> Self {
        if let Value::Object(obj) = extra {
            for (k, v) in obj {
                self.fields.insert(k, v);
            }
        }
        self
    }

    pub fn emit(self, decision: Decision) {
        let mut fields = Value::Object(self.fields);
        if let Some(obj) = fields.as_object_mut() {
            obj.entry("decision").or_insert(json!(decision.as_str()));
        }
        redact_and_emit(self.ctx, "hardline", self.stage.as_event(), decision.as_str(), fields);
    }

    pub fn emit_success(self) { self.emit(Decision::Success) }
    pub fn emit_failure(self) { self.emit(Decision::Failure) }
    pub fn emit_warn(self) { self.emit(Decision::Warn) }
}

fn redact_and_emit(
    ctx: &AuditCtx,
    subsystem: &str,
    event: &str,
    decision: &str,
    mut fields: Value,
) {
    // Ensure minimal envelope fields
    if let Some(obj) = fields.as_object_mut() {
        obj.entry("schema_version").or_insert(json!(SCHEMA_VERSION));
        obj.entry("ts").or_insert(json!(ctx.ts));
        obj.entry("plan_id").or_insert(json!(ctx.plan_id));
        obj.entry("run_id").or_insert(json!(ctx.run_id));
        obj.entry("host_id").or_insert(json!(ctx.host_id));
        obj.entry("item_id").or_insert(json!(""));
        obj.entry("dry_run").or_insert(json!(ctx.mode.dry_run));
    }
    // Apply redaction policy in dry-run or when requested
    let out = if ctx.mode.redact {
        redact_event(fields)
    } else {
        fields
    };
    ctx.facts.emit(subsystem, event, decision, out);
}
