use crate::types::plan::ApplyMode;
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub const TS_ZERO: &str = "1970-01-01T00:00:00Z";

pub fn now_iso() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_else(|_| TS_ZERO.to_string())
}

/// Return a timestamp for facts emission based on mode.
/// - DryRun: constant zero timestamp for determinism.
/// - Commit: real, current timestamp in RFC3339.
pub fn ts_for_mode(mode: &ApplyMode) -> String {
    match mode {
        ApplyMode::DryRun => TS_ZERO.to_string(),
        ApplyMode::Commit => now_iso(),
    }
}

/// Milliseconds between two RFC 3339 timestamps, 0 when either does not parse.
pub fn millis_between(start: &str, end: &str) -> u64 {
    let parse = |s: &str| OffsetDateTime::parse(s, &Rfc3339).ok();
    match (parse(start), parse(end)) {
        (Some(a), Some(b)) => u64::try_from((b - a).whole_milliseconds()).unwrap_or(0),
        _ => 0,
    }
}

/// Apply redactions to a fact event for comparison and safe logging.
/// Zeroes timestamps and removes fields that vary between otherwise identical runs.
pub fn redact_event(mut v: Value) -> Value {
    if let Some(obj) = v.as_object_mut() {
        obj.insert("ts".into(), Value::String(TS_ZERO.to_string()));
        obj.remove("duration_ms");
        obj.remove("lock_wait_ms");
        obj.remove("fsync_ms");
        // Content hashes are kept in raw logs only.
        obj.remove("before_hash");
        obj.remove("after_hash");
        obj.remove("hash_alg");
    }
    v
}
