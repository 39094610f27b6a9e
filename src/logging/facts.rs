use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use log::Level;
use serde_json::{json, Value};

/// Receives structured facts. Shared across fleet worker threads.
pub trait FactsEmitter: Send + Sync {
    fn emit(&self, subsystem: &str, event: &str, decision: &str, fields: Value);
}

/// Receives human-oriented audit lines.
pub trait AuditSink: Send + Sync {
    fn log(&self, level: Level, msg: &str);
}

/// Appends one JSON object per fact to a file. Built with `default()` it forwards each fact
/// to the `log` facade at debug level under the `hardline::facts` target.
#[derive(Default)]
pub struct JsonlSink {
    file: Option<Mutex<File>>,
}

impl JsonlSink {
    /// Append to `path`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file cannot be opened for appending.
    pub fn to_file(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Some(Mutex::new(file)),
        })
    }
}

impl FactsEmitter for JsonlSink {
    fn emit(&self, subsystem: &str, event: &str, decision: &str, fields: Value) {
        let mut line = json!({
            "subsystem": subsystem,
            "event": event,
            "decision": decision,
        });
        if let (Some(obj), Value::Object(extra)) = (line.as_object_mut(), fields) {
            for (k, v) in extra {
                obj.entry(k).or_insert(v);
            }
        }
        let Some(file) = &self.file else {
            log::debug!(target: "hardline::facts", "{line}");
            return;
        };
        let mut s = line.to_string();
        s.push('\n');
        if let Ok(mut f) = file.lock() {
            if let Err(e) = f.write_all(s.as_bytes()) {
                log::warn!("facts sink write failed: {e}");
            }
        }
    }
}

/// Forwards audit lines to the `log` facade under the `hardline::audit` target.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogAudit;

impl AuditSink for LogAudit {
    fn log(&self, level: Level, msg: &str) {
        log::log!(target: "hardline::audit", level, "{msg}");
    }
}
