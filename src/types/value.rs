//! Kind-specific semantic values shared by probes, plans and journal snapshots.
use std::fmt;

use serde::{Deserialize, Serialize};

/// Observed or desired state of one target.
///
/// Optional fields of `Service` and `Permission` mean "not constrained" on the desired side;
/// probes always fill every field they can observe.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Value {
    Setting {
        value: Option<String>,
    },
    Lines {
        lines: Vec<String>,
    },
    Service {
        enabled: Option<bool>,
        running: Option<bool>,
    },
    Permission {
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
    },
}

fn field_ok<T: PartialEq>(want: Option<T>, have: Option<T>) -> bool {
    match want {
        None => true,
        Some(w) => have == Some(w),
    }
}

impl Value {
    /// Returns true when `current` meets every constraint expressed by `self`.
    #[must_use]
    pub fn satisfied_by(&self, current: &Value) -> bool {
        match (self, current) {
            (Value::Setting { value: w }, Value::Setting { value: h }) => w == h,
            (Value::Lines { lines: w }, Value::Lines { lines: h }) => w == h,
            (
                Value::Service {
                    enabled: we,
                    running: wr,
                },
                Value::Service {
                    enabled: he,
                    running: hr,
                },
            ) => field_ok(*we, *he) && field_ok(*wr, *hr),
            (
                Value::Permission {
                    mode: wm,
                    uid: wu,
                    gid: wg,
                },
                Value::Permission {
                    mode: hm,
                    uid: hu,
                    gid: hg,
                },
            ) => {
                field_ok(wm.map(|m| m & 0o7777), hm.map(|m| m & 0o7777))
                    && field_ok(*wu, *hu)
                    && field_ok(*wg, *hg)
            }
            _ => false,
        }
    }
}

fn opt<T: fmt::Display>(v: Option<T>) -> String {
    v.map_or_else(|| "-".to_string(), |v| v.to_string())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Setting { value: Some(v) } => write!(f, "{v:?}"),
            Value::Setting { value: None } => f.write_str("<unset>"),
            Value::Lines { lines } if lines.is_empty() => f.write_str("<no lines>"),
            Value::Lines { lines } => write!(f, "{lines:?}"),
            Value::Service { enabled, running } => {
                write!(f, "enabled={} running={}", opt(*enabled), opt(*running))
            }
            Value::Permission { mode, uid, gid } => write!(
                f,
                "mode={} uid={} gid={}",
                mode.map_or_else(|| "-".to_string(), |m| format!("{:04o}", m & 0o7777)),
                opt(*uid),
                opt(*gid)
            ),
        }
    }
}

/// What a probe saw: persisted in the journal as the prior-value snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub present: bool,
    pub value: Option<Value>,
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.value, self.present) {
            (Some(v), true) => write!(f, "{v}"),
            (Some(v), false) => write!(f, "{v} (absent)"),
            (None, true) => f.write_str("<unreadable>"),
            (None, false) => f.write_str("<absent>"),
        }
    }
}
