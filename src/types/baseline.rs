//! Typed desired-state model: a [`Baseline`] is an ordered set of [`BaselineItem`]s.
//!
//! Items are kept in declaration order; that order is the stable tie-break used when
//! dependencies are sorted.
use std::fmt;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::safepath::SafePath;
use super::value::Value;
use crate::constants::SYSCTL_PREFIX;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    #[serde(alias = "key_value_setting")]
    KeyValueSetting,
    #[serde(alias = "file_edit_rule")]
    FileEditRule,
    #[serde(alias = "service_state")]
    ServiceState,
    #[serde(alias = "permission_rule")]
    PermissionRule,
}

impl ItemKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ItemKind::KeyValueSetting => "KeyValueSetting",
            ItemKind::FileEditRule => "FileEditRule",
            ItemKind::ServiceState => "ServiceState",
            ItemKind::PermissionRule => "PermissionRule",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resource locator of an item.
///
/// Serialized in its baseline spelling: `/etc/x` for files, `sysctl:a.b` for kernel
/// parameters, a bare unit name for services.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Target {
    /// A file confined under the host root.
    File(SafePath),
    /// A kernel parameter in dotted form, e.g. `net.ipv4.ip_forward`.
    Sysctl(String),
    /// A service unit name, e.g. `ssh` or `auditd.service`.
    Service(String),
}

impl TryFrom<String> for Target {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        if let Some(key) = s.strip_prefix(SYSCTL_PREFIX) {
            Ok(Target::Sysctl(key.to_string()))
        } else if s.starts_with('/') {
            SafePath::parse(Path::new(&s))
                .map(Target::File)
                .map_err(|e| e.msg)
        } else {
            Ok(Target::Service(s))
        }
    }
}

impl From<Target> for String {
    fn from(t: Target) -> Self {
        t.display()
    }
}

impl Target {
    /// Human-readable locator used in facts and reports.
    #[must_use]
    pub fn display(&self) -> String {
        match self {
            Target::File(p) => format!("/{}", p.rel().display()),
            Target::Sysctl(k) => format!("{SYSCTL_PREFIX}{k}"),
            Target::Service(s) => s.clone(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Separator {
    /// `Key value` (sshd_config, login.defs).
    #[default]
    Whitespace,
    /// `key = value` (sysctl.conf, many INI-like files).
    Equals,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineState {
    #[default]
    Present,
    Absent,
}

/// A compiled `match` expression of a file edit rule.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LinePattern {
    source: String,
    re: Regex,
}

impl LinePattern {
    /// # Errors
    ///
    /// Returns the regex compilation error message when `source` is not a valid expression.
    pub fn new(source: &str) -> std::result::Result<Self, String> {
        let re = Regex::new(source).map_err(|e| e.to_string())?;
        Ok(Self {
            source: source.to_string(),
            re,
        })
    }

    #[must_use]
    pub fn is_match(&self, line: &str) -> bool {
        self.re.is_match(line)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl PartialEq for LinePattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for LinePattern {}

impl TryFrom<String> for LinePattern {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        Self::new(&s)
    }
}

impl From<LinePattern> for String {
    fn from(p: LinePattern) -> Self {
        p.source
    }
}

/// Desired value, typed per kind. Validated at load so that it always matches the item kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Desired {
    Setting {
        /// `None` for sysctl targets, where the target itself names the key.
        key: Option<String>,
        separator: Separator,
        value: String,
    },
    Line {
        line: String,
        state: LineState,
        pattern: Option<LinePattern>,
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

/// One desired-state assertion. Journaled with every run so rollback does not depend on
/// the baseline file still being around.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineItem {
    pub id: String,
    pub kind: ItemKind,
    pub target: Target,
    pub desired: Desired,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl BaselineItem {
    /// The semantic value the target must converge to.
    #[must_use]
    pub fn desired_value(&self) -> Value {
        match &self.desired {
            Desired::Setting { value, .. } => Value::Setting {
                value: Some(value.clone()),
            },
            Desired::Line { line, state, .. } => Value::Lines {
                lines: match state {
                    LineState::Present => vec![line.clone()],
                    LineState::Absent => Vec::new(),
                },
            },
            Desired::Service { enabled, running } => Value::Service {
                enabled: *enabled,
                running: *running,
            },
            Desired::Permission { mode, uid, gid } => Value::Permission {
                mode: *mode,
                uid: *uid,
                gid: *gid,
            },
        }
    }

    /// Whether an absent target may be brought into existence by applying this item.
    #[must_use]
    pub fn can_create(&self) -> bool {
        match (&self.kind, &self.target) {
            (ItemKind::KeyValueSetting, Target::File(_)) => true,
            (ItemKind::FileEditRule, Target::File(_)) => {
                matches!(self.desired, Desired::Line { state: LineState::Present, .. })
            }
            _ => false,
        }
    }
}

/// A validated, read-only baseline document.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Baseline {
    pub version: u32,
    pub items: Vec<BaselineItem>,
}

impl Baseline {
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&BaselineItem> {
        self.items.iter().find(|i| i.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
