//! On-disk baseline document shape and per-kind conversion into typed items.
use std::path::Path;

use serde::Deserialize;

use crate::constants::SYSCTL_PREFIX;
use crate::types::errors::ParseError;
use crate::types::{
    BaselineItem, Desired, ItemKind, LinePattern, LineState, SafePath, Separator, Target,
};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawBaseline {
    pub version: u32,
    #[serde(default)]
    pub items: Vec<RawItem>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawItem {
    pub id: String,
    pub kind: ItemKind,
    pub target: String,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub separator: Option<Separator>,
    #[serde(alias = "desiredValue", alias = "desired_value")]
    pub desired: serde_yaml::Value,
    #[serde(default, alias = "dependsOn")]
    pub depends_on: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLine {
    line: String,
    #[serde(default)]
    state: LineState,
    #[serde(default, rename = "match")]
    pattern: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawService {
    #[serde(default)]
    enabled: Option<bool>,
    #[serde(default)]
    running: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPermission {
    #[serde(default)]
    mode: Option<serde_yaml::Value>,
    #[serde(default)]
    uid: Option<u32>,
    #[serde(default)]
    gid: Option<u32>,
}

fn mismatch(item: &str, reason: impl Into<String>) -> ParseError {
    ParseError::ValueMismatch {
        item: item.to_string(),
        reason: reason.into(),
    }
}

fn bad_target(item: &str, reason: impl Into<String>) -> ParseError {
    ParseError::InvalidTarget {
        item: item.to_string(),
        reason: reason.into(),
    }
}

fn file_target(item: &str, raw: &str) -> Result<Target, ParseError> {
    SafePath::parse(Path::new(raw))
        .map(Target::File)
        .map_err(|e| bad_target(item, format!("{raw}: {}", e.msg)))
}

fn scalar_string(v: &serde_yaml::Value) -> Option<String> {
    match v {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Parse an octal permission mode. Integers are read digit-wise (`640` means `0o640`).
fn parse_mode(item: &str, v: &serde_yaml::Value) -> Result<u32, ParseError> {
    let s = scalar_string(v).ok_or_else(|| mismatch(item, "mode must be an octal string"))?;
    let digits = s.trim().trim_start_matches("0o");
    let mode = u32::from_str_radix(digits, 8)
        .map_err(|_| mismatch(item, format!("invalid octal mode `{s}`")))?;
    if mode > 0o7777 {
        return Err(mismatch(item, format!("mode `{s}` out of range")));
    }
    Ok(mode)
}

fn valid_key(key: &str) -> bool {
    !key.is_empty() && !key.contains(char::is_whitespace) && !key.contains('=') && !key.starts_with('#')
}

fn valid_sysctl_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('.')
        && !key.contains("..")
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '/'))
}

fn valid_unit(unit: &str) -> bool {
    !unit.is_empty() && !unit.starts_with('-') && !unit.contains('/') && !unit.contains(char::is_whitespace)
}

impl RawItem {
    pub(crate) fn into_item(self) -> Result<BaselineItem, ParseError> {
        let id = self.id;
        if id.trim().is_empty() {
            return Err(ParseError::Syntax("item id must not be empty".into()));
        }
        if self.kind != ItemKind::KeyValueSetting && (self.key.is_some() || self.separator.is_some()) {
            return Err(mismatch(&id, "`key` and `separator` only apply to KeyValueSetting"));
        }
        let (target, desired) = match self.kind {
            ItemKind::KeyValueSetting => {
                let value = scalar_string(&self.desired)
                    .ok_or_else(|| mismatch(&id, "KeyValueSetting expects a scalar value"))?;
                if value.contains('\n') {
                    return Err(mismatch(&id, "value must be a single line"));
                }
                if let Some(key) = self.target.strip_prefix(SYSCTL_PREFIX) {
                    if !valid_sysctl_key(key) {
                        return Err(bad_target(&id, format!("invalid kernel parameter `{key}`")));
                    }
                    if self.key.is_some() {
                        return Err(mismatch(&id, "sysctl targets must not set `key`"));
                    }
                    (
                        Target::Sysctl(key.replace('/', ".")),
                        Desired::Setting {
                            key: None,
                            separator: Separator::Equals,
                            value,
                        },
                    )
                } else {
                    let key = self
                        .key
                        .ok_or_else(|| mismatch(&id, "file settings require `key`"))?;
                    if !valid_key(&key) {
                        return Err(mismatch(&id, format!("invalid key `{key}`")));
                    }
                    (
                        file_target(&id, &self.target)?,
                        Desired::Setting {
                            key: Some(key),
                            separator: self.separator.unwrap_or_default(),
                            value,
                        },
                    )
                }
            }
            ItemKind::FileEditRule => {
                let raw: RawLine = serde_yaml::from_value(self.desired)
                    .map_err(|e| mismatch(&id, format!("FileEditRule expects {{line, state, match}}: {e}")))?;
                if raw.line.contains('\n') {
                    return Err(mismatch(&id, "line must not contain a newline"));
                }
                let pattern = raw
                    .pattern
                    .as_deref()
                    .map(LinePattern::new)
                    .transpose()
                    .map_err(|e| mismatch(&id, format!("invalid match expression: {e}")))?;
                (
                    file_target(&id, &self.target)?,
                    Desired::Line {
                        line: raw.line,
                        state: raw.state,
                        pattern,
                    },
                )
            }
            ItemKind::ServiceState => {
                let raw = service_shorthand(&self.desired).map_or_else(
                    || {
                        serde_yaml::from_value::<RawService>(self.desired.clone())
                            .map_err(|e| mismatch(&id, format!("ServiceState expects {{enabled, running}}: {e}")))
                    },
                    Ok,
                )?;
                if raw.enabled.is_none() && raw.running.is_none() {
                    return Err(mismatch(&id, "ServiceState needs `enabled` or `running`"));
                }
                if !valid_unit(&self.target) {
                    return Err(bad_target(&id, format!("invalid unit name `{}`", self.target)));
                }
                (
                    Target::Service(self.target),
                    Desired::Service {
                        enabled: raw.enabled,
                        running: raw.running,
                    },
                )
            }
            ItemKind::PermissionRule => {
                let raw: RawPermission = serde_yaml::from_value(self.desired)
                    .map_err(|e| mismatch(&id, format!("PermissionRule expects {{mode, uid, gid}}: {e}")))?;
                let mode = raw.mode.as_ref().map(|m| parse_mode(&id, m)).transpose()?;
                if mode.is_none() && raw.uid.is_none() && raw.gid.is_none() {
                    return Err(mismatch(&id, "PermissionRule needs `mode`, `uid` or `gid`"));
                }
                (
                    file_target(&id, &self.target)?,
                    Desired::Permission {
                        mode,
                        uid: raw.uid,
                        gid: raw.gid,
                    },
                )
            }
        };
        Ok(BaselineItem {
            id,
            kind: self.kind,
            target,
            desired,
            depends_on: self.depends_on,
        })
    }
}

/// `running`, `stopped`, `enabled`, `disabled` as scalar shorthands.
fn service_shorthand(v: &serde_yaml::Value) -> Option<RawService> {
    let s = v.as_str()?;
    let (enabled, running) = match s {
        "running" => (Some(true), Some(true)),
        "stopped" => (None, Some(false)),
        "enabled" => (Some(true), None),
        "disabled" => (Some(false), Some(false)),
        _ => return None,
    };
    Some(RawService { enabled, running })
}
