//! Side-effect-free reads of actual state.
//!
//! A probe never creates, locks or modifies anything. Absence is a normal observation
//! (`present_on_disk = false`); only a broken mechanism is a [`ProbeError`].
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::adapters::ServiceManager;
use crate::constants::PROC_SYS_DIR;
use crate::fs::edit::{find_setting, matching_lines};
use crate::fs::meta::meta_of;
use crate::types::errors::ProbeError;
use crate::types::{Baseline, BaselineItem, Desired, ProbeResult, Target, Value};

/// What reading a text target produced.
pub(crate) enum Text {
    Absent,
    Unreadable,
    Content(String),
}

/// Read a text target without following a final symlink.
pub(crate) fn read_text(path: &Path) -> Result<Text, String> {
    match meta_of(path) {
        Ok(None) => return Ok(Text::Absent),
        Ok(Some(m)) if m.is_symlink => {
            return Err(format!("{} is a symlink", path.display()));
        }
        Ok(Some(_)) => {}
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => return Ok(Text::Unreadable),
        Err(e) => return Err(format!("{}: {e}", path.display())),
    }
    match std::fs::read_to_string(path) {
        Ok(s) => Ok(Text::Content(s)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Text::Absent),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => Ok(Text::Unreadable),
        Err(e) => Err(format!("{}: {e}", path.display())),
    }
}

/// Path of a kernel parameter under `root`.
#[must_use]
pub fn sysctl_path(root: &Path, key: &str) -> PathBuf {
    root.join(PROC_SYS_DIR).join(key.replace('.', "/"))
}

/// Selects the lines a file edit rule owns: exact matches of `line`, plus `match` hits.
pub(crate) fn line_selector(desired: &Desired) -> impl Fn(&str) -> bool + '_ {
    move |l: &str| match desired {
        Desired::Line { line, pattern, .. } => {
            l == line || pattern.as_ref().is_some_and(|p| p.is_match(l))
        }
        _ => false,
    }
}

/// True when `path` is absent and so is the directory it would be created in.
fn parent_absent(path: &Path) -> bool {
    path.parent()
        .is_some_and(|dir| matches!(meta_of(dir), Ok(None)))
}

fn observed(
    item: &BaselineItem,
    path: &Path,
    text: Text,
    value_of: impl FnOnce(&str) -> Value,
    absent: Value,
) -> ProbeResult {
    let parent_missing = matches!(text, Text::Absent) && parent_absent(path);
    let (current_value, present_on_disk, readable) = match text {
        Text::Absent => (Some(absent), false, false),
        Text::Unreadable => (None, true, false),
        Text::Content(s) => (Some(value_of(&s)), true, true),
    };
    ProbeResult {
        item_id: item.id.clone(),
        current_value,
        present_on_disk,
        readable,
        parent_missing,
    }
}

/// Probe one item on the host mounted at `root`.
///
/// # Errors
///
/// [`ProbeError`] when the mechanism fails (service manager errors, non-text files,
/// symlinked targets), never for a merely absent resource.
pub fn probe(item: &BaselineItem, root: &Path, services: &dyn ServiceManager) -> Result<ProbeResult, ProbeError> {
    let fail = |reason: String| ProbeError {
        item_id: item.id.clone(),
        reason,
    };
    match (&item.target, &item.desired) {
        (
            Target::File(p),
            Desired::Setting {
                key: Some(key),
                separator,
                ..
            },
        ) => {
            let path = p.resolve(root);
            let text = read_text(&path).map_err(fail)?;
            Ok(observed(
                item,
                &path,
                text,
                |s| Value::Setting {
                    value: find_setting(s, key, *separator),
                },
                Value::Setting { value: None },
            ))
        }
        (Target::Sysctl(key), Desired::Setting { .. }) => {
            let path = sysctl_path(root, key);
            let text = read_text(&path).map_err(fail)?;
            Ok(observed(
                item,
                &path,
                text,
                |s| Value::Setting {
                    value: Some(s.split_whitespace().collect::<Vec<_>>().join(" ")),
                },
                Value::Setting { value: None },
            ))
        }
        (Target::File(p), d @ Desired::Line { .. }) => {
            let path = p.resolve(root);
            let text = read_text(&path).map_err(fail)?;
            let select = line_selector(d);
            Ok(observed(
                item,
                &path,
                text,
                |s| Value::Lines {
                    lines: matching_lines(s, &select),
                },
                Value::Lines { lines: Vec::new() },
            ))
        }
        (Target::File(p), Desired::Permission { .. }) => {
            let path = p.resolve(root);
            let (current_value, present_on_disk, readable) = match meta_of(&path) {
                Ok(Some(m)) if m.is_symlink => {
                    return Err(fail(format!("{} is a symlink", path.display())));
                }
                Ok(Some(m)) => (
                    Some(Value::Permission {
                        mode: Some(m.mode),
                        uid: Some(m.uid),
                        gid: Some(m.gid),
                    }),
                    true,
                    true,
                ),
                Ok(None) => (
                    Some(Value::Permission {
                        mode: None,
                        uid: None,
                        gid: None,
                    }),
                    false,
                    false,
                ),
                Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => (None, true, false),
                Err(e) => return Err(fail(format!("{}: {e}", path.display()))),
            };
            Ok(ProbeResult {
                item_id: item.id.clone(),
                current_value,
                present_on_disk,
                readable,
                parent_missing: !present_on_disk && parent_absent(&path),
            })
        }
        (Target::Service(unit), Desired::Service { .. }) => {
            let st = services
                .status(root, unit)
                .map_err(|e| fail(format!("service manager: {e}")))?;
            Ok(ProbeResult {
                item_id: item.id.clone(),
                current_value: Some(Value::Service {
                    enabled: st.enabled,
                    running: st.running,
                }),
                present_on_disk: st.present,
                readable: st.present,
                parent_missing: false,
            })
        }
        _ => Err(fail(format!(
            "{} cannot target {}",
            item.kind,
            item.target.display()
        ))),
    }
}

/// Probe every item, keyed by item id. Failures stay scoped to their item.
pub fn probe_all(
    baseline: &Baseline,
    root: &Path,
    services: &dyn ServiceManager,
) -> HashMap<String, Result<ProbeResult, ProbeError>> {
    baseline
        .items
        .iter()
        .map(|it| (it.id.clone(), probe(it, root, services)))
        .collect()
}
