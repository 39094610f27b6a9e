//! Text/file patch backend: whole-file atomic replacement and in-place metadata changes.
use std::path::Path;

use crate::constants::DEFAULT_CREATE_MODE;
use crate::fs::{atomic_write, meta_of, remove_file_durable, set_permissions, Fault, WriteOptions};
use crate::probe::{read_text, Text};
use crate::types::errors::ActionError;

/// Re-render a text file and atomically swap it in, keeping its mode and ownership.
///
/// A missing file is treated as empty and created with [`DEFAULT_CREATE_MODE`]. Returns
/// the rename+fsync duration, or `None` when the rendered text was already in place.
pub(crate) fn patch_text(
    path: &Path,
    render: impl FnOnce(&str) -> String,
    fault: Option<Fault>,
) -> Result<Option<u64>, ActionError> {
    let (old, present) = match read_text(path).map_err(ActionError::Io)? {
        Text::Absent => (String::new(), false),
        Text::Unreadable => {
            return Err(ActionError::PermissionDenied(format!(
                "{} is not readable",
                path.display()
            )))
        }
        Text::Content(s) => (s, true),
    };
    let new = render(&old);
    if present && new == old {
        return Ok(None);
    }
    let (mode, owner) = match meta_of(path)? {
        Some(m) => (m.mode, Some((m.uid, m.gid))),
        None => (DEFAULT_CREATE_MODE, None),
    };
    let ms = atomic_write(
        path,
        new.as_bytes(),
        WriteOptions {
            mode: Some(mode),
            owner,
            fault,
        },
    )?;
    Ok(Some(ms))
}

pub(crate) fn remove(path: &Path) -> Result<(), ActionError> {
    remove_file_durable(path).map_err(ActionError::from)
}

pub(crate) fn chmod_chown(
    path: &Path,
    mode: Option<u32>,
    uid: Option<u32>,
    gid: Option<u32>,
) -> Result<(), ActionError> {
    match meta_of(path)? {
        None => Err(ActionError::Unsupported(format!("{} does not exist", path.display()))),
        Some(m) if m.is_symlink => Err(ActionError::Unsupported(format!(
            "{} is a symlink",
            path.display()
        ))),
        Some(_) => set_permissions(path, mode, uid, gid).map_err(ActionError::from),
    }
}
