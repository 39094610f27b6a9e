//! Filesystem metadata helpers used by probes and backends.
//!
//! Everything here is read-only except [`set_permissions`], which changes mode and ownership
//! in place without touching file contents.
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::Path;

use sha2::{Digest, Sha256};

/// Mode bits and ownership of a regular file as seen by `lstat`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileMeta {
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub is_symlink: bool,
}

/// Compute SHA-256 of a file at `path`, returning a lowercase hex string.
pub fn sha256_hex_of(path: &Path) -> Option<String> {
    let mut f = std::fs::File::open(path).ok()?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut f, &mut hasher).ok()?;
    let out = hasher.finalize();
    Some(hex::encode(out))
}

/// `lstat` a path. `Ok(None)` when nothing exists there.
///
/// # Errors
///
/// Any error other than `NotFound`, e.g. a permission error on a parent directory.
pub fn meta_of(path: &Path) -> std::io::Result<Option<FileMeta>> {
    match std::fs::symlink_metadata(path) {
        Ok(md) => Ok(Some(FileMeta {
            mode: md.mode() & 0o7777,
            uid: md.uid(),
            gid: md.gid(),
            is_symlink: md.file_type().is_symlink(),
        })),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Apply the given mode and ownership; `None` fields are left unchanged.
///
/// # Errors
///
/// Propagates `chmod`/`chown` failures (typically `EPERM` when not privileged).
pub fn set_permissions(
    path: &Path,
    mode: Option<u32>,
    uid: Option<u32>,
    gid: Option<u32>,
) -> std::io::Result<()> {
    if uid.is_some() || gid.is_some() {
        std::os::unix::fs::chown(path, uid, gid)?;
    }
    // chown may clear setuid/setgid bits, so the mode goes last.
    if let Some(m) = mode {
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(m & 0o7777))?;
    }
    Ok(())
}
