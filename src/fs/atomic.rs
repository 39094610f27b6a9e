//! Atomic file replacement primitives.
//!
//! This module implements a TOCTOU-safe sequence using directory handles:
//! `open_dir_nofollow(parent) -> openat(tmp, O_EXCL) -> write + fsync -> renameat(tmp, final) -> fsync(dirfd)`.
//!
//! Readers observe either the old contents or the new contents, never a mix. A crash at any
//! point before `renameat` leaves the original file untouched; at worst a stray temporary
//! named `.{fname}.{pid}.{ctr}{TMP_SUFFIX}` remains in the directory.
use std::ffi::CString;
use std::io::Write as _;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use rustix::fd::OwnedFd;
use rustix::fs::{fchmod, openat, renameat, unlinkat, AtFlags, Mode, OFlags, CWD};
use rustix::io::Errno;

use crate::constants::TMP_SUFFIX;

fn errno_to_io(e: Errno) -> std::io::Error {
    std::io::Error::from_raw_os_error(e.raw_os_error())
}

fn invalid(msg: &'static str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidInput, msg)
}

// Global counter to produce unique temporary names within a process.
static NEXT_TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Simulated interruption points, used to prove that an interrupted write leaves the
/// target in its prior state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    /// Stop after writing half of the new contents to the temporary file.
    AfterPartialWrite,
    /// Stop after the temporary file is complete and synced but before the rename.
    BeforeRename,
}

/// Metadata applied to the staged file before it replaces the target.
#[derive(Clone, Copy, Debug, Default)]
pub struct WriteOptions {
    pub mode: Option<u32>,
    pub owner: Option<(u32, u32)>,
    pub fault: Option<Fault>,
}

/// Open a directory with `O_DIRECTORY` | `O_NOFOLLOW` for atomic operations.
///
/// # Errors
///
/// Returns an IO error if the directory cannot be opened.
pub fn open_dir_nofollow(dir: &Path) -> std::io::Result<OwnedFd> {
    let c = CString::new(dir.as_os_str().as_bytes()).map_err(|_| invalid("invalid path"))?;
    openat(
        CWD,
        c.as_c_str(),
        OFlags::RDONLY | OFlags::DIRECTORY | OFlags::CLOEXEC | OFlags::NOFOLLOW,
        Mode::empty(),
    )
    .map_err(errno_to_io)
}

/// Fsync a directory using an already-open directory file descriptor.
///
/// This avoids a TOCTOU window from re-opening the directory by path.
fn fsync_dirfd(dirfd: &OwnedFd) -> std::io::Result<()> {
    rustix::fs::fsync(dirfd).map_err(errno_to_io)
}

fn split(target: &Path) -> std::io::Result<(&Path, CString)> {
    let parent = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let name = target.file_name().ok_or_else(|| invalid("target has no file name"))?;
    let name_c = CString::new(name.as_bytes()).map_err(|_| invalid("invalid file name"))?;
    Ok((parent, name_c))
}

/// Atomically replace (or create) `target` with `contents`.
///
/// Returns the time in milliseconds spent in rename plus directory fsync.
///
/// # Errors
///
/// Returns an IO error if staging, renaming or syncing fails; the target is unchanged in
/// every error case.
pub fn atomic_write(target: &Path, contents: &[u8], opts: WriteOptions) -> std::io::Result<u64> {
    let (parent, name_c) = split(target)?;
    let fname = target.file_name().and_then(|s| s.to_str()).unwrap_or("target");
    let pid = std::process::id();
    let ctr = NEXT_TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(".{fname}.{pid}.{ctr}{TMP_SUFFIX}");
    let tmp_c = CString::new(tmp_name.as_str()).map_err(|_| invalid("invalid cstring"))?;

    let dirfd = open_dir_nofollow(parent)?;
    let mode = opts.mode.unwrap_or(0o600) & 0o7777;
    let fd = openat(
        &dirfd,
        tmp_c.as_c_str(),
        OFlags::WRONLY | OFlags::CREATE | OFlags::EXCL | OFlags::CLOEXEC | OFlags::NOFOLLOW,
        Mode::from_raw_mode(mode),
    )
    .map_err(errno_to_io)?;

    let staged = stage(fd, contents, mode, &opts);
    match staged {
        Ok(()) => {}
        Err(e) if opts.fault.is_some() && e.kind() == std::io::ErrorKind::Interrupted => {
            // Simulated crash: leave the temporary behind exactly as a dead process would.
            return Err(e);
        }
        Err(e) => {
            let _ = unlinkat(&dirfd, tmp_c.as_c_str(), AtFlags::empty());
            return Err(e);
        }
    }

    let t0 = Instant::now();
    if let Err(e) = renameat(&dirfd, tmp_c.as_c_str(), &dirfd, name_c.as_c_str()) {
        let _ = unlinkat(&dirfd, tmp_c.as_c_str(), AtFlags::empty());
        return Err(errno_to_io(e));
    }
    fsync_dirfd(&dirfd)?;
    Ok(u64::try_from(t0.elapsed().as_millis()).unwrap_or(u64::MAX))
}

fn stage(fd: OwnedFd, contents: &[u8], mode: u32, opts: &WriteOptions) -> std::io::Result<()> {
    // chmod explicitly: the creation mode is filtered through the umask.
    fchmod(&fd, Mode::from_raw_mode(mode)).map_err(errno_to_io)?;
    if let Some((uid, gid)) = opts.owner {
        match std::os::unix::fs::fchown(&fd, Some(uid), Some(gid)) {
            Ok(()) => {}
            // Unprivileged callers can only keep their own ownership; that is not an error
            // when the original file was theirs.
            Err(e)
                if e.raw_os_error() == Some(libc::EPERM)
                    && uid == rustix::process::geteuid().as_raw() => {}
            Err(e) => return Err(e),
        }
    }
    let mut file = std::fs::File::from(fd);
    if opts.fault == Some(Fault::AfterPartialWrite) {
        file.write_all(&contents[..contents.len() / 2])?;
        return Err(std::io::Error::new(
            std::io::ErrorKind::Interrupted,
            "injected fault after partial write",
        ));
    }
    file.write_all(contents)?;
    file.sync_all()?;
    if opts.fault == Some(Fault::BeforeRename) {
        return Err(std::io::Error::new(
            std::io::ErrorKind::Interrupted,
            "injected fault before rename",
        ));
    }
    Ok(())
}

/// Remove `target` and fsync its directory. A missing target is not an error.
///
/// # Errors
///
/// Returns an IO error if the directory cannot be opened or the unlink fails.
pub fn remove_file_durable(target: &Path) -> std::io::Result<()> {
    let (parent, name_c) = split(target)?;
    let dirfd = open_dir_nofollow(parent)?;
    match unlinkat(&dirfd, name_c.as_c_str(), AtFlags::empty()) {
        Ok(()) => fsync_dirfd(&dirfd),
        Err(e) if e == Errno::NOENT => Ok(()),
        Err(e) => Err(errno_to_io(e)),
    }
}
