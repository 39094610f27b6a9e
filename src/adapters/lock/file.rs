use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use crate::constants::LOCK_POLL_MS;
use crate::types::errors::{Error, ErrorKind, Result};
use fs2::FileExt;

use super::{LockGuard, LockManager};

/// Advisory `flock` on a sidecar file, polled until a deadline.
#[derive(Debug)]
pub struct FileLockManager {
    path: PathBuf,
}

impl FileLockManager {
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

struct FileGuard {
    file: File,
}

impl Drop for FileGuard {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

impl LockGuard for FileGuard {}

impl FileLockManager {
    fn holder(&self) -> Option<u32> {
        std::fs::read_to_string(&self.path).ok()?.trim().parse().ok()
    }
}

impl LockManager for FileLockManager {
    fn acquire(&self, timeout_ms: u64) -> Result<Box<dyn LockGuard>> {
        let io = |e: std::io::Error| Error {
            kind: ErrorKind::Io,
            msg: format!("{}: {e}", self.path.display()),
        };
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.path)
            .map_err(io)?;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => break,
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                    if Instant::now() >= deadline {
                        let by = self
                            .holder()
                            .map_or_else(String::new, |pid| format!(" (held by pid {pid})"));
                        return Err(Error {
                            kind: ErrorKind::Locking,
                            msg: format!(
                                "timeout after {timeout_ms} ms acquiring {}{by}",
                                self.path.display()
                            ),
                        });
                    }
                    thread::sleep(Duration::from_millis(LOCK_POLL_MS));
                }
                Err(e) => return Err(io(e)),
            }
        }
        // Best effort; the flock is what excludes other writers.
        let _ = file
            .set_len(0)
            .and_then(|()| writeln!(file, "{}", std::process::id()));
        Ok(Box::new(FileGuard { file }))
    }
}
