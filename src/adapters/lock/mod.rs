pub mod file;

pub use file::FileLockManager;

use crate::types::errors::Result;

/// Held for as long as the lock should be; dropping it releases the lock.
pub trait LockGuard: Send {}

pub trait LockManager: Send + Sync {
    /// Acquire an exclusive lock, waiting at most `timeout_ms`.
    /// # Errors
    /// Returns an error if the lock cannot be acquired within the timeout period.
    fn acquire(&self, timeout_ms: u64) -> Result<Box<dyn LockGuard>>;
}
