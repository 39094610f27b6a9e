//! Shared crate-wide constants for Hardline.
//!
//! Centralizes magic values and default labels used across modules.
//! Adjusting these here will propagate through the crate.

/// Temporary filename suffix used for atomic file replacement staging within a directory.
/// The temporary name is constructed as `.{fname}.{pid}.{ctr}{TMP_SUFFIX}`.
pub const TMP_SUFFIX: &str = ".hardline.tmp";

/// Baseline document schema versions understood by the loader.
pub const SUPPORTED_BASELINE_VERSIONS: &[u32] = &[1];

/// Default per-action timeout for external command backends.
pub const DEFAULT_TIMEOUT_PER_ACTION_MS: u64 = 30_000;

/// Default number of hosts reconciled in parallel by `run_fleet`.
pub const DEFAULT_HOST_CONCURRENCY: usize = 1;

/// Default location of the journal partitions.
pub const DEFAULT_JOURNAL_DIR: &str = "/var/lib/hardline/journal";

/// File suffix of a host's journal partition (`<host_id>.journal.jsonl`).
pub const JOURNAL_SUFFIX: &str = ".journal.jsonl";

/// File suffix of a host's journal partition lock (`<host_id>.lock`).
pub const JOURNAL_LOCK_SUFFIX: &str = ".lock";

/// Poll interval in milliseconds for the file-backed lock manager (see `adapters/lock/file.rs`).
pub const LOCK_POLL_MS: u64 = 25;

/// Default bounded wait for a journal partition lock.
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;

/// Poll interval in milliseconds while waiting on a child process with a deadline.
pub const COMMAND_POLL_MS: u64 = 10;

/// Threshold in milliseconds above which an fsync duration is annotated with a WARN severity.
pub const FSYNC_WARN_MS: u64 = 50;

/// Mode used when a backend creates a file that did not exist before.
pub const DEFAULT_CREATE_MODE: u32 = 0o644;

/// UUIDv5 namespace tag for deterministic plan/action IDs.
pub const NS_TAG: &str = "https://hardline.dev/plan";

/// Prefix marking a `KeyValueSetting` target as a kernel parameter instead of a file.
pub const SYSCTL_PREFIX: &str = "sysctl:";

/// Directory (under the host root) exposing live kernel parameters.
pub const PROC_SYS_DIR: &str = "proc/sys";
