//! Error types used across Hardline.
//!
//! The taxonomy follows the blast radius of each failure:
//! - [`ParseError`] is fatal and raised before any probing.
//! - [`ProbeError`] is scoped to a single item and degrades it to `Unsupported`.
//! - [`ActionError`] is scoped to a single item, recorded, and cascades as dependency skips.
//! - [`JournalWriteError`] is fatal: history that cannot be recorded must not be mutated.
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// High-level error categories for type-level operations and adapters.
#[derive(Debug, Copy, Clone, Error, PartialEq, Eq)]
pub enum ErrorKind {
    #[error("invalid path")]
    InvalidPath,
    #[error("io error")]
    Io,
    #[error("policy violation")]
    Policy,
    #[error("lock not acquired")]
    Locking,
}

/// Structured error with a kind and human message.
#[derive(Debug, Error)]
#[error("{kind:?}: {msg}")]
pub struct Error {
    pub kind: ErrorKind,
    pub msg: String,
}

/// Convenient alias for results returning a `types::Error`.
pub type Result<T> = std::result::Result<T, Error>;

/// A baseline document could not be turned into a valid [`Baseline`](crate::types::Baseline).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("baseline source unreadable: {0}")]
    Io(String),
    #[error("baseline syntax error: {0}")]
    Syntax(String),
    #[error("unsupported baseline version {0}")]
    UnsupportedVersion(u32),
    #[error("duplicate item id `{0}`")]
    DuplicateId(String),
    #[error("item `{item}` depends on unknown item `{dependency}`")]
    UnknownDependency { item: String, dependency: String },
    #[error("dependency cycle: {}", .0.join(" -> "))]
    Cycle(Vec<String>),
    #[error("item `{item}`: desired value does not match kind: {reason}")]
    ValueMismatch { item: String, reason: String },
    #[error("item `{item}`: invalid target: {reason}")]
    InvalidTarget { item: String, reason: String },
}

/// The probe mechanism itself failed; distinct from "resource absent".
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("probe of `{item_id}` failed: {reason}")]
pub struct ProbeError {
    pub item_id: String,
    pub reason: String,
}

/// Item-scoped failure while applying an action.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "error", content = "detail", rename_all = "snake_case")]
pub enum ActionError {
    #[error("timed out after {0} ms")]
    Timeout(u64),
    #[error("command exited with code {0}")]
    ExitCode(i32),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("target did not converge: {0}")]
    NotConverged(String),
}

impl From<std::io::Error> for ActionError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::PermissionDenied => ActionError::PermissionDenied(e.to_string()),
            _ => match e.raw_os_error() {
                Some(code) if code == libc::EPERM || code == libc::EACCES => {
                    ActionError::PermissionDenied(e.to_string())
                }
                _ => ActionError::Io(e.to_string()),
            },
        }
    }
}

/// History could not be durably recorded.
#[derive(Debug, Error)]
#[error("journal write failed: {0}")]
pub struct JournalWriteError(pub String);

impl From<std::io::Error> for JournalWriteError {
    fn from(e: std::io::Error) -> Self {
        JournalWriteError(e.to_string())
    }
}
