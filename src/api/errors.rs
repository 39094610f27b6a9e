use thiserror::Error;
use uuid::Uuid;

use crate::journal::JournalError;
use crate::types::errors::{ActionError, ParseError};
use crate::types::{Outcome, SkipReason};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("policy violation: {0}")]
    PolicyViolation(String),
    #[error("locking timeout: {0}")]
    LockingTimeout(String),
    #[error("journal error: {0}")]
    Journal(String),
    #[error("run {0} not found")]
    RunNotFound(Uuid),
    #[error("filesystem error: {0}")]
    FilesystemError(String),
    #[error("package manager error: {0}")]
    Package(ActionError),
}

impl ApiError {
    /// Stable identifier for facts and process exit codes.
    #[must_use]
    pub const fn id(&self) -> ErrorId {
        match self {
            ApiError::Parse(_) => ErrorId::E_PARSE,
            ApiError::PolicyViolation(_) => ErrorId::E_POLICY,
            ApiError::LockingTimeout(_) => ErrorId::E_LOCKING,
            ApiError::Journal(_) => ErrorId::E_JOURNAL,
            ApiError::RunNotFound(_) => ErrorId::E_NOT_FOUND,
            ApiError::FilesystemError(_) => ErrorId::E_IO,
            ApiError::Package(e) => action_error_id(e),
        }
    }
}

impl From<crate::types::errors::Error> for ApiError {
    fn from(e: crate::types::errors::Error) -> Self {
        use crate::types::errors::ErrorKind::{InvalidPath, Io, Locking, Policy};
        match e.kind {
            InvalidPath | Io => ApiError::FilesystemError(e.msg),
            Policy => ApiError::PolicyViolation(e.msg),
            Locking => ApiError::LockingTimeout(e.msg),
        }
    }
}

impl From<JournalError> for ApiError {
    fn from(e: JournalError) -> Self {
        match e {
            JournalError::Locking { .. } => ApiError::LockingTimeout(e.to_string()),
            JournalError::NotFound(id) => ApiError::RunNotFound(id),
            other => ApiError::Journal(other.to_string()),
        }
    }
}

// Stable identifiers emitted in facts and JSON reports.
// We intentionally keep SCREAMING_SNAKE_CASE to match emitted IDs.
#[allow(non_camel_case_types, reason = "Error IDs are emitted verbatim")]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorId {
    E_PARSE,
    E_POLICY,
    E_PROBE,
    E_TIMEOUT,
    E_EXIT_CODE,
    E_PERMISSION,
    E_UNSUPPORTED,
    E_NOT_CONVERGED,
    E_IO,
    E_DEPENDENCY,
    E_CANCELLED,
    E_ABORTED,
    E_JOURNAL,
    E_LOCKING,
    E_NOT_FOUND,
    E_GENERIC,
}

#[must_use]
pub const fn id_str(id: ErrorId) -> &'static str {
    match id {
        ErrorId::E_PARSE => "E_PARSE",
        ErrorId::E_POLICY => "E_POLICY",
        ErrorId::E_PROBE => "E_PROBE",
        ErrorId::E_TIMEOUT => "E_TIMEOUT",
        ErrorId::E_EXIT_CODE => "E_EXIT_CODE",
        ErrorId::E_PERMISSION => "E_PERMISSION",
        ErrorId::E_UNSUPPORTED => "E_UNSUPPORTED",
        ErrorId::E_NOT_CONVERGED => "E_NOT_CONVERGED",
        ErrorId::E_IO => "E_IO",
        ErrorId::E_DEPENDENCY => "E_DEPENDENCY",
        ErrorId::E_CANCELLED => "E_CANCELLED",
        ErrorId::E_ABORTED => "E_ABORTED",
        ErrorId::E_JOURNAL => "E_JOURNAL",
        ErrorId::E_LOCKING => "E_LOCKING",
        ErrorId::E_NOT_FOUND => "E_NOT_FOUND",
        ErrorId::E_GENERIC => "E_GENERIC",
    }
}

/// Exit code used when a single error ends a command. Run-level exit codes come from
/// [`RunStatus::exit_code`](crate::types::RunStatus::exit_code) instead.
#[must_use]
pub const fn exit_code_for(id: ErrorId) -> i32 {
    match id {
        ErrorId::E_PARSE | ErrorId::E_POLICY | ErrorId::E_LOCKING | ErrorId::E_JOURNAL => 2,
        ErrorId::E_NOT_FOUND => 3,
        _ => 1,
    }
}

#[must_use]
pub const fn action_error_id(e: &ActionError) -> ErrorId {
    match e {
        ActionError::Timeout(_) => ErrorId::E_TIMEOUT,
        ActionError::ExitCode(_) => ErrorId::E_EXIT_CODE,
        ActionError::PermissionDenied(_) => ErrorId::E_PERMISSION,
        ActionError::Unsupported(_) => ErrorId::E_UNSUPPORTED,
        ActionError::Io(_) => ErrorId::E_IO,
        ActionError::NotConverged(_) => ErrorId::E_NOT_CONVERGED,
    }
}

/// Error id attached to an item outcome in facts; `None` for satisfied items.
#[must_use]
pub const fn outcome_error_id(o: &Outcome) -> Option<ErrorId> {
    match o {
        Outcome::Applied | Outcome::NoOp => None,
        Outcome::Failed(e) => Some(action_error_id(e)),
        Outcome::Skipped(SkipReason::DependencyFailed { .. }) => Some(ErrorId::E_DEPENDENCY),
        Outcome::Skipped(SkipReason::Unsupported { .. }) => Some(ErrorId::E_UNSUPPORTED),
        Outcome::Skipped(SkipReason::Cancelled) => Some(ErrorId::E_CANCELLED),
        Outcome::Skipped(SkipReason::Aborted { .. }) => Some(ErrorId::E_ABORTED),
    }
}
