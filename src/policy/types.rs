use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_JOURNAL_DIR, DEFAULT_LOCK_TIMEOUT_MS};
use crate::types::RunStatus;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JournalPolicy {
    pub dir: PathBuf,
    /// Bounded wait for a host partition held by another run.
    pub lock_timeout_ms: u64,
}

impl Default for JournalPolicy {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_JOURNAL_DIR),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyOn {
    #[default]
    Never,
    Failure,
    Always,
}

impl NotifyOn {
    /// Whether a run finishing with `status` should alert.
    #[must_use]
    pub const fn wants(&self, status: RunStatus) -> bool {
        match self {
            NotifyOn::Never => false,
            NotifyOn::Always => true,
            NotifyOn::Failure => !matches!(status, RunStatus::Success),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotifyPolicy {
    pub on: NotifyOn,
    pub recipient: Option<String>,
}
