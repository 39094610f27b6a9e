use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::types::{JournalPolicy, NotifyOn, NotifyPolicy};
use crate::constants::{DEFAULT_HOST_CONCURRENCY, DEFAULT_TIMEOUT_PER_ACTION_MS};
use crate::types::errors::{Error, ErrorKind, Result};

/// Policy governs how a reconciliation pass is carried out.
///
/// The default is deliberately inert: dry run, no confirmation, no alerts. Every field can be
/// set from a YAML file (see [`Policy::load_file`]); missing fields keep their defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Policy {
    /// Deadline for every external command an action runs.
    pub timeout_per_action_ms: u64,
    /// Hosts reconciled in parallel by `run_fleet`. Zero is treated as one.
    pub host_concurrency: usize,
    /// Stop after planning; nothing is journaled or mutated.
    pub dry_run: bool,
    /// Ask the configured `Confirmer` between planning and applying.
    pub confirm_before_apply: bool,
    pub journal: JournalPolicy,
    pub notify: NotifyPolicy,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            timeout_per_action_ms: DEFAULT_TIMEOUT_PER_ACTION_MS,
            host_concurrency: DEFAULT_HOST_CONCURRENCY,
            dry_run: true,
            confirm_before_apply: false,
            journal: JournalPolicy::default(),
            notify: NotifyPolicy::default(),
        }
    }
}

impl Policy {
    /// Construct a Policy configured with recommended **production defaults**.
    ///
    /// Enables:
    /// - commit mode (`dry_run = false`)
    /// - `confirm_before_apply = true`; without a `Confirmer` the run aborts before applying
    /// - alerts on any non-successful run (`notify.on = failure`)
    #[must_use]
    pub fn production_preset() -> Self {
        let mut p = Self::default();
        p.apply_production_preset();
        p
    }

    /// Mutate this Policy to apply the recommended **production defaults**.
    pub fn apply_production_preset(&mut self) -> &mut Self {
        self.dry_run = false;
        self.confirm_before_apply = true;
        self.notify.on = NotifyOn::Failure;
        self
    }

    /// Parse a YAML policy document.
    ///
    /// # Errors
    ///
    /// `ErrorKind::Policy` on syntax errors or unknown fields.
    pub fn from_yaml(source: &str) -> Result<Self> {
        serde_yaml::from_str(source).map_err(|e| Error {
            kind: ErrorKind::Policy,
            msg: e.to_string(),
        })
    }

    /// Read and parse a YAML policy file.
    ///
    /// # Errors
    ///
    /// `ErrorKind::Io` when the file is unreadable, otherwise as [`Policy::from_yaml`].
    pub fn load_file(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path).map_err(|e| Error {
            kind: ErrorKind::Io,
            msg: format!("{}: {e}", path.display()),
        })?;
        Self::from_yaml(&s)
    }

    #[must_use]
    pub const fn action_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_per_action_ms)
    }
}
