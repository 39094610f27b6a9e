//! Package manager facade. The reconciler never looks inside; callers only record outcomes.
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::command::{CommandRunner, CommandSpec};
use crate::types::errors::ActionError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledPackage {
    pub name: String,
    pub version: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UpdateOutcome {
    UpToDate,
    Updated { upgraded: u32 },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VerifyOutcome {
    Clean,
    /// Files whose installed contents or metadata differ from the package database.
    Modified { files: Vec<String> },
}

pub trait PackageManager: Send + Sync {
    /// # Errors
    ///
    /// Fails when the package database cannot be queried.
    fn query_installed(&self) -> Result<Vec<InstalledPackage>, ActionError>;

    /// # Errors
    ///
    /// Fails when refreshing indexes or upgrading fails.
    fn apply_security_updates(&self) -> Result<UpdateOutcome, ActionError>;

    /// # Errors
    ///
    /// Fails when verification cannot run.
    fn verify_integrity(&self) -> Result<VerifyOutcome, ActionError>;
}

/// Debian family: `dpkg-query`, `apt-get`, `dpkg --verify`.
pub struct AptPackageManager {
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
}

impl AptPackageManager {
    pub fn new(runner: Arc<dyn CommandRunner>, timeout: Duration) -> Self {
        Self { runner, timeout }
    }

    fn run(&self, argv: &[&str]) -> Result<String, ActionError> {
        let out = self
            .runner
            .run(&CommandSpec::new(argv.iter().copied(), self.timeout))?
            .check()?;
        Ok(out.stdout)
    }
}

/// Parse `N upgraded, M newly installed, ...` from apt-get output.
fn upgraded_count(stdout: &str) -> Option<u32> {
    stdout.lines().find_map(|l| {
        let (n, rest) = l.trim().split_once(' ')?;
        if rest.starts_with("upgraded,") {
            n.parse().ok()
        } else {
            None
        }
    })
}

/// `dpkg --verify` prints `??5?????? c /etc/ssh/sshd_config`; the path is the last field.
fn modified_files(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|l| l.split_whitespace().last())
        .filter(|p| p.starts_with('/'))
        .map(str::to_string)
        .collect()
}

impl PackageManager for AptPackageManager {
    fn query_installed(&self) -> Result<Vec<InstalledPackage>, ActionError> {
        let stdout = self.run(&["dpkg-query", "-W", "-f=${Package}\t${Version}\n"])?;
        Ok(stdout
            .lines()
            .filter_map(|l| l.split_once('\t'))
            .map(|(name, version)| InstalledPackage {
                name: name.to_string(),
                version: version.to_string(),
            })
            .collect())
    }

    fn apply_security_updates(&self) -> Result<UpdateOutcome, ActionError> {
        self.run(&["apt-get", "update", "-q"])?;
        let stdout = self.run(&[
            "apt-get",
            "-y",
            "-q",
            "-o",
            "Dpkg::Options::=--force-confold",
            "upgrade",
        ])?;
        Ok(match upgraded_count(&stdout) {
            Some(n) if n > 0 => UpdateOutcome::Updated { upgraded: n },
            _ => UpdateOutcome::UpToDate,
        })
    }

    fn verify_integrity(&self) -> Result<VerifyOutcome, ActionError> {
        let out = self
            .runner
            .run(&CommandSpec::new(["dpkg", "--verify"], self.timeout))?;
        let files = modified_files(&out.stdout);
        if !files.is_empty() {
            return Ok(VerifyOutcome::Modified { files });
        }
        out.check().map(|_| VerifyOutcome::Clean)
    }
}
