//! Service state through the init system.
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::command::{CommandRunner, CommandSpec};
use crate::types::errors::ActionError;

/// What the init system reports about one unit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ServiceStatus {
    /// False when the unit is not installed at all.
    pub present: bool,
    pub enabled: Option<bool>,
    /// `None` where the running state cannot be observed (offline roots).
    pub running: Option<bool>,
}

/// Boundary to the service manager. `root` is the host root the unit lives under.
pub trait ServiceManager: Send + Sync {
    /// # Errors
    ///
    /// Fails when the service manager itself cannot be queried.
    fn status(&self, root: &Path, unit: &str) -> Result<ServiceStatus, ActionError>;

    /// # Errors
    ///
    /// Fails when enabling or disabling the unit fails.
    fn set_enabled(&self, root: &Path, unit: &str, enabled: bool) -> Result<(), ActionError>;

    /// # Errors
    ///
    /// Fails when starting or stopping the unit fails, or the root is not live.
    fn set_running(&self, root: &Path, unit: &str, running: bool) -> Result<(), ActionError>;
}

/// `systemctl`-backed [`ServiceManager`]. Offline roots are driven with `--root`, where only
/// the enablement state is meaningful.
pub struct SystemdServiceManager {
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
}

impl SystemdServiceManager {
    pub fn new(runner: Arc<dyn CommandRunner>, timeout: Duration) -> Self {
        Self { runner, timeout }
    }

    fn argv(root: &Path, verb: &str, unit: &str) -> Vec<String> {
        let mut argv = vec!["systemctl".to_string()];
        if !is_live(root) {
            argv.push(format!("--root={}", root.display()));
        }
        argv.push(verb.to_string());
        argv.push(unit.to_string());
        argv
    }
}

fn is_live(root: &Path) -> bool {
    root == Path::new("/")
}

fn parse_enabled(stdout: &str) -> Option<bool> {
    match stdout.trim() {
        "enabled" | "enabled-runtime" | "alias" | "linked" | "linked-runtime" => Some(true),
        "disabled" | "masked" | "masked-runtime" | "static" | "indirect" | "generated" => Some(false),
        _ => None,
    }
}

fn parse_active(stdout: &str) -> Option<bool> {
    match stdout.trim() {
        "active" | "reloading" | "activating" | "refreshing" => Some(true),
        "inactive" | "failed" | "deactivating" => Some(false),
        _ => None,
    }
}

fn not_found(stderr: &str) -> bool {
    let s = stderr.to_ascii_lowercase();
    s.contains("no such file") || s.contains("not found") || s.contains("not-found")
}

impl ServiceManager for SystemdServiceManager {
    fn status(&self, root: &Path, unit: &str) -> Result<ServiceStatus, ActionError> {
        let out = self
            .runner
            .run(&CommandSpec::new(Self::argv(root, "is-enabled", unit), self.timeout))?;
        let Some(enabled) = parse_enabled(&out.stdout) else {
            if not_found(&out.stderr) || out.stdout.trim() == "not-found" {
                return Ok(ServiceStatus::default());
            }
            return Err(ActionError::ExitCode(out.exit_code));
        };
        let running = if is_live(root) {
            let out = self
                .runner
                .run(&CommandSpec::new(Self::argv(root, "is-active", unit), self.timeout))?;
            parse_active(&out.stdout)
        } else {
            None
        };
        Ok(ServiceStatus {
            present: true,
            enabled: Some(enabled),
            running,
        })
    }

    fn set_enabled(&self, root: &Path, unit: &str, enabled: bool) -> Result<(), ActionError> {
        let verb = if enabled { "enable" } else { "disable" };
        self.runner
            .run(&CommandSpec::new(Self::argv(root, verb, unit), self.timeout))?
            .check()
            .map(|_| ())
    }

    fn set_running(&self, root: &Path, unit: &str, running: bool) -> Result<(), ActionError> {
        if !is_live(root) {
            return Err(ActionError::Unsupported(format!(
                "running state of `{unit}` under offline root {}",
                root.display()
            )));
        }
        let verb = if running { "start" } else { "stop" };
        self.runner
            .run(&CommandSpec::new(Self::argv(root, verb, unit), self.timeout))?
            .check()
            .map(|_| ())
    }
}
