//! Shared test helpers for the hardline integration tests.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use log::Level;
use serde_json::Value;

use hardline::adapters::{CommandOutput, CommandRunner, CommandSpec, ServiceManager, ServiceStatus};
use hardline::logging::{AuditSink, FactsEmitter};
use hardline::policy::Policy;
use hardline::types::errors::ActionError;
use hardline::Hardline;

/// A simple in-memory emitter to capture facts during tests.
#[derive(Clone, Default, Debug)]
pub struct TestEmitter {
    pub events: Arc<Mutex<Vec<(String, String, String, Value)>>>,
}

impl FactsEmitter for TestEmitter {
    fn emit(&self, subsystem: &str, event: &str, decision: &str, fields: Value) {
        self.events
            .lock()
            .unwrap()
            .push((subsystem.into(), event.into(), decision.into(), fields));
    }
}

impl TestEmitter {
    /// Fields of every fact emitted for `event`, in order.
    pub fn of(&self, event: &str) -> Vec<Value> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, e, _, _)| e == event)
            .map(|(_, _, _, f)| f.clone())
            .collect()
    }
}

/// A no-op audit sink for tests.
#[derive(Clone, Default)]
pub struct TestAudit;

impl AuditSink for TestAudit {
    fn log(&self, _level: Level, _msg: &str) {}
}

/// In-memory init system. Units not seeded are reported absent.
#[derive(Default)]
pub struct FakeServices {
    pub units: Mutex<HashMap<String, ServiceStatus>>,
    /// Units whose state changes fail with a non-zero exit code.
    pub broken: Mutex<Vec<String>>,
}

impl FakeServices {
    pub fn with_unit(self, unit: &str, enabled: bool, running: bool) -> Self {
        self.units.lock().unwrap().insert(
            unit.to_string(),
            ServiceStatus {
                present: true,
                enabled: Some(enabled),
                running: Some(running),
            },
        );
        self
    }

    pub fn breaking(self, unit: &str) -> Self {
        self.broken.lock().unwrap().push(unit.to_string());
        self
    }

    pub fn status_of(&self, unit: &str) -> ServiceStatus {
        self.units.lock().unwrap().get(unit).copied().unwrap_or_default()
    }

    fn change(&self, unit: &str, f: impl FnOnce(&mut ServiceStatus)) -> Result<(), ActionError> {
        if self.broken.lock().unwrap().iter().any(|u| u == unit) {
            return Err(ActionError::ExitCode(1));
        }
        let mut units = self.units.lock().unwrap();
        let st = units
            .get_mut(unit)
            .ok_or_else(|| ActionError::Unsupported(format!("unit `{unit}` not installed")))?;
        f(st);
        Ok(())
    }
}

impl ServiceManager for FakeServices {
    fn status(&self, _root: &Path, unit: &str) -> Result<ServiceStatus, ActionError> {
        Ok(self.status_of(unit))
    }

    fn set_enabled(&self, _root: &Path, unit: &str, enabled: bool) -> Result<(), ActionError> {
        self.change(unit, |s| s.enabled = Some(enabled))
    }

    fn set_running(&self, _root: &Path, unit: &str, running: bool) -> Result<(), ActionError> {
        self.change(unit, |s| s.running = Some(running))
    }
}

/// Records every command and answers with a clean exit.
#[derive(Default)]
pub struct FakeCommands {
    pub calls: Mutex<Vec<Vec<String>>>,
}

impl CommandRunner for FakeCommands {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ActionError> {
        self.calls.lock().unwrap().push(spec.argv.clone());
        Ok(CommandOutput {
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

/// A host root plus a journal directory, both removed on drop.
pub struct TestHost {
    pub root: tempfile::TempDir,
    pub journal: tempfile::TempDir,
}

impl TestHost {
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().expect("tempdir"),
            journal: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub fn host(&self, id: &str) -> hardline::types::Host {
        hardline::types::Host::new(id, self.root.path())
    }

    /// Write `contents` at `rel` under the root, creating parents.
    pub fn write(&self, rel: &str, contents: &str) {
        let p = self.root.path().join(rel);
        std::fs::create_dir_all(p.parent().unwrap()).unwrap();
        std::fs::write(p, contents).unwrap();
    }

    pub fn read(&self, rel: &str) -> String {
        std::fs::read_to_string(self.root.path().join(rel)).unwrap()
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.root.path().join(rel).exists()
    }

    /// Committing policy with the journal under this host's temp directory.
    pub fn policy(&self) -> Policy {
        let mut policy = Policy::default();
        policy.dry_run = false;
        policy.journal.dir = self.journal.path().to_path_buf();
        policy.journal.lock_timeout_ms = 200;
        policy
    }

    pub fn api(&self, facts: TestEmitter, services: Arc<FakeServices>) -> Hardline<TestEmitter, TestAudit> {
        Hardline::new(facts, TestAudit, self.policy()).with_service_manager(services)
    }

    pub fn journal(&self) -> hardline::journal::FileJournal {
        hardline::journal::FileJournal::new(self.journal.path(), 200)
    }
}

pub const SSHD: &str = "etc/ssh/sshd_config";

/// Hardened SSH: root login off, then the service restarted on top of it.
pub const SSH_BASELINE: &str = r#"
version: 1
items:
  - id: ssh.permit_root_login
    kind: KeyValueSetting
    target: /etc/ssh/sshd_config
    key: PermitRootLogin
    desired: "no"
  - id: ssh.password_auth
    kind: KeyValueSetting
    target: /etc/ssh/sshd_config
    key: PasswordAuthentication
    desired: "no"
    depends_on: [ssh.permit_root_login]
  - id: ssh.service
    kind: ServiceState
    target: ssh
    desired: { enabled: true, running: true }
    depends_on: [ssh.permit_root_login, ssh.password_auth]
"#;
