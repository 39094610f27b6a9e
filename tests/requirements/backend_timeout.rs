//! A backend call that outlives the action timeout fails the item, not the pass.

use std::sync::Arc;
use std::time::{Duration, Instant};

use hardline::adapters::{
    CommandOutput, CommandRunner, CommandSpec, SystemCommandRunner, SystemdServiceManager,
};
use hardline::types::{ActionError, Outcome, RunStatus, SkipReason};
use hardline::Hardline;

use crate::helpers::{TestAudit, TestEmitter, TestHost, SSHD};

/// `systemctl` that reports units disabled and hangs on `enable`.
struct HangingSystemctl;

impl CommandRunner for HangingSystemctl {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ActionError> {
        if spec.argv.iter().any(|a| a == "enable") {
            return SystemCommandRunner.run(&CommandSpec::new(["sleep", "5"], spec.timeout));
        }
        Ok(CommandOutput {
            exit_code: 1,
            stdout: "disabled\n".into(),
            stderr: String::new(),
        })
    }
}

const GUARDED: &str = r#"
version: 1
items:
  - id: auditd
    kind: ServiceState
    target: auditd
    desired: { enabled: true }
  - id: ssh.permit_root_login
    kind: KeyValueSetting
    target: /etc/ssh/sshd_config
    key: PermitRootLogin
    desired: "no"
    depends_on: [auditd]
  - id: motd
    kind: FileEditRule
    target: /etc/motd
    desired: { line: "Authorized use only" }
"#;

#[test]
fn timed_out_service_fails_and_its_dependents_are_skipped() {
    let th = TestHost::new();
    th.write(SSHD, "PermitRootLogin yes\n");
    th.write("etc/motd", "Welcome\n");
    let mut policy = th.policy();
    policy.timeout_per_action_ms = 100;
    let services = Arc::new(SystemdServiceManager::new(
        Arc::new(HangingSystemctl),
        policy.action_timeout(),
    ));
    let facts = TestEmitter::default();
    let api = Hardline::new(facts.clone(), TestAudit, policy).with_service_manager(services);
    let baseline = api.load(GUARDED).unwrap();

    let t0 = Instant::now();
    let report = api.apply(&baseline, &th.host("web1")).unwrap();

    assert!(t0.elapsed() < Duration::from_secs(4));
    assert_eq!(
        report.outcome_of("auditd"),
        Some(&Outcome::Failed(ActionError::Timeout(100)))
    );
    assert_eq!(
        report.outcome_of("ssh.permit_root_login"),
        Some(&Outcome::Skipped(SkipReason::DependencyFailed {
            dependency: "auditd".into()
        }))
    );
    assert_eq!(report.outcome_of("motd"), Some(&Outcome::Applied));
    assert_eq!(report.status, RunStatus::PartialFailure);
    assert_eq!(th.read(SSHD), "PermitRootLogin yes\n");

    let failed: Vec<_> = facts
        .of("apply.result")
        .into_iter()
        .filter(|f| f["item_id"] == "auditd")
        .collect();
    assert_eq!(failed[0]["error_id"], "E_TIMEOUT");
}
