//! A pass where no item can be observed stops before touching anything.

use std::sync::Arc;

use hardline::types::{Outcome, RunStatus, SkipReason};

use crate::helpers::{FakeServices, TestEmitter, TestHost, SSHD};

const FILE_ONLY: &str = r#"
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
"#;

#[test]
fn every_item_failing_to_read_aborts_before_apply() {
    let th = TestHost::new();
    th.write("etc/ssh/real_config", "PermitRootLogin yes\n");
    std::os::unix::fs::symlink(
        th.root.path().join("etc/ssh/real_config"),
        th.root.path().join(SSHD),
    )
    .unwrap();
    let facts = TestEmitter::default();
    let api = th.api(facts.clone(), Arc::new(FakeServices::default()));
    let baseline = api.load(FILE_ONLY).unwrap();

    let report = api.apply(&baseline, &th.host("web1")).unwrap();

    assert_eq!(report.status, RunStatus::AbortedBeforeApply);
    assert_eq!(report.status.exit_code(), 2);
    assert!(report
        .errors
        .iter()
        .any(|e| e.contains("every item failed to probe")));
    assert!(report.items.iter().all(|i| matches!(
        i.outcome,
        Some(Outcome::Skipped(SkipReason::Unsupported { .. } | SkipReason::Aborted { .. }))
    )));
    assert_eq!(th.read("etc/ssh/real_config"), "PermitRootLogin yes\n");
    assert!(std::fs::symlink_metadata(th.root.path().join(SSHD))
        .unwrap()
        .file_type()
        .is_symlink());

    let attempts = facts.of("apply.attempt");
    assert!(attempts.iter().any(|f| f["error_id"] == "E_PROBE"));
    assert!(facts.of("apply.result").iter().all(|f| f["outcome"] != "applied"));

    let run = th.journal().read_run(&report.run_id.unwrap()).unwrap();
    assert_eq!(run.status, Some(RunStatus::AbortedBeforeApply));
    assert!(run.dangling_intents.is_empty());
}
