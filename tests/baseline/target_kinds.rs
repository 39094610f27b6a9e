//! Every item kind probes, plans and applies against a temp root.

use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;

use hardline::types::{ActionError, ActionKind, Outcome, RunStatus};
use hardline::Hardline;

use crate::helpers::{FakeCommands, FakeServices, TestAudit, TestEmitter, TestHost};

#[test]
fn line_rules_add_and_remove_lines() {
    let th = TestHost::new();
    th.write(
        "etc/security/limits.conf",
        "# defaults\n* soft core 0\n* hard core unlimited\n",
    );
    th.write("etc/issue", "Ubuntu \\n \\l\nkernel \\r\n");
    let api = th.api(TestEmitter::default(), Arc::new(FakeServices::default()));
    let baseline = api
        .load(
            r#"
version: 1
items:
  - id: limits.core
    kind: FileEditRule
    target: /etc/security/limits.conf
    desired: { line: "* hard core 0", match: '^\*\s+hard\s+core\s' }
  - id: issue.no_kernel
    kind: FileEditRule
    target: /etc/issue
    desired: { line: "kernel \\r", state: absent }
"#,
        )
        .unwrap();

    let report = api.apply(&baseline, &th.host("web1")).unwrap();
    assert_eq!(report.status, RunStatus::Success);
    assert_eq!(
        th.read("etc/security/limits.conf"),
        "# defaults\n* soft core 0\n* hard core 0\n"
    );
    assert_eq!(th.read("etc/issue"), "Ubuntu \\n \\l\n");
}

#[test]
fn permission_rules_keep_contents() {
    let th = TestHost::new();
    th.write("etc/crontab", "SHELL=/bin/sh\n");
    let path = th.root.path().join("etc/crontab");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();
    let api = th.api(TestEmitter::default(), Arc::new(FakeServices::default()));
    let baseline = api
        .load(
            "version: 1\nitems:\n  - { id: cron.mode, kind: PermissionRule, target: /etc/crontab, desired: { mode: \"0600\" } }\n",
        )
        .unwrap();

    let report = api.apply(&baseline, &th.host("web1")).unwrap();
    assert_eq!(report.outcome_of("cron.mode"), Some(&Outcome::Applied));
    let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o7777;
    assert_eq!(mode, 0o600);
    assert_eq!(th.read("etc/crontab"), "SHELL=/bin/sh\n");
}

#[test]
fn missing_file_cannot_take_permissions() {
    let th = TestHost::new();
    let facts = TestEmitter::default();
    let api = th.api(facts.clone(), Arc::new(FakeServices::default()));
    let baseline = api
        .load(
            "version: 1\nitems:\n  - { id: shadow.mode, kind: PermissionRule, target: /etc/shadow, desired: { mode: \"0640\" } }\n",
        )
        .unwrap();

    let plan = api.plan(&baseline, &th.host("web1"));
    assert_eq!(plan.actions[0].kind, ActionKind::Unsupported);
    assert!(plan.actions[0].reason.is_some());
    let planned = facts.of("plan");
    assert_eq!(planned[0]["decision"], "warn");
    assert_eq!(planned[0]["error_id"], "E_UNSUPPORTED");
}

#[test]
fn offline_sysctl_is_never_sent_to_the_kernel() {
    let th = TestHost::new();
    th.write("proc/sys/net/ipv4/ip_forward", "1\n");
    let commands = Arc::new(FakeCommands::default());
    let api = Hardline::new(TestEmitter::default(), TestAudit, th.policy())
        .with_service_manager(Arc::new(FakeServices::default()))
        .with_command_runner(commands.clone());
    let baseline = api
        .load("version: 1\nitems:\n  - { id: net.forward, kind: KeyValueSetting, target: \"sysctl:net.ipv4.ip_forward\", desired: 0 }\n")
        .unwrap();

    let plan = api.plan(&baseline, &th.host("img"));
    assert_eq!(plan.actions[0].kind, ActionKind::Modify);

    let report = api.apply(&baseline, &th.host("img")).unwrap();
    assert!(matches!(
        report.outcome_of("net.forward"),
        Some(Outcome::Failed(ActionError::Unsupported(_)))
    ));
    assert!(commands.calls.lock().unwrap().is_empty());
    assert_eq!(th.read("proc/sys/net/ipv4/ip_forward"), "1\n");
}

const SUDOERS: &str = r#"
version: 1
items:
  - id: sudo.use_pty
    kind: KeyValueSetting
    target: /etc/sudoers.d/hardening
    key: Defaults
    desired: use_pty
  - id: sudo.mode
    kind: PermissionRule
    target: /etc/sudoers.d/hardening
    desired: { mode: "0440" }
    depends_on: [sudo.use_pty]
"#;

#[test]
fn permissions_apply_to_a_file_created_earlier_in_the_pass() {
    let th = TestHost::new();
    std::fs::create_dir_all(th.root.path().join("etc/sudoers.d")).unwrap();
    let api = th.api(TestEmitter::default(), Arc::new(FakeServices::default()));
    let baseline = api.load(SUDOERS).unwrap();

    let plan = api.plan(&baseline, &th.host("web1"));
    assert_eq!(plan.get("sudo.use_pty").unwrap().kind, ActionKind::Create);
    assert_eq!(plan.get("sudo.mode").unwrap().kind, ActionKind::Modify);

    let first = api.apply(&baseline, &th.host("web1")).unwrap();
    assert_eq!(first.status, RunStatus::Success);
    assert_eq!(first.outcome_of("sudo.mode"), Some(&Outcome::Applied));
    assert_eq!(th.read("etc/sudoers.d/hardening"), "Defaults use_pty\n");
    let path = th.root.path().join("etc/sudoers.d/hardening");
    let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o7777;
    assert_eq!(mode, 0o440);

    let second = api.apply(&baseline, &th.host("web1")).unwrap();
    assert_eq!(second.status, RunStatus::Success);
    assert!(second.items.iter().all(|i| i.outcome == Some(Outcome::NoOp)));
}

#[test]
fn missing_parent_directory_is_not_created() {
    let th = TestHost::new();
    let api = th.api(TestEmitter::default(), Arc::new(FakeServices::default()));
    let baseline = api.load(SUDOERS).unwrap();

    let plan = api.plan(&baseline, &th.host("web1"));
    let create = plan.get("sudo.use_pty").unwrap();
    assert_eq!(create.kind, ActionKind::Unsupported);
    assert!(create.reason.as_deref().unwrap().contains("parent directory"));
    assert_eq!(plan.get("sudo.mode").unwrap().kind, ActionKind::Unsupported);

    let report = api.apply(&baseline, &th.host("web1")).unwrap();
    assert!(matches!(
        report.outcome_of("sudo.use_pty"),
        Some(Outcome::Skipped(_))
    ));
    assert!(!th.exists("etc/sudoers.d"));
}
