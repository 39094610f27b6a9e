//! A failed item skips its dependents transitively; unrelated items still apply.

use std::sync::Arc;

use hardline::types::{ActionError, Outcome, RunStatus, SkipReason};

use crate::helpers::{FakeServices, TestEmitter, TestHost};

const CHAIN: &str = r#"
version: 1
items:
  - id: auditd.enabled
    kind: ServiceState
    target: auditd
    desired: { enabled: true, running: true }
  - id: audit.rules
    kind: FileEditRule
    target: /etc/audit/rules.d/hardening.rules
    desired: { line: "-w /etc/passwd -p wa -k identity" }
    depends_on: [auditd.enabled]
  - id: audit.rules.mode
    kind: PermissionRule
    target: /etc/audit/rules.d/hardening.rules
    desired: { mode: "0600" }
    depends_on: [audit.rules]
  - id: motd
    kind: FileEditRule
    target: /etc/motd
    desired: { line: "Authorized use only" }
"#;

#[test]
fn failure_cascades_to_dependents_only() {
    let th = TestHost::new();
    th.write("etc/audit/rules.d/.keep", "");
    th.write("etc/motd", "Welcome\n");
    let services = Arc::new(
        FakeServices::default()
            .with_unit("auditd", false, false)
            .breaking("auditd"),
    );
    let facts = TestEmitter::default();
    let api = th.api(facts.clone(), services);
    let baseline = api.load(CHAIN).unwrap();

    let report = api.apply(&baseline, &th.host("web1")).unwrap();

    assert_eq!(report.status, RunStatus::PartialFailure);
    assert_eq!(report.status.exit_code(), 1);
    assert_eq!(
        report.outcome_of("auditd.enabled"),
        Some(&Outcome::Failed(ActionError::ExitCode(1)))
    );
    assert_eq!(
        report.outcome_of("audit.rules"),
        Some(&Outcome::Skipped(SkipReason::DependencyFailed {
            dependency: "auditd.enabled".into()
        }))
    );
    assert_eq!(
        report.outcome_of("audit.rules.mode"),
        Some(&Outcome::Skipped(SkipReason::DependencyFailed {
            dependency: "audit.rules".into()
        }))
    );
    assert_eq!(report.outcome_of("motd"), Some(&Outcome::Applied));
    assert!(!th.exists("etc/audit/rules.d/hardening.rules"));
    assert_eq!(th.read("etc/motd"), "Welcome\nAuthorized use only\n");

    let failed: Vec<_> = facts
        .of("apply.result")
        .into_iter()
        .filter(|f| f["decision"] == "failure")
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["item_id"], "auditd.enabled");
    assert_eq!(failed[0]["error_id"], "E_EXIT_CODE");
}

#[test]
fn dependencies_run_before_dependents_regardless_of_declaration_order() {
    let th = TestHost::new();
    th.write("etc/motd", "");
    let services = Arc::new(FakeServices::default());
    let api = th.api(TestEmitter::default(), services);
    let baseline = api
        .load(
            r#"
version: 1
items:
  - id: second
    kind: FileEditRule
    target: /etc/motd
    desired: { line: "two" }
    depends_on: [first]
  - id: first
    kind: FileEditRule
    target: /etc/motd
    desired: { line: "one" }
"#,
        )
        .unwrap();

    let plan = api.plan(&baseline, &th.host("web1"));
    assert!(plan.position("first").unwrap() < plan.position("second").unwrap());

    let report = api.apply(&baseline, &th.host("web1")).unwrap();
    assert_eq!(report.status, RunStatus::Success);
    let order: Vec<&str> = report.items.iter().map(|i| i.item_id.as_str()).collect();
    assert_eq!(order, vec!["first", "second"]);
    assert_eq!(th.read("etc/motd"), "one\ntwo\n");
}
