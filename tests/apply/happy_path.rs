//! Commit happy path: root login is turned off, the journal keeps the old value.

use std::sync::Arc;

use hardline::types::{Outcome, RunStatus, Snapshot, Value};

use crate::helpers::{FakeServices, TestEmitter, TestHost, SSHD, SSH_BASELINE};

#[test]
fn permit_root_login_yes_becomes_no_and_prior_is_journaled() {
    let th = TestHost::new();
    th.write(SSHD, "Port 22\nPermitRootLogin yes\n");
    let services = Arc::new(FakeServices::default().with_unit("ssh", false, false));
    let facts = TestEmitter::default();
    let api = th.api(facts.clone(), services.clone());

    let baseline = api.load(SSH_BASELINE).unwrap();
    let report = api.apply(&baseline, &th.host("web1")).unwrap();

    assert_eq!(report.status, RunStatus::Success);
    assert_eq!(report.status.exit_code(), 0);
    assert_eq!(
        th.read(SSHD),
        "Port 22\nPermitRootLogin no\nPasswordAuthentication no\n"
    );
    let ssh = services.status_of("ssh");
    assert_eq!((ssh.enabled, ssh.running), (Some(true), Some(true)));

    let run = th.journal().read_run(&report.run_id.unwrap()).unwrap();
    assert_eq!(run.status, Some(RunStatus::Success));
    assert!(run.dangling_intents.is_empty());
    let entry = run
        .entries
        .iter()
        .find(|e| e.item_id == "ssh.permit_root_login")
        .unwrap();
    assert_eq!(entry.outcome, Outcome::Applied);
    assert_eq!(
        entry.prior_value_snapshot,
        Some(Snapshot {
            present: true,
            value: Some(Value::Setting {
                value: Some("yes".into())
            }),
        })
    );
    assert_eq!(run.items.len(), 3, "item definitions travel with the run");

    let results = facts.of("apply.result");
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|f| f["decision"] == "success"));
    assert!(results.iter().all(|f| f["run_id"] == report.run_id.unwrap().to_string()));
    assert!(results.iter().all(|f| f.get("error_id").is_none()));
    assert_eq!(facts.of("report").len(), 1);
}

#[test]
fn creatable_file_setting_is_created() {
    let th = TestHost::new();
    std::fs::create_dir_all(th.root.path().join("etc")).unwrap();
    let services = Arc::new(FakeServices::default());
    let api = th.api(TestEmitter::default(), services);
    let baseline = api
        .load(
            r#"
version: 1
items:
  - id: login.umask
    kind: KeyValueSetting
    target: /etc/login.defs
    key: UMASK
    desired: "027"
"#,
        )
        .unwrap();

    let plan = api.plan(&baseline, &th.host("web1"));
    assert_eq!(plan.actions[0].kind, hardline::types::ActionKind::Create);

    let report = api.apply(&baseline, &th.host("web1")).unwrap();
    assert_eq!(report.status, RunStatus::Success);
    assert_eq!(th.read("etc/login.defs"), "UMASK 027\n");
}

#[test]
fn lowercase_keywords_are_rewritten_not_shadowed() {
    let th = TestHost::new();
    th.write(SSHD, "permitrootlogin yes\nPort 22\n");
    let api = th.api(
        TestEmitter::default(),
        Arc::new(FakeServices::default().with_unit("ssh", true, true)),
    );
    let baseline = api.load(SSH_BASELINE).unwrap();

    let plan = api.plan(&baseline, &th.host("web1"));
    assert_eq!(
        plan.get("ssh.permit_root_login").unwrap().prior,
        Some(Snapshot {
            present: true,
            value: Some(Value::Setting {
                value: Some("yes".into())
            }),
        })
    );

    let report = api.apply(&baseline, &th.host("web1")).unwrap();
    assert_eq!(report.status, RunStatus::Success);
    assert_eq!(
        th.read(SSHD),
        "PermitRootLogin no\nPort 22\nPasswordAuthentication no\n"
    );
    assert_eq!(report.outcome_of("ssh.permit_root_login"), Some(&Outcome::Applied));
}
