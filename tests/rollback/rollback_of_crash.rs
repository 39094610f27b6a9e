//! A run that died between its intent and its entry is still reversible.

use std::sync::Arc;

use hardline::logging::now_iso;
use hardline::types::{
    new_run_id, ActionKind, Intent, JournalEntry, Outcome, RunHeader, RunStatus, Snapshot, Value,
};

use crate::helpers::{FakeServices, TestEmitter, TestHost, SSHD};

const TWO: &str = r#"
version: 1
items:
  - id: ssh.permit_root_login
    kind: KeyValueSetting
    target: /etc/ssh/sshd_config
    key: PermitRootLogin
    desired: "no"
  - id: ssh.x11
    kind: KeyValueSetting
    target: /etc/ssh/sshd_config
    key: X11Forwarding
    desired: "no"
"#;

fn setting(v: Option<&str>) -> Snapshot {
    Snapshot {
        present: true,
        value: Some(Value::Setting {
            value: v.map(str::to_string),
        }),
    }
}

#[test]
fn dangling_intent_is_rolled_back() {
    let th = TestHost::new();
    let api = th.api(TestEmitter::default(), Arc::new(FakeServices::default()));
    let baseline = api.load(TWO).unwrap();

    // Replay what a crashed pass leaves behind: the first item fully recorded, the
    // second mutated on disk with only its intent journaled.
    let run_id = new_run_id();
    let mut w = th
        .journal()
        .open_run(RunHeader {
            run_id,
            host_id: "web1".into(),
            started_at: now_iso(),
            plan_id: None,
            rollback_of: None,
            root: None,
            items: baseline.items.clone(),
        })
        .unwrap();
    w.record(JournalEntry {
        ts: now_iso(),
        host_id: "web1".into(),
        run_id,
        item_id: "ssh.permit_root_login".into(),
        action: ActionKind::Modify,
        outcome: Outcome::Applied,
        prior_value_snapshot: Some(setting(Some("yes"))),
        new_value: Some(Value::Setting {
            value: Some("no".into()),
        }),
    })
    .unwrap();
    w.intent(Intent {
        ts: now_iso(),
        host_id: "web1".into(),
        run_id,
        item_id: "ssh.x11".into(),
        action: ActionKind::Modify,
        prior_value_snapshot: setting(Some("yes")),
        new_value: Some(Value::Setting {
            value: Some("no".into()),
        }),
    })
    .unwrap();
    drop(w);
    th.write(SSHD, "PermitRootLogin no\nX11Forwarding no\n");

    let report = api.report(&run_id).unwrap();
    assert_eq!(report.status, RunStatus::PartialFailure);
    assert_eq!(report.item("ssh.x11").unwrap().outcome, None);

    let rb = api.rollback(&run_id, Some(th.root.path())).unwrap();
    assert_eq!(rb.status, RunStatus::Success);
    let order: Vec<&str> = rb.items.iter().map(|i| i.item_id.as_str()).collect();
    assert_eq!(order, vec!["ssh.x11", "ssh.permit_root_login"]);
    assert_eq!(th.read(SSHD), "PermitRootLogin yes\nX11Forwarding yes\n");
}

#[test]
fn intent_that_never_landed_restores_as_noop() {
    let th = TestHost::new();
    th.write(SSHD, "X11Forwarding yes\n");
    let api = th.api(TestEmitter::default(), Arc::new(FakeServices::default()));
    let baseline = api.load(TWO).unwrap();

    let run_id = new_run_id();
    let mut w = th
        .journal()
        .open_run(RunHeader {
            run_id,
            host_id: "web1".into(),
            started_at: now_iso(),
            plan_id: None,
            rollback_of: None,
            root: None,
            items: baseline.items.clone(),
        })
        .unwrap();
    w.intent(Intent {
        ts: now_iso(),
        host_id: "web1".into(),
        run_id,
        item_id: "ssh.x11".into(),
        action: ActionKind::Modify,
        prior_value_snapshot: setting(Some("yes")),
        new_value: None,
    })
    .unwrap();
    drop(w);

    let rb = api.rollback(&run_id, Some(th.root.path())).unwrap();
    assert_eq!(rb.outcome_of("ssh.x11"), Some(&Outcome::NoOp));
    assert_eq!(th.read(SSHD), "X11Forwarding yes\n");
}
