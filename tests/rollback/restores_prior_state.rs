//! Rollback puts every changed target back, newest change first, and journals itself.

use std::sync::Arc;

use hardline::errors::ApiError;
use hardline::types::{Outcome, RunStatus};

use crate::helpers::{FakeServices, TestEmitter, TestHost, SSHD, SSH_BASELINE};

#[test]
fn rollback_restores_files_and_services() {
    let th = TestHost::new();
    th.write(SSHD, "Port 22\nPermitRootLogin yes\n");
    let services = Arc::new(FakeServices::default().with_unit("ssh", false, false));
    let facts = TestEmitter::default();
    let api = th.api(facts.clone(), services.clone());
    let baseline = api.load(SSH_BASELINE).unwrap();
    let applied = api.apply(&baseline, &th.host("web1")).unwrap();
    assert_eq!(applied.status, RunStatus::Success);

    let rb = api
        .rollback(&applied.run_id.unwrap(), Some(th.root.path()))
        .unwrap();

    assert_eq!(rb.status, RunStatus::Success);
    assert_eq!(rb.rollback_of, applied.run_id);
    assert_eq!(th.read(SSHD), "Port 22\nPermitRootLogin yes\n");
    let ssh = services.status_of("ssh");
    assert_eq!((ssh.enabled, ssh.running), (Some(false), Some(false)));

    let order: Vec<&str> = rb.items.iter().map(|i| i.item_id.as_str()).collect();
    assert_eq!(
        order,
        vec!["ssh.service", "ssh.password_auth", "ssh.permit_root_login"]
    );
    assert!(rb.items.iter().all(|i| i.outcome == Some(Outcome::Applied)));

    // The rollback is a run of its own and can be found and reported like any other.
    let run = th.journal().read_run(&rb.run_id.unwrap()).unwrap();
    assert_eq!(run.rollback_of, applied.run_id);
    assert_eq!(run.status, Some(RunStatus::Success));
    assert_eq!(run.entries.len(), 3);

    let summary = facts.of("rollback.summary");
    assert_eq!(summary.len(), 1);
    assert_eq!(summary[0]["restored"], 3);
    assert_eq!(summary[0]["failed"], 0);
    assert_eq!(facts.of("rollback").len(), 3);
}

#[test]
fn rollback_skips_items_that_were_already_converged() {
    let th = TestHost::new();
    th.write(SSHD, "PermitRootLogin no\n");
    let services = Arc::new(FakeServices::default().with_unit("ssh", true, true));
    let api = th.api(TestEmitter::default(), services);
    let baseline = api.load(SSH_BASELINE).unwrap();
    let applied = api.apply(&baseline, &th.host("web1")).unwrap();
    assert_eq!(applied.count("applied"), 1);

    let rb = api
        .rollback(&applied.run_id.unwrap(), Some(th.root.path()))
        .unwrap();
    assert_eq!(rb.items.len(), 1);
    assert_eq!(rb.items[0].item_id, "ssh.password_auth");
    assert_eq!(th.read(SSHD), "PermitRootLogin no\n");
}

#[test]
fn rolling_back_a_rollback_reapplies_the_change() {
    let th = TestHost::new();
    th.write(SSHD, "PermitRootLogin yes\n");
    let services = Arc::new(FakeServices::default().with_unit("ssh", true, true));
    let api = th.api(TestEmitter::default(), services);
    let baseline = api.load(SSH_BASELINE).unwrap();
    let applied = api.apply(&baseline, &th.host("web1")).unwrap();
    let rb = api
        .rollback(&applied.run_id.unwrap(), Some(th.root.path()))
        .unwrap();
    assert_eq!(th.read(SSHD), "PermitRootLogin yes\n");

    let again = api.rollback(&rb.run_id.unwrap(), None).unwrap();
    assert_eq!(again.status, RunStatus::Success);
    assert_eq!(th.read(SSHD), "PermitRootLogin no\nPasswordAuthentication no\n");
}

#[test]
fn unknown_run_is_not_found() {
    let th = TestHost::new();
    let api = th.api(TestEmitter::default(), Arc::new(FakeServices::default()));
    let missing = uuid::Uuid::new_v4();
    match api.rollback(&missing, Some(th.root.path())) {
        Err(ApiError::RunNotFound(id)) => assert_eq!(id, missing),
        other => panic!("expected RunNotFound, got {other:?}"),
    }
}
