//! Rollback restores onto the root its run was applied under.

use std::sync::Arc;

use hardline::errors::{exit_code_for, ApiError};
use hardline::types::{Host, RunStatus};
use hardline::Hardline;

use crate::helpers::{FakeServices, TestAudit, TestEmitter, TestHost, SSHD, SSH_BASELINE};

fn two_roots() -> (tempfile::TempDir, tempfile::TempDir) {
    let roots = (tempfile::tempdir().unwrap(), tempfile::tempdir().unwrap());
    for r in [&roots.0, &roots.1] {
        let p = r.path().join(SSHD);
        std::fs::create_dir_all(p.parent().unwrap()).unwrap();
        std::fs::write(&p, "PermitRootLogin yes\n").unwrap();
    }
    roots
}

#[test]
fn fleet_run_is_restored_on_its_own_root() {
    let th = TestHost::new();
    let (w1, w2) = two_roots();
    let services = Arc::new(FakeServices::default().with_unit("ssh", true, true));
    let api = Hardline::new(TestEmitter::default(), TestAudit, th.policy()).with_service_manager(services);
    let baseline = api.load(SSH_BASELINE).unwrap();
    let hosts = [Host::new("w1", w1.path()), Host::new("w2", w2.path())];
    let results = api.run_fleet(&baseline, &hosts);
    let w1_run = results[0].1.as_ref().unwrap().run_id.unwrap();

    let rb = api.rollback(&w1_run, None).unwrap();

    assert_eq!(rb.status, RunStatus::Success);
    assert_eq!(rb.host_id, "w1");
    assert_eq!(
        std::fs::read_to_string(w1.path().join(SSHD)).unwrap(),
        "PermitRootLogin yes\n"
    );
    assert_eq!(
        std::fs::read_to_string(w2.path().join(SSHD)).unwrap(),
        "PermitRootLogin no\nPasswordAuthentication no\n"
    );
    let run = th.journal().read_run(&rb.run_id.unwrap()).unwrap();
    assert_eq!(run.root.as_deref(), Some(w1.path()));
}

#[test]
fn a_different_root_is_refused() {
    let th = TestHost::new();
    let (w1, w2) = two_roots();
    let services = Arc::new(FakeServices::default().with_unit("ssh", true, true));
    let api = Hardline::new(TestEmitter::default(), TestAudit, th.policy()).with_service_manager(services);
    let baseline = api.load(SSH_BASELINE).unwrap();
    let applied = api.apply(&baseline, &Host::new("w1", w1.path())).unwrap();

    let err = api
        .rollback(&applied.run_id.unwrap(), Some(w2.path()))
        .unwrap_err();

    assert!(matches!(err, ApiError::PolicyViolation(_)), "{err:?}");
    assert_eq!(exit_code_for(err.id()), 2);
    assert_eq!(
        std::fs::read_to_string(w1.path().join(SSHD)).unwrap(),
        "PermitRootLogin no\nPasswordAuthentication no\n"
    );
    assert_eq!(
        std::fs::read_to_string(w2.path().join(SSHD)).unwrap(),
        "PermitRootLogin yes\n"
    );
    assert_eq!(api.runs(Some("w1")).unwrap().len(), 1);
}
