//! A second pass over a converged host changes nothing.

use std::sync::Arc;

use hardline::types::RunStatus;

use crate::helpers::{FakeServices, TestEmitter, TestHost, SSHD, SSH_BASELINE};

#[test]
fn second_apply_is_all_noop() {
    let th = TestHost::new();
    th.write(SSHD, "Port 22\nPermitRootLogin yes\n");
    let services = Arc::new(FakeServices::default().with_unit("ssh", false, true));
    let api = th.api(TestEmitter::default(), services);
    let baseline = api.load(SSH_BASELINE).unwrap();
    let host = th.host("web1");

    let first = api.apply(&baseline, &host).unwrap();
    assert_eq!(first.status, RunStatus::Success);
    assert_eq!(first.count("applied"), 3);
    let after_first = th.read(SSHD);
    let mtime = std::fs::metadata(th.root.path().join(SSHD))
        .unwrap()
        .modified()
        .unwrap();

    let second = api.apply(&baseline, &host).unwrap();
    assert_eq!(second.status, RunStatus::Success);
    assert_eq!(second.count("noop"), 3);
    assert_eq!(second.count("applied"), 0);
    assert_eq!(th.read(SSHD), after_first);
    assert_eq!(
        std::fs::metadata(th.root.path().join(SSHD))
            .unwrap()
            .modified()
            .unwrap(),
        mtime,
        "a converged file is never rewritten"
    );

    let run = th.journal().read_run(&second.run_id.unwrap()).unwrap();
    assert_eq!(run.entries.len(), 3, "NoOps are journaled too");
}

#[test]
fn plan_ids_are_stable_for_the_same_state() {
    let th = TestHost::new();
    th.write(SSHD, "PermitRootLogin yes\n");
    let api = th.api(
        TestEmitter::default(),
        Arc::new(FakeServices::default().with_unit("ssh", true, true)),
    );
    let baseline = api.load(SSH_BASELINE).unwrap();
    let host = th.host("web1");
    let a = hardline::types::plan_id(&api.plan(&baseline, &host));
    let b = hardline::types::plan_id(&api.plan(&baseline, &host));
    assert_eq!(a, b);
}
