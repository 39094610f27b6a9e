//! Fleet runs fan out across hosts and report back in host order.

use std::sync::Arc;

use hardline::types::{Host, RunStatus};
use hardline::Hardline;

use crate::helpers::{FakeServices, TestAudit, TestEmitter, TestHost, SSHD, SSH_BASELINE};

#[test]
fn results_follow_host_order_and_failures_stay_per_host() {
    let th = TestHost::new();
    let roots: Vec<tempfile::TempDir> = (0..4).map(|_| tempfile::tempdir().unwrap()).collect();
    for (i, r) in roots.iter().enumerate() {
        let p = r.path().join(SSHD);
        std::fs::create_dir_all(p.parent().unwrap()).unwrap();
        // web2's config path is a directory, so its file items cannot be probed.
        if i == 2 {
            std::fs::create_dir_all(&p).unwrap();
        } else {
            std::fs::write(&p, "PermitRootLogin yes\n").unwrap();
        }
    }
    let mut policy = th.policy();
    policy.host_concurrency = 2;
    let services = Arc::new(FakeServices::default().with_unit("ssh", true, true));
    let api = Hardline::new(TestEmitter::default(), TestAudit, policy).with_service_manager(services);
    let baseline = api.load(SSH_BASELINE).unwrap();
    let hosts: Vec<Host> = roots
        .iter()
        .enumerate()
        .map(|(i, r)| Host::new(format!("web{i}"), r.path()))
        .collect();

    let results = api.run_fleet(&baseline, &hosts);

    let ids: Vec<&str> = results.iter().map(|(h, _)| h.as_str()).collect();
    assert_eq!(ids, vec!["web0", "web1", "web2", "web3"]);
    for (i, (_, res)) in results.iter().enumerate() {
        let report = res.as_ref().unwrap();
        assert_eq!(report.host_id, format!("web{i}"));
        if i == 2 {
            assert_ne!(report.status, RunStatus::Success);
        } else {
            assert_eq!(report.status, RunStatus::Success, "web{i}");
            assert_eq!(
                std::fs::read_to_string(roots[i].path().join(SSHD)).unwrap(),
                "PermitRootLogin no\nPasswordAuthentication no\n"
            );
        }
    }
    assert_eq!(api.runs(None).unwrap().len(), 4);
}

#[test]
fn empty_fleet_is_empty() {
    let th = TestHost::new();
    let api = th.api(TestEmitter::default(), Arc::new(FakeServices::default()));
    let baseline = api.load(SSH_BASELINE).unwrap();
    assert!(api.run_fleet(&baseline, &[]).is_empty());
}
