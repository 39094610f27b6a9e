//! Confirmation gate between planning and applying.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hardline::adapters::Confirmer;
use hardline::types::{Outcome, Plan, RunStatus, SkipReason};
use hardline::Hardline;

use crate::helpers::{FakeServices, TestAudit, TestEmitter, TestHost, SSHD, SSH_BASELINE};

struct Answer {
    yes: bool,
    asked: Arc<AtomicUsize>,
}

impl Confirmer for Answer {
    fn confirm(&self, _host_id: &str, _plan: &Plan) -> bool {
        self.asked.fetch_add(1, Ordering::SeqCst);
        self.yes
    }
}

fn gated(th: &TestHost, yes: Option<bool>) -> (Hardline<TestEmitter, TestAudit>, TestEmitter, Arc<AtomicUsize>) {
    let mut policy = th.policy();
    policy.confirm_before_apply = true;
    let facts = TestEmitter::default();
    let asked = Arc::new(AtomicUsize::new(0));
    let services = Arc::new(FakeServices::default().with_unit("ssh", true, true));
    let mut api = Hardline::new(facts.clone(), TestAudit, policy).with_service_manager(services);
    if let Some(yes) = yes {
        api = api.with_confirmer(Box::new(Answer {
            yes,
            asked: asked.clone(),
        }));
    }
    (api, facts, asked)
}

#[test]
fn declined_confirmation_aborts_before_apply() {
    let th = TestHost::new();
    th.write(SSHD, "PermitRootLogin yes\n");
    let (api, facts, asked) = gated(&th, Some(false));
    let baseline = api.load(SSH_BASELINE).unwrap();

    let report = api.apply(&baseline, &th.host("web1")).unwrap();

    assert_eq!(asked.load(Ordering::SeqCst), 1);
    assert_eq!(report.status, RunStatus::AbortedBeforeApply);
    assert_eq!(report.status.exit_code(), 2);
    assert_eq!(th.read(SSHD), "PermitRootLogin yes\n");
    assert!(matches!(
        report.outcome_of("ssh.permit_root_login"),
        Some(Outcome::Skipped(SkipReason::Aborted { .. }))
    ));
    // The service already converged; nothing would have been done for it anyway.
    assert_eq!(report.outcome_of("ssh.service"), Some(&Outcome::NoOp));

    let confirm = facts.of("confirm");
    assert_eq!(confirm.len(), 1);
    assert_eq!(confirm[0]["decision"], "failure");
    assert_eq!(confirm[0]["error_id"], "E_ABORTED");

    let run = th.journal().read_run(&report.run_id.unwrap()).unwrap();
    assert_eq!(run.status, Some(RunStatus::AbortedBeforeApply));
    assert!(run.dangling_intents.is_empty());
}

#[test]
fn missing_confirmer_fails_closed() {
    let th = TestHost::new();
    th.write(SSHD, "PermitRootLogin yes\n");
    let (api, _facts, _) = gated(&th, None);
    let baseline = api.load(SSH_BASELINE).unwrap();

    let report = api.apply(&baseline, &th.host("web1")).unwrap();
    assert_eq!(report.status, RunStatus::AbortedBeforeApply);
    assert_eq!(th.read(SSHD), "PermitRootLogin yes\n");
}

#[test]
fn accepted_confirmation_applies() {
    let th = TestHost::new();
    th.write(SSHD, "PermitRootLogin yes\n");
    let (api, _facts, asked) = gated(&th, Some(true));
    let baseline = api.load(SSH_BASELINE).unwrap();

    let report = api.apply(&baseline, &th.host("web1")).unwrap();
    assert_eq!(asked.load(Ordering::SeqCst), 1);
    assert_eq!(report.status, RunStatus::Success);
    assert_eq!(th.read(SSHD), "PermitRootLogin no\nPasswordAuthentication no\n");
}

#[test]
fn converged_host_is_not_asked() {
    let th = TestHost::new();
    th.write(SSHD, "PermitRootLogin no\nPasswordAuthentication no\n");
    let (api, _facts, asked) = gated(&th, Some(false));
    let baseline = api.load(SSH_BASELINE).unwrap();

    let report = api.apply(&baseline, &th.host("web1")).unwrap();
    assert_eq!(asked.load(Ordering::SeqCst), 0);
    assert_eq!(report.status, RunStatus::Success);
    assert_eq!(report.count("noop"), 3);
}
