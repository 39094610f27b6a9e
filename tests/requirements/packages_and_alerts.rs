//! Package operations go through the injected manager; alerts follow the notify policy.

use std::sync::{Arc, Mutex};

use hardline::adapters::{InstalledPackage, Notifier, PackageManager, UpdateOutcome, VerifyOutcome};
use hardline::errors::ApiError;
use hardline::policy::types::NotifyOn;
use hardline::types::{ActionError, RunStatus};
use hardline::{Hardline, PackageCommand, PackageResult};

use crate::helpers::{FakeServices, TestAudit, TestEmitter, TestHost, SSHD, SSH_BASELINE};

struct Packages;

impl PackageManager for Packages {
    fn query_installed(&self) -> Result<Vec<InstalledPackage>, ActionError> {
        Ok(vec![InstalledPackage {
            name: "openssh-server".into(),
            version: "1:9.6p1-3".into(),
        }])
    }

    fn apply_security_updates(&self) -> Result<UpdateOutcome, ActionError> {
        Ok(UpdateOutcome::Updated { upgraded: 2 })
    }

    fn verify_integrity(&self) -> Result<VerifyOutcome, ActionError> {
        Ok(VerifyOutcome::Modified {
            files: vec!["/etc/ssh/sshd_config".into()],
        })
    }
}

#[derive(Clone, Default)]
struct Outbox(Arc<Mutex<Vec<String>>>);

impl Notifier for Outbox {
    fn notify(&self, subject: &str, _body: &str) -> Result<(), ActionError> {
        self.0.lock().unwrap().push(subject.to_string());
        Ok(())
    }
}

#[test]
fn package_commands_record_facts() {
    let th = TestHost::new();
    let facts = TestEmitter::default();
    let api = th
        .api(facts.clone(), Arc::new(FakeServices::default()))
        .with_package_manager(Box::new(Packages));
    let host = th.host("web1");

    match api.packages(&host, PackageCommand::List).unwrap() {
        PackageResult::List { packages } => assert_eq!(packages[0].name, "openssh-server"),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(
        api.packages(&host, PackageCommand::Update).unwrap(),
        PackageResult::Update(UpdateOutcome::Updated { upgraded: 2 })
    );
    assert!(matches!(
        api.packages(&host, PackageCommand::Verify).unwrap(),
        PackageResult::Verify(VerifyOutcome::Modified { .. })
    ));

    let pk = facts.of("packages");
    assert_eq!(pk.len(), 3);
    assert_eq!(pk[0]["installed"], 1);
    assert_eq!(pk[1]["upgraded"], 2);
    assert_eq!(pk[2]["decision"], "warn");
    assert_eq!(std::fs::read_dir(th.journal.path()).unwrap().count(), 0);
}

#[test]
fn updates_are_refused_in_dry_run() {
    let th = TestHost::new();
    let mut policy = th.policy();
    policy.dry_run = true;
    let api = Hardline::new(TestEmitter::default(), TestAudit, policy)
        .with_package_manager(Box::new(Packages));
    let err = api.packages(&th.host("web1"), PackageCommand::Update).unwrap_err();
    assert!(matches!(err, ApiError::PolicyViolation(_)), "{err:?}");
}

#[test]
fn offline_root_needs_an_injected_manager() {
    let th = TestHost::new();
    let api = th.api(TestEmitter::default(), Arc::new(FakeServices::default()));
    let err = api.packages(&th.host("web1"), PackageCommand::List).unwrap_err();
    assert!(matches!(err, ApiError::PolicyViolation(_)), "{err:?}");
}

#[test]
fn failure_alerts_follow_notify_policy() {
    let th = TestHost::new();
    th.write(SSHD, "PermitRootLogin yes\n");
    let mut policy = th.policy();
    policy.notify.on = NotifyOn::Failure;
    let outbox = Outbox::default();
    let services = Arc::new(
        FakeServices::default()
            .with_unit("ssh", false, false)
            .breaking("ssh"),
    );
    let api = Hardline::new(TestEmitter::default(), TestAudit, policy)
        .with_service_manager(services)
        .with_notifier(Box::new(outbox.clone()));
    let baseline = api.load(SSH_BASELINE).unwrap();

    let report = api.apply(&baseline, &th.host("web1")).unwrap();
    assert_eq!(report.status, RunStatus::PartialFailure);
    assert_eq!(
        *outbox.0.lock().unwrap(),
        vec!["hardline: web1 partial_failure".to_string()]
    );

    // Converged now apart from the broken unit; a success would not alert.
    let sent = outbox.0.lock().unwrap().len();
    let mut quiet = th.policy();
    quiet.notify.on = NotifyOn::Failure;
    th.write(SSHD, "PermitRootLogin no\nPasswordAuthentication no\n");
    let api = Hardline::new(TestEmitter::default(), TestAudit, quiet)
        .with_service_manager(Arc::new(FakeServices::default().with_unit("ssh", true, true)))
        .with_notifier(Box::new(outbox.clone()));
    let ok = api.apply(&baseline, &th.host("web1")).unwrap();
    assert_eq!(ok.status, RunStatus::Success);
    assert_eq!(outbox.0.lock().unwrap().len(), sent);
}
