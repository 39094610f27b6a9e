// Facade for API module; delegates to submodules under src/api/

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use uuid::Uuid;

use crate::adapters::{
    CommandRunner, Confirmer, Notifier, PackageManager, ServiceManager, SystemCommandRunner,
    SystemdServiceManager,
};
use crate::journal::{FileJournal, RunSummary};
use crate::logging::{AuditSink, FactsEmitter};
use crate::policy::Policy;
use crate::types::errors::ProbeError;
use crate::types::{Baseline, CancelToken, Host, Plan, ProbeResult, RunReport};

// Internal API submodules (idiomatic; directory module)
mod apply;
mod builder;
pub mod errors;
mod fleet;
mod overrides;
mod packages;
mod plan;
mod report;
mod rollback;

pub use builder::ApiBuilder;
pub use overrides::Overrides;
pub use packages::{PackageCommand, PackageResult};

use errors::ApiError;

pub struct Hardline<E: FactsEmitter, A: AuditSink> {
    facts: E,
    audit: A,
    policy: Policy,
    commands: Arc<dyn CommandRunner>,
    services: Arc<dyn ServiceManager>,
    confirmer: Option<Box<dyn Confirmer>>, // required when policy.confirm_before_apply
    notifier: Option<Box<dyn Notifier>>,   // alerts per policy.notify
    packages: Option<Box<dyn PackageManager>>, // defaults to apt on the live host
    overrides: Overrides,
    cancel: CancelToken,
}

impl<E: FactsEmitter, A: AuditSink> Hardline<E, A> {
    /// Create an instance wired to the real system: `std::process` for commands and
    /// `systemctl` for services. Swap either out with the `with_*` builders.
    pub fn new(facts: E, audit: A, policy: Policy) -> Self {
        let commands: Arc<dyn CommandRunner> = Arc::new(SystemCommandRunner);
        let services: Arc<dyn ServiceManager> = Arc::new(SystemdServiceManager::new(
            Arc::clone(&commands),
            policy.action_timeout(),
        ));
        Self {
            facts,
            audit,
            policy,
            commands,
            services,
            confirmer: None,
            notifier: None,
            packages: None,
            overrides: Overrides::default(),
            cancel: CancelToken::new(),
        }
    }

    /// Start a builder. Mirrors `Hardline::new(...).with_*` for call sites that prefer it.
    pub fn builder(facts: E, audit: A, policy: Policy) -> ApiBuilder<E, A> {
        ApiBuilder::new(facts, audit, policy)
    }

    pub fn with_command_runner(mut self, commands: Arc<dyn CommandRunner>) -> Self {
        self.commands = commands;
        self
    }

    pub fn with_service_manager(mut self, services: Arc<dyn ServiceManager>) -> Self {
        self.services = services;
        self
    }

    pub fn with_confirmer(mut self, confirmer: Box<dyn Confirmer>) -> Self {
        self.confirmer = Some(confirmer);
        self
    }

    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_package_manager(mut self, packages: Box<dyn PackageManager>) -> Self {
        self.packages = Some(packages);
        self
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Share a cancellation flag with the caller. Checked before each action dispatch.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn journal(&self) -> FileJournal {
        FileJournal::new(&self.policy.journal.dir, self.policy.journal.lock_timeout_ms)
            .with_record_limit(self.overrides.journal_records)
    }

    /// Parse and validate a baseline document.
    pub fn load(&self, source: &str) -> Result<Baseline, ApiError> {
        plan::load(self, crate::baseline::load(source))
    }

    /// Read, parse and validate a baseline file.
    pub fn load_file(&self, path: &Path) -> Result<Baseline, ApiError> {
        plan::load(self, crate::baseline::load_file(path))
    }

    /// Probe every item of `baseline` on `host`. Never mutates anything.
    pub fn probe(
        &self,
        baseline: &Baseline,
        host: &Host,
    ) -> HashMap<String, std::result::Result<ProbeResult, ProbeError>> {
        plan::probe(self, baseline, host)
    }

    /// Probe and diff without applying; the dry-run entry point.
    pub fn plan(&self, baseline: &Baseline, host: &Host) -> Plan {
        let probes = plan::probe(self, baseline, host);
        plan::build(self, baseline, host, &probes)
    }

    /// Drive one host through probing, planning, confirmation, applying and reporting.
    ///
    /// With `policy.dry_run` the pass stops after planning and nothing is journaled.
    pub fn apply(&self, baseline: &Baseline, host: &Host) -> Result<RunReport, ApiError> {
        apply::run(self, baseline, host)
    }

    /// Load `source` and apply it; a malformed baseline fails before any probing.
    pub fn reconcile(&self, source: &str, host: &Host) -> Result<RunReport, ApiError> {
        let baseline = self.load(source)?;
        self.apply(&baseline, host)
    }

    /// Apply `baseline` to every host, at most `policy.host_concurrency` at a time.
    /// Results are returned in the order of `hosts`.
    pub fn run_fleet(
        &self,
        baseline: &Baseline,
        hosts: &[Host],
    ) -> Vec<(String, Result<RunReport, ApiError>)> {
        fleet::run(self, baseline, hosts)
    }

    /// Reverse a journaled run, restoring every prior snapshot it recorded.
    ///
    /// The run is restored onto the root it was applied under. An explicit `root` is
    /// refused with `PolicyViolation` when it names a different directory; runs that did
    /// not record a root need one.
    pub fn rollback(&self, run_id: &Uuid, root: Option<&Path>) -> Result<RunReport, ApiError> {
        rollback::run(self, run_id, root)
    }

    /// Rebuild the report of a journaled run.
    pub fn report(&self, run_id: &Uuid) -> Result<RunReport, ApiError> {
        report::run(self, run_id)
    }

    /// Journaled runs, optionally for one host.
    pub fn runs(&self, host_id: Option<&str>) -> Result<Vec<RunSummary>, ApiError> {
        Ok(self.journal().list_runs(host_id)?)
    }

    /// Query, update or verify packages on the live host.
    pub fn packages(&self, host: &Host, cmd: PackageCommand) -> Result<PackageResult, ApiError> {
        packages::run(self, host, cmd)
    }
}
