use std::sync::Arc;

use crate::adapters::{
    CommandRunner, Confirmer, Notifier, PackageManager, ServiceManager, SystemdServiceManager,
};
use crate::logging::{AuditSink, FactsEmitter};
use crate::policy::Policy;
use crate::types::CancelToken;

use super::{Hardline, Overrides};

/// Builder for constructing a Hardline with ergonomic chaining.
/// Mirrors `Hardline::new(...).with_*` but collects optional adapters first, which reads
/// better when they are chosen conditionally (as the CLI does).
pub struct ApiBuilder<E: FactsEmitter, A: AuditSink> {
    facts: E,
    audit: A,
    policy: Policy,
    commands: Option<Arc<dyn CommandRunner>>,
    services: Option<Arc<dyn ServiceManager>>,
    confirmer: Option<Box<dyn Confirmer>>,
    notifier: Option<Box<dyn Notifier>>,
    packages: Option<Box<dyn PackageManager>>,
    overrides: Overrides,
    cancel: Option<CancelToken>,
}

impl<E: FactsEmitter, A: AuditSink> ApiBuilder<E, A> {
    pub fn new(facts: E, audit: A, policy: Policy) -> Self {
        Self {
            facts,
            audit,
            policy,
            commands: None,
            services: None,
            confirmer: None,
            notifier: None,
            packages: None,
            overrides: Overrides::default(),
            cancel: None,
        }
    }

    pub fn command_runner(mut self, commands: Arc<dyn CommandRunner>) -> Self {
        self.commands = Some(commands);
        self
    }

    pub fn service_manager(mut self, services: Arc<dyn ServiceManager>) -> Self {
        self.services = Some(services);
        self
    }

    pub fn confirmer(mut self, confirmer: Option<Box<dyn Confirmer>>) -> Self {
        self.confirmer = confirmer;
        self
    }

    pub fn notifier(mut self, notifier: Option<Box<dyn Notifier>>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn package_manager(mut self, packages: Box<dyn PackageManager>) -> Self {
        self.packages = Some(packages);
        self
    }

    pub fn overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// A custom command runner also backs the default `systemctl` service manager.
    pub fn build(self) -> Hardline<E, A> {
        let timeout = self.policy.action_timeout();
        let mut api = Hardline::new(self.facts, self.audit, self.policy).with_overrides(self.overrides);
        if let Some(c) = self.commands {
            if self.services.is_none() {
                api = api.with_service_manager(Arc::new(SystemdServiceManager::new(
                    Arc::clone(&c),
                    timeout,
                )));
            }
            api = api.with_command_runner(c);
        }
        if let Some(s) = self.services {
            api = api.with_service_manager(s);
        }
        if let Some(c) = self.confirmer {
            api = api.with_confirmer(c);
        }
        if let Some(n) = self.notifier {
            api = api.with_notifier(n);
        }
        if let Some(p) = self.packages {
            api = api.with_package_manager(p);
        }
        if let Some(t) = self.cancel {
            api = api.with_cancel_token(t);
        }
        api
    }
}
