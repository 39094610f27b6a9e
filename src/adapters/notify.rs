//! Operator alerts after a run.
use std::sync::Arc;
use std::time::Duration;

use super::command::{CommandRunner, CommandSpec};
use crate::types::errors::ActionError;

/// Fire-and-forget alert channel. Callers log failures and carry on.
pub trait Notifier: Send + Sync {
    /// # Errors
    ///
    /// Fails when the alert could not be handed to the delivery mechanism.
    fn notify(&self, subject: &str, body: &str) -> Result<(), ActionError>;
}

/// Pipes the body into `mail -s <subject> <recipient>`.
pub struct MailNotifier {
    recipient: String,
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
}

impl MailNotifier {
    pub fn new(recipient: impl Into<String>, runner: Arc<dyn CommandRunner>, timeout: Duration) -> Self {
        Self {
            recipient: recipient.into(),
            runner,
            timeout,
        }
    }
}

impl Notifier for MailNotifier {
    fn notify(&self, subject: &str, body: &str) -> Result<(), ActionError> {
        let spec = CommandSpec::new(["mail", "-s", subject, self.recipient.as_str()], self.timeout)
            .with_stdin(body);
        self.runner.run(&spec)?.check().map(|_| ())
    }
}
