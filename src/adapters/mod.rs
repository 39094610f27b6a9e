//! Narrow boundaries to everything outside the process: commands, the init system,
//! alerting, packages, operator confirmation and file locks.
pub mod command;
pub mod confirm;
pub mod lock;
pub mod notify;
pub mod packages;
pub mod service;

pub use command::{CommandOutput, CommandRunner, CommandSpec, SystemCommandRunner};
pub use confirm::{Confirmer, PromptConfirmer};
pub use lock::{FileLockManager, LockGuard, LockManager};
pub use notify::{MailNotifier, Notifier};
pub use packages::{AptPackageManager, InstalledPackage, PackageManager, UpdateOutcome, VerifyOutcome};
pub use service::{ServiceManager, ServiceStatus, SystemdServiceManager};
