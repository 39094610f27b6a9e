//! Command execution backend: kernel parameters through `sysctl -w`.
use std::time::Duration;

use crate::adapters::{CommandRunner, CommandSpec};
use crate::types::errors::ActionError;

pub(crate) fn sysctl_spec(key: &str, value: &str, timeout: Duration) -> CommandSpec {
    CommandSpec::new(["sysctl".to_string(), "-w".to_string(), format!("{key}={value}")], timeout)
}

/// Set a live kernel parameter. Offline roots have no kernel to talk to.
pub(crate) fn set_sysctl(
    runner: &dyn CommandRunner,
    live: bool,
    key: &str,
    value: &str,
    timeout: Duration,
) -> Result<(), ActionError> {
    if !live {
        return Err(ActionError::Unsupported(format!(
            "kernel parameter `{key}` can only be set on a live host"
        )));
    }
    runner.run(&sysctl_spec(key, value, timeout))?.check().map(|_| ())
}
