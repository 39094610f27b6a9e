//! Service state backend.
use std::path::Path;

use crate::adapters::ServiceManager;
use crate::types::errors::ActionError;

/// Drive a unit towards the wanted enablement and running state. Only fields that are
/// constrained and differ from `current` are touched; enablement goes first.
pub(crate) fn converge_service(
    services: &dyn ServiceManager,
    root: &Path,
    unit: &str,
    want: (Option<bool>, Option<bool>),
    current: (Option<bool>, Option<bool>),
) -> Result<(), ActionError> {
    if let Some(e) = want.0 {
        if current.0 != Some(e) {
            services.set_enabled(root, unit, e)?;
        }
    }
    if let Some(r) = want.1 {
        if current.1 != Some(r) {
            services.set_running(root, unit, r)?;
        }
    }
    Ok(())
}
