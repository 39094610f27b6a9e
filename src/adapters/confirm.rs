use std::io::{BufRead, Write};

use crate::types::Plan;

/// Gate between planning and applying.
pub trait Confirmer: Send + Sync {
    /// Return true to proceed with `plan` on `host_id`.
    fn confirm(&self, host_id: &str, plan: &Plan) -> bool;
}

/// Interactive prompt on stdin/stderr. Anything but `y`/`yes` declines.
#[derive(Clone, Copy, Debug, Default)]
pub struct PromptConfirmer;

impl Confirmer for PromptConfirmer {
    fn confirm(&self, host_id: &str, plan: &Plan) -> bool {
        let mutating = plan.actions.iter().filter(|a| a.kind.is_mutating()).count();
        let mut err = std::io::stderr().lock();
        let _ = write!(err, "apply {mutating} change(s) to {host_id}? [y/N] ");
        let _ = err.flush();
        let mut answer = String::new();
        if std::io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}
