use serde::{Deserialize, Serialize};

use super::value::{Snapshot, Value};

/// Actual state of one item's target, produced fresh per reconciliation pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub item_id: String,
    /// `None` only when the target exists but could not be read.
    pub current_value: Option<Value>,
    pub present_on_disk: bool,
    pub readable: bool,
    /// An absent file target whose parent directory does not exist either.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub parent_missing: bool,
}

impl ProbeResult {
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            present: self.present_on_disk,
            value: self.current_value.clone(),
        }
    }
}
