//! Deterministic UUIDv5 identifiers for plans and actions, random UUIDv4 for runs.
//!
//! The UUID namespace is derived from a stable tag (`NS_TAG`) so that
//! `plan_id` and `action_id` are reproducible across runs for the same
//! serialized action sequence.
use std::fmt::Write;
use uuid::Uuid;

use super::plan::{Action, Plan};
use crate::constants::NS_TAG;

/// Internal: return the UUID namespace used for deterministic IDs.
fn namespace() -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, NS_TAG.as_bytes())
}

/// Serialize an action into a stable, human-readable string used for UUIDv5 input.
fn serialize_action(a: &Action) -> String {
    let new_value = a
        .new_value
        .as_ref()
        .and_then(|v| serde_json::to_string(v).ok())
        .unwrap_or_default();
    format!("{}:{}:{}", a.kind.as_str(), a.item_id, new_value)
}

/// Compute a deterministic UUIDv5 for a plan by serializing actions in order.
///
/// Two plans with identical action sequences (including ordering) will have the
/// same `plan_id`, independent of the host root they were computed against.
#[must_use]
pub fn plan_id(plan: &Plan) -> Uuid {
    let ns = namespace();
    let mut s = String::new();
    for a in &plan.actions {
        s.push_str(&serialize_action(a));
        s.push('\n');
    }
    Uuid::new_v5(&ns, s.as_bytes())
}

/// Compute a deterministic UUIDv5 for an action as a function of the plan ID and
/// the action's serialized form, including the stable position index.
#[must_use]
pub fn action_id(plan_id: &Uuid, action: &Action, idx: usize) -> Uuid {
    let mut s = serialize_action(action);
    let _ = write!(s, "#{idx}");
    Uuid::new_v5(plan_id, s.as_bytes())
}

/// Fresh identifier for one orchestrator pass.
#[must_use]
pub fn new_run_id() -> Uuid {
    Uuid::new_v4()
}
