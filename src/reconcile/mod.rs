//! Pure planning: desired state + observed state -> ordered actions.
//!
//! Nothing here touches the host. A dry run ends with the [`Plan`] produced by [`plan`].
use std::collections::{HashMap, HashSet};

use crate::baseline::topo_order;
use crate::types::errors::ProbeError;
use crate::types::{Action, ActionKind, Baseline, BaselineItem, Plan, ProbeResult, Target};

/// Decide the action for one item given its probe outcome.
#[must_use]
pub fn classify(item: &BaselineItem, probe: Option<&Result<ProbeResult, ProbeError>>) -> Action {
    let desired = item.desired_value();
    let unsupported = |prior, reason: String| Action {
        item_id: item.id.clone(),
        kind: ActionKind::Unsupported,
        prior,
        new_value: Some(desired.clone()),
        reason: Some(reason),
    };
    let r = match probe {
        None => return unsupported(None, "not probed".to_string()),
        Some(Err(e)) => return unsupported(None, e.reason.clone()),
        Some(Ok(r)) => r,
    };
    let prior = Some(r.snapshot());
    if r.present_on_disk && !r.readable {
        return unsupported(prior, format!("{} is present but unreadable", item.target.display()));
    }
    let Some(current) = r.current_value.as_ref() else {
        return unsupported(prior, "no observable value".to_string());
    };
    let kind = if desired.satisfied_by(current) {
        ActionKind::NoOp
    } else if r.present_on_disk {
        ActionKind::Modify
    } else if item.can_create() {
        if r.parent_missing {
            return unsupported(
                prior,
                format!("parent directory of {} does not exist", item.target.display()),
            );
        }
        ActionKind::Create
    } else {
        return unsupported(
            prior,
            format!("{} is absent and {} cannot create it", item.target.display(), item.kind),
        );
    };
    Action {
        item_id: item.id.clone(),
        kind,
        prior,
        new_value: Some(desired),
        reason: None,
    }
}

/// True when some item `item` depends on, directly or not, is planned to create the very
/// file `item` targets.
fn created_upstream(baseline: &Baseline, creates: &HashSet<&str>, item: &BaselineItem) -> bool {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&str> = item.depends_on.iter().map(String::as_str).collect();
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        let Some(dep) = baseline.get(id) else {
            continue;
        };
        if creates.contains(id) && dep.target == item.target {
            return true;
        }
        stack.extend(dep.depends_on.iter().map(String::as_str));
    }
    false
}

/// Build the ordered plan. Dependencies always precede dependents; ties keep declaration
/// order. A validated baseline always sorts; an unsortable one yields an empty plan.
///
/// An item whose absent target cannot be created by its own kind is planned as `Modify`
/// when a dependency creates that file earlier in the same pass; the executor re-probes
/// before writing, so it then finds the file in place.
#[must_use]
pub fn plan(baseline: &Baseline, probes: &HashMap<String, Result<ProbeResult, ProbeError>>) -> Plan {
    let Ok(order) = topo_order(&baseline.items) else {
        return Plan::default();
    };
    let mut actions: Vec<Action> = order
        .into_iter()
        .map(|i| {
            let item = &baseline.items[i];
            classify(item, probes.get(&item.id))
        })
        .collect();

    let creates: HashSet<&str> = actions
        .iter()
        .filter(|a| a.kind == ActionKind::Create)
        .map(|a| a.item_id.as_str())
        .collect();
    let deferred: Vec<usize> = actions
        .iter()
        .enumerate()
        .filter(|(_, a)| a.kind == ActionKind::Unsupported)
        .filter(|(_, a)| {
            let Some(item) = baseline.get(&a.item_id) else {
                return false;
            };
            let awaits_file = matches!(item.target, Target::File(_))
                && !item.can_create()
                && matches!(
                    probes.get(&item.id),
                    Some(Ok(r)) if !r.present_on_disk && !r.parent_missing
                );
            awaits_file && created_upstream(baseline, &creates, item)
        })
        .map(|(idx, _)| idx)
        .collect();
    for idx in deferred {
        actions[idx].kind = ActionKind::Modify;
        actions[idx].reason = None;
    }
    Plan { actions }
}
