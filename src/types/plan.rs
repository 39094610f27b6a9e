use std::fmt;

use serde::{Deserialize, Serialize};

use super::value::{Snapshot, Value};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ApplyMode {
    #[default]
    DryRun,
    Commit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Create,
    Modify,
    NoOp,
    Unsupported,
}

impl ActionKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Create => "create",
            ActionKind::Modify => "modify",
            ActionKind::NoOp => "noop",
            ActionKind::Unsupported => "unsupported",
        }
    }

    #[must_use]
    pub const fn is_mutating(&self) -> bool {
        matches!(self, ActionKind::Create | ActionKind::Modify)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One planned step for one baseline item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub item_id: String,
    pub kind: ActionKind,
    /// Snapshot taken at planning time; the executor re-probes before writing.
    pub prior: Option<Snapshot>,
    pub new_value: Option<Value>,
    /// Why an action is `Unsupported`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Ordered action list: dependencies always precede their dependents.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Plan {
    pub actions: Vec<Action>,
}

impl Plan {
    #[must_use]
    pub fn get(&self, item_id: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.item_id == item_id)
    }

    #[must_use]
    pub fn position(&self, item_id: &str) -> Option<usize> {
        self.actions.iter().position(|a| a.item_id == item_id)
    }

    #[must_use]
    pub fn has_mutations(&self) -> bool {
        self.actions.iter().any(|a| a.kind.is_mutating())
    }

    #[must_use]
    pub fn count(&self, kind: ActionKind) -> usize {
        self.actions.iter().filter(|a| a.kind == kind).count()
    }
}
