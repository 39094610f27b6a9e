//! Per-instance simulation overrides used for test-only or controlled scenarios.
use crate::fs::Fault;

/// Overrides for simulation in tests and controlled environments.
#[derive(Clone, Debug, Default, Copy)]
pub struct Overrides {
    /// Interrupt every file write of `apply` and `rollback` at the given point.
    /// The target must be left in its prior state and the item reported as failed.
    pub fault: Option<Fault>,
    /// Fail journal appends once a run has written this many records.
    pub journal_records: Option<usize>,
}

impl Overrides {
    #[must_use]
    /// Construct an overrides struct with `fault` set.
    pub fn fault(f: Fault) -> Self {
        Self {
            fault: Some(f),
            ..Self::default()
        }
    }

    #[must_use]
    /// Construct an overrides struct that runs the journal out of space after `n` records.
    pub fn journal_records(n: usize) -> Self {
        Self {
            journal_records: Some(n),
            ..Self::default()
        }
    }
}
