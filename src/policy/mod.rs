//! Run configuration.
//!
//! Consumers typically construct a [`Policy`](crate::policy::Policy) via `Policy::default()`
//! or `Policy::production_preset()`, or load one from YAML, then customize fields before
//! creating a [`Hardline`](crate::Hardline) instance.
//!
//! Submodules:
//! - `config`: policy struct, presets and YAML loading
//! - `types`: grouped journal and notification settings

pub mod config;
pub mod types;

pub use config::Policy;
pub use types::{JournalPolicy, NotifyOn, NotifyPolicy};
