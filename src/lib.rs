#![forbid(unsafe_code)]
//! Hardline: safe, idempotent, reversible application of system-configuration baselines.
//!
//! Safety model highlights:
//! - Every target is probed immediately before it is written; a target already in its desired
//!   state is never touched.
//! - File writes follow a TOCTOU-safe sequence using directory handles (open parent
//!   O_DIRECTORY|O_NOFOLLOW → openat temp → fsync → renameat → fsync(parent)).
//! - An intent carrying the prior snapshot is journaled and synced before each mutation, so any
//!   run (including one that crashed) can be rolled back.
//! - This crate forbids `unsafe` and uses `rustix` for syscalls.

pub mod adapters;
pub mod api;
pub mod baseline;
pub mod constants;
pub mod executor;
pub mod fs;
pub mod journal;
pub mod logging;
pub mod policy;
pub mod probe;
pub mod reconcile;
pub mod types;

pub use api::*;
