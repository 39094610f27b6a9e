//! Command-line argument parsing.
//!
//! Keeps argument parsing separate from execution logic in `main.rs`.
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Hardline: apply a hardening baseline safely, idempotently and reversibly
#[derive(Parser, Debug)]
#[command(name = "hardline")]
#[command(about = "Apply a system-configuration baseline with journaled rollback", long_about = None)]
#[command(version)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// Baseline document (YAML)
    #[arg(long, short = 'b', global = true)]
    pub baseline: Option<PathBuf>,

    /// Filesystem root of the host to reconcile [default: /]; `rollback` defaults to the
    /// root the run was applied under
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Host id used for the journal partition (defaults to <root>/etc/hostname)
    #[arg(long, global = true)]
    pub host_id: Option<String>,

    /// Reconcile several hosts: ID=ROOT, repeatable
    #[arg(long = "host", global = true, value_name = "ID=ROOT", value_parser = parse_host)]
    pub hosts: Vec<(String, PathBuf)>,

    /// Journal directory (overrides the policy file)
    #[arg(long, global = true)]
    pub journal_dir: Option<PathBuf>,

    /// Policy file (YAML)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Deadline for each external command, in milliseconds
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Hosts reconciled in parallel with --host
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,

    /// Do not ask for confirmation before applying
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Append structured facts to this JSONL file
    #[arg(long, global = true)]
    pub facts: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Probe and print the planned actions without changing anything
    Plan,

    /// Apply the baseline (exit 0 success, 1 partial failure, 2 aborted)
    Apply {
        /// Stop after planning, as `plan` does
        #[arg(long)]
        dry_run: bool,
    },

    /// Restore every change a journaled run made
    Rollback {
        /// Run to reverse
        run_id: uuid::Uuid,
    },

    /// Print the report of a journaled run
    Report {
        run_id: uuid::Uuid,
    },

    /// List journaled runs
    Runs,

    /// Query, update or verify installed packages on the live host
    Packages {
        #[arg(value_enum)]
        action: PackagesAction,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum PackagesAction {
    List,
    Update,
    Verify,
}

fn parse_host(s: &str) -> Result<(String, PathBuf), String> {
    let (id, root) = s
        .split_once('=')
        .ok_or_else(|| format!("expected ID=ROOT, got `{s}`"))?;
    if id.is_empty() || root.is_empty() {
        return Err(format!("expected ID=ROOT, got `{s}`"));
    }
    Ok((id.to_string(), PathBuf::from(root)))
}

impl Cli {
    /// Root of the single host addressed without `--host`.
    pub fn host_root(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(|| PathBuf::from("/"))
    }

    /// Root to restore a run of `host_id` onto. `None` defers to the root the run recorded.
    ///
    /// With `--host` entries, the one for `host_id` is used and a missing entry is an error.
    pub fn rollback_root(&self, host_id: &str) -> Result<Option<PathBuf>, String> {
        if self.hosts.is_empty() {
            return Ok(self.root.clone());
        }
        self.hosts
            .iter()
            .find(|(id, _)| id == host_id)
            .map(|(_, root)| Some(root.clone()))
            .ok_or_else(|| format!("no --host entry for `{host_id}`"))
    }
}
