//! `hardline` command-line entry point.
mod cli;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use tracing_subscriber::EnvFilter;

use hardline::adapters::{
    CommandRunner, Confirmer, MailNotifier, Notifier, PromptConfirmer, SystemCommandRunner,
};
use hardline::errors::{exit_code_for, ApiError};
use hardline::logging::{JsonlSink, LogAudit};
use hardline::policy::Policy;
use hardline::types::{hostname_under, CancelToken, Host, RunReport, RunStatus};
use hardline::{Hardline, PackageCommand};

use cli::{Cli, Commands, PackagesAction};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            let code = e
                .downcast_ref::<ApiError>()
                .map_or(2, |api| exit_code_for(api.id()));
            ExitCode::from(u8::try_from(code).unwrap_or(2))
        }
    }
}

/// SIGINT/SIGTERM cancel the pass between actions; a second signal exits at once.
fn cancel_on_signals(token: CancelToken) -> Result<()> {
    let mut signals = Signals::new([SIGINT, SIGTERM]).context("installing signal handlers")?;
    std::thread::spawn(move || {
        for sig in signals.forever() {
            if token.is_cancelled() {
                std::process::exit(128 + sig);
            }
            log::warn!("signal {sig}: stopping after the current action");
            token.cancel();
        }
    });
    Ok(())
}

fn policy_from(cli: &Cli) -> Result<Policy> {
    let mut policy = match &cli.config {
        Some(p) => Policy::load_file(p).with_context(|| format!("loading policy {}", p.display()))?,
        None => Policy::default(),
    };
    if let Some(dir) = &cli.journal_dir {
        policy.journal.dir.clone_from(dir);
    }
    if let Some(ms) = cli.timeout_ms {
        policy.timeout_per_action_ms = ms;
    }
    if let Some(n) = cli.concurrency {
        policy.host_concurrency = n;
    }
    if cli.yes {
        policy.confirm_before_apply = false;
    }
    policy.dry_run = match cli.command {
        Commands::Apply { dry_run } => dry_run,
        Commands::Plan => true,
        _ => policy.dry_run,
    };
    if let Commands::Packages {
        action: PackagesAction::Update,
    } = cli.command
    {
        policy.dry_run = false;
    }
    Ok(policy)
}

fn hosts_from(cli: &Cli) -> Vec<Host> {
    if cli.hosts.is_empty() {
        let id = cli
            .host_id
            .clone()
            .unwrap_or_else(|| hostname_under(&cli.host_root()));
        vec![Host::new(id, cli.host_root())]
    } else {
        cli.hosts
            .iter()
            .map(|(id, root)| Host::new(id.clone(), root.clone()))
            .collect()
    }
}

fn print_reports(cli: &Cli, reports: &[&RunReport]) -> Result<()> {
    if cli.json {
        let out = if let [one] = reports {
            serde_json::to_string_pretty(one)?
        } else {
            serde_json::to_string_pretty(reports)?
        };
        println!("{out}");
    } else {
        for r in reports {
            print!("{}", r.render_text());
        }
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<u8> {
    let policy = policy_from(cli)?;
    let facts = match &cli.facts {
        Some(p) => JsonlSink::to_file(p).with_context(|| format!("opening facts file {}", p.display()))?,
        None => JsonlSink::default(),
    };
    let commands: Arc<dyn CommandRunner> = Arc::new(SystemCommandRunner);
    let confirmer: Option<Box<dyn Confirmer>> = policy
        .confirm_before_apply
        .then(|| Box::new(PromptConfirmer) as Box<dyn Confirmer>);
    let notifier: Option<Box<dyn Notifier>> = policy.notify.recipient.as_ref().map(|to| {
        Box::new(MailNotifier::new(
            to.clone(),
            Arc::clone(&commands),
            policy.action_timeout(),
        )) as Box<dyn Notifier>
    });
    let api = Hardline::builder(facts, LogAudit, policy)
        .command_runner(commands)
        .confirmer(confirmer)
        .notifier(notifier)
        .build();
    cancel_on_signals(api.cancel_token())?;

    match &cli.command {
        Commands::Plan | Commands::Apply { .. } => {
            let path = cli
                .baseline
                .as_deref()
                .context("--baseline is required")?;
            let baseline = api.load_file(path)?;
            let hosts = hosts_from(cli);
            let results = if hosts.len() == 1 {
                vec![(hosts[0].id.clone(), api.apply(&baseline, &hosts[0]))]
            } else {
                api.run_fleet(&baseline, &hosts)
            };
            let mut code: u8 = 0;
            let mut reports: Vec<&RunReport> = Vec::new();
            for (host, res) in &results {
                match res {
                    Ok(r) => {
                        code = code.max(u8::try_from(r.status.exit_code()).unwrap_or(2));
                        reports.push(r);
                    }
                    Err(e) => {
                        eprintln!("error: {host}: {e}");
                        code = 2;
                    }
                }
            }
            print_reports(cli, &reports)?;
            Ok(code)
        }
        Commands::Rollback { run_id } => {
            let host_id = api
                .runs(None)?
                .into_iter()
                .find(|r| r.run_id == *run_id)
                .map(|r| r.host_id)
                .ok_or(ApiError::RunNotFound(*run_id))?;
            let root = cli.rollback_root(&host_id).map_err(anyhow::Error::msg)?;
            let report = api.rollback(run_id, root.as_deref())?;
            print_reports(cli, &[&report])?;
            Ok(u8::from(report.status != RunStatus::Success))
        }
        Commands::Report { run_id } => {
            let report = api.report(run_id)?;
            print_reports(cli, &[&report])?;
            Ok(0)
        }
        Commands::Runs => {
            let runs = api.runs(cli.host_id.as_deref())?;
            for r in runs {
                let status = r.status.map_or_else(|| "incomplete".to_string(), |s| s.to_string());
                match r.rollback_of {
                    Some(of) => println!("{}  {}  {}  {}  rollback of {of}", r.run_id, r.host_id, r.started_at, status),
                    None => println!("{}  {}  {}  {}", r.run_id, r.host_id, r.started_at, status),
                }
            }
            Ok(0)
        }
        Commands::Packages { action } => {
            let cmd = match action {
                PackagesAction::List => PackageCommand::List,
                PackagesAction::Update => PackageCommand::Update,
                PackagesAction::Verify => PackageCommand::Verify,
            };
            let host = hosts_from(cli)
                .into_iter()
                .next()
                .context("no host selected")?;
            let res = api.packages(&host, cmd)?;
            println!("{}", serde_json::to_string_pretty(&res)?);
            Ok(0)
        }
    }
}
