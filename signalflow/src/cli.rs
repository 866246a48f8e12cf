//! Operator command line.
//!
//! `signalflow replay --id=<signalId>` prints a human-readable report to
//! stdout and exits 0 on a completed replay, 1 on not-found or failure.
//! The crate ships no concrete scoring pipeline, so a binary supplies one
//! through [`main_with`].

use crate::config::EngineConfig;
use crate::observability::init_tracing;
use crate::replay::{
    render_report, JsonFileSignalStore, PipelineEntry, ReplayComparator, ReplayOutcome,
    SignalStore,
};
use clap::{ArgAction, Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::error;

/// Exit status of a completed replay.
pub const EXIT_OK: u8 = 0;
/// Exit status for not-found and failures.
pub const EXIT_FAILURE: u8 = 1;

/// Top-level arguments.
#[derive(Parser, Debug)]
#[command(name = "signalflow")]
#[command(about = "Operator tooling for signalflow pipelines")]
pub struct Cli {
    /// The command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Re-run a stored signal and report drift.
    Replay(ReplayArgs),
}

/// Arguments of `replay`.
#[derive(clap::Args, Debug, Clone)]
pub struct ReplayArgs {
    /// The signal to replay.
    #[arg(long)]
    pub id: String,
    /// Directory of `<signalId>.json` snapshots, or a JSON array file.
    #[arg(long)]
    pub store: Option<PathBuf>,
    /// Print the outcome as JSON instead of the text report.
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,
}

/// Runs a parsed command and returns its exit status.
pub async fn run<W, E>(cli: Cli, comparator: ReplayComparator, out: &mut W, err: &mut E) -> u8
where
    W: Write,
    E: Write,
{
    match cli.command {
        Command::Replay(args) => replay_command(&args, comparator, out, err).await,
    }
}

/// Runs `replay`.
///
/// `--store` replaces any store already attached to `comparator`.
pub async fn replay_command<W, E>(
    args: &ReplayArgs,
    comparator: ReplayComparator,
    out: &mut W,
    err: &mut E,
) -> u8
where
    W: Write,
    E: Write,
{
    let comparator = match &args.store {
        Some(path) => match JsonFileSignalStore::open(path) {
            Ok(store) => comparator.with_store(Arc::new(store)),
            Err(e) => return fail(err, &e),
        },
        None => comparator,
    };

    let outcome = match comparator.replay(&args.id).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(signal_id = %args.id, error = %e, "Replay failed");
            return fail(err, &e);
        }
    };

    let written = if args.json {
        serde_json::to_string_pretty(&outcome)
            .map_err(std::io::Error::other)
            .and_then(|text| writeln!(out, "{text}"))
    } else {
        write!(out, "{}", render_report(&outcome))
    };
    if let Err(e) = written {
        return fail(err, &e);
    }

    exit_status(&outcome)
}

/// Maps a replay outcome to its exit status.
#[must_use]
pub fn exit_status(outcome: &ReplayOutcome) -> u8 {
    if outcome.is_not_found() {
        EXIT_FAILURE
    } else {
        EXIT_OK
    }
}

/// Entry point for a binary embedding a concrete pipeline.
///
/// Parses process arguments, loads [`EngineConfig::from_env`] and installs
/// the tracing subscriber before dispatching.
pub async fn main_with(
    pipeline: Arc<dyn PipelineEntry>,
    store: Option<Arc<dyn SignalStore>>,
) -> ExitCode {
    let cli = Cli::parse();
    let mut stderr = std::io::stderr();

    let config = match EngineConfig::from_env() {
        Ok(config) => config,
        Err(e) => return ExitCode::from(fail(&mut stderr, &e)),
    };
    init_tracing(config.log_format);

    let mut comparator = config.configure_comparator(ReplayComparator::new(pipeline));
    if let Some(store) = store {
        comparator = comparator.with_store(store);
    }

    let code = run(cli, comparator, &mut std::io::stdout(), &mut stderr).await;
    ExitCode::from(code)
}

fn fail<E: Write>(err: &mut E, error: &dyn std::fmt::Display) -> u8 {
    // Nothing left to report to if stderr itself is gone.
    let _ = writeln!(err, "error: {error}");
    EXIT_FAILURE
}
