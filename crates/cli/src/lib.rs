#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! Thin `clap`-derived argument parsing and process entry point: parses
//! argv, wires up [`logging::init`], drives [`engine::sync`], and maps the
//! outcome onto one of the three documented exit codes.
//!
//! # Design
//!
//! `run` never calls `std::process::exit` itself so it stays testable —
//! it takes argv and a pair of writers and returns a [`Status`] that
//! [`exit_code_from`] turns into a real `ExitCode` at the real process
//! boundary in `main`.

use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;

use engine::{StrategyConfig, SyncAction, SyncActionKind, SyncError};

/// `sync <source> <destination> [--strategy copy|delta] [--block-size <bytes>] [--dry-run] [-v]`
#[derive(Parser, Debug)]
#[command(name = "sync", version, about = "Local directory synchronizer")]
struct Cli {
    /// Source tree to synchronize from.
    source: PathBuf,
    /// Destination tree to bring into agreement with `source`.
    destination: PathBuf,
    /// Strategy used for files that already exist in the destination but differ.
    #[arg(long, value_enum, default_value_t = StrategyArg::Copy)]
    strategy: StrategyArg,
    /// Block size in bytes; only meaningful with `--strategy delta`.
    #[arg(long, default_value_t = signature::DEFAULT_BLOCK_SIZE)]
    block_size: u32,
    /// Report planned actions without mutating the destination.
    #[arg(long)]
    dry_run: bool,
    /// Also report skipped entries, not just mutating ones.
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum StrategyArg {
    Copy,
    Delta,
}

/// The outcome of one `run` invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    /// Completed successfully (or `--help`/`--version` was shown).
    Success,
    /// Invalid arguments; nothing was attempted.
    ArgumentError,
    /// An I/O or strategy failure occurred partway through the run.
    Failure,
}

/// Maps a [`Status`] onto the documented process exit code.
#[must_use]
pub fn exit_code_from(status: Status) -> ExitCode {
    match status {
        Status::Success => ExitCode::SUCCESS,
        Status::ArgumentError => ExitCode::from(1),
        Status::Failure => ExitCode::from(2),
    }
}

/// Parses `args`, runs the synchronizer, and writes output/errors to the
/// given writers.
pub fn run<I, Out, Err>(args: I, stdout: &mut Out, stderr: &mut Err) -> Status
where
    I: IntoIterator,
    I::Item: Into<OsString>,
    Out: Write,
    Err: Write,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => {
            if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                let _ = write!(stdout, "{err}");
                return Status::Success;
            }
            let _ = write!(stderr, "{err}");
            return Status::ArgumentError;
        }
    };

    if cli.block_size == 0 {
        let _ = writeln!(stderr, "error: --block-size must be greater than zero");
        return Status::ArgumentError;
    }

    logging::init(cli.verbose);

    let strategy = match cli.strategy {
        StrategyArg::Copy => StrategyConfig::Copy,
        StrategyArg::Delta => StrategyConfig::Delta {
            block_size: cli.block_size,
        },
    };

    let result = engine::sync(
        &cli.source,
        &cli.destination,
        strategy,
        cli.dry_run,
        cli.verbose,
        |action| {
            let _ = writeln!(stdout, "{}", render_action(action));
        },
    );

    match result {
        Ok(_) => Status::Success,
        Err(err) => {
            let _ = writeln!(stderr, "error: {err}");
            match err {
                SyncError::Argument { .. } => Status::ArgumentError,
                SyncError::SourceIo { .. }
                | SyncError::DestinationIo { .. }
                | SyncError::Strategy { .. }
                | SyncError::Internal { .. } => Status::Failure,
            }
        }
    }
}

fn render_action(action: &SyncAction) -> String {
    let verb = match action.kind {
        SyncActionKind::CreateDir => "create-dir",
        SyncActionKind::SkipDir => "skip-dir",
        SyncActionKind::CreateFile => "create-file",
        SyncActionKind::SkipFile => "skip-file",
        SyncActionKind::CopyFile => "copy-file",
        SyncActionKind::DeltaFile => "delta-file",
    };
    match &action.reason {
        Some(reason) => format!("{verb} {} ({reason})", action.path.display()),
        None => format!("{verb} {}", action.path.display()),
    }
}
