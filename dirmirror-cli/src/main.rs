//! dirmirror: one-way directory mirroring daemon.
//!
//! # Usage
//!
//! ```text
//! dirmirror run <source> <target> [-i <secs>] [--config <file>] [--log-file <path>] [--no-log-file]
//! dirmirror sync <source> <target> [--dry-run] [--json]
//! dirmirror logs [--lines <n>] [--log-file <path>]
//! ```
//!
//! Exit status is 2 for configuration errors (missing roots, bad interval,
//! unreadable config file) and 1 for any other failure.

mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use commands::{logs::LogsArgs, run::RunArgs, sync::SyncArgs};
use dirmirror_core::ConfigError;

/// Exit status for configuration errors.
const EXIT_CONFIG: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "dirmirror",
    version,
    about = "Keep a target directory an exact copy of a source directory",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Mirror source into target on a fixed interval until interrupted.
    Run(RunArgs),

    /// Run a single reconciliation cycle and print what changed.
    Sync(SyncArgs),

    /// Print recent lines from the daemon log file.
    Logs(LogsArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run(args) => args.run(),
        Commands::Sync(args) => args.run(),
        Commands::Logs(args) => args.run(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            exit_code_for(&err)
        }
    }
}

fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    let is_config = err
        .chain()
        .any(|cause| cause.downcast_ref::<ConfigError>().is_some());
    if is_config {
        ExitCode::from(EXIT_CONFIG)
    } else {
        ExitCode::FAILURE
    }
}
