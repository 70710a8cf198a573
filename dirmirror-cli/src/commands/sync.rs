//! `dirmirror sync`: one reconciliation cycle, printed.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use dirmirror_core::{DaemonConfig, SyncReport};
use dirmirror_sync::{reconcile, ReconcileOptions};

/// Arguments for `dirmirror sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Directory to mirror from.
    pub source: PathBuf,

    /// Directory to mirror into.
    pub target: PathBuf,

    /// Show what would change without touching the target.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the full report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let config = DaemonConfig::new(&self.source, &self.target);
        config.validate()?;

        let options = ReconcileOptions {
            dry_run: self.dry_run,
        };
        let report = reconcile(&config.source, &config.target, &options).with_context(|| {
            format!(
                "sync failed for {} -> {}",
                config.source.display(),
                config.target.display()
            )
        })?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to render report JSON")?
            );
        } else {
            print_report(&report);
        }

        if !report.errors.is_empty() {
            bail!("{} file(s) could not be synced", report.errors.len());
        }
        Ok(())
    }
}

fn print_report(report: &SyncReport) {
    let prefix = if report.dry_run { "[dry-run] " } else { "" };

    if report.is_clean() {
        println!("{prefix}✓ nothing to do");
        return;
    }

    for path in &report.copied {
        println!("  {}  Copied: {path}", "+".green());
    }
    for path in &report.updated {
        println!("  {}  Updated: {path}", "~".yellow());
    }
    for path in &report.deleted {
        println!("  {}  Deleted: {path}", "-".red());
    }
    for error in &report.errors {
        println!("  {}  Failed: {error}", "!".red().bold());
    }

    println!("{prefix}✓ synced ({})", report.summary());
}
