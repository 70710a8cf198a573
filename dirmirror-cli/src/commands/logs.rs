//! `dirmirror logs`: tail the daemon log file.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use dirmirror_daemon::paths::default_log_path;

#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Number of trailing lines to show.
    #[arg(long, default_value_t = 100)]
    pub lines: usize,

    /// Log file to read [default: ~/.dirmirror/logs/dirmirror.log].
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl LogsArgs {
    pub fn run(self) -> Result<()> {
        let path = match self.log_file {
            Some(path) => path,
            None => {
                let home = dirs::home_dir().context("could not determine home directory")?;
                default_log_path(&home)
            }
        };
        print_tail(&path, self.lines)
    }
}

fn print_tail(path: &Path, lines: usize) -> Result<()> {
    if !path.exists() {
        println!("log file not found: {}", path.display());
        return Ok(());
    }

    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut tail = VecDeque::<String>::new();
    for line in reader.lines() {
        let line = line.with_context(|| format!("read {}", path.display()))?;
        tail.push_back(line);
        if tail.len() > lines {
            tail.pop_front();
        }
    }

    println!("==> {} <==", path.display());
    for line in tail {
        println!("{line}");
    }
    Ok(())
}
