//! `dirmirror run`: the long-running mirror loop.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use dirmirror_core::{ConfigError, DaemonConfig, LogFormat};
use dirmirror_daemon::{paths::default_log_path, run_forever};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Directory to mirror from.
    #[arg(required_unless_present = "config")]
    pub source: Option<PathBuf>,

    /// Directory to mirror into.
    #[arg(required_unless_present = "config")]
    pub target: Option<PathBuf>,

    /// Seconds between sync cycles [default: 900].
    #[arg(short, long)]
    pub interval: Option<u64>,

    /// YAML config file; positional roots and flags override its values.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log file path [default: ~/.dirmirror/logs/dirmirror.log].
    #[arg(long, conflicts_with = "no_log_file")]
    pub log_file: Option<PathBuf>,

    /// Log to the console only.
    #[arg(long)]
    pub no_log_file: bool,

    /// Console log format.
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormatArg>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

impl RunArgs {
    pub fn run(self) -> Result<()> {
        let config = self.into_config()?;
        run_forever(config).context("daemon exited with error")
    }

    fn into_config(self) -> Result<DaemonConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => DaemonConfig::load(path)?,
            // clap guarantees both roots when no config file is given.
            None => DaemonConfig::new(
                self.source.clone().unwrap_or_default(),
                self.target.clone().unwrap_or_default(),
            ),
        };

        if let Some(source) = self.source {
            config.source = source;
        }
        if let Some(target) = self.target {
            config.target = target;
        }
        if let Some(interval) = self.interval {
            config.interval_secs = interval;
        }
        if let Some(format) = self.log_format {
            config.log.format = format.into();
        }

        if self.no_log_file {
            config.log.file = None;
        } else if let Some(path) = self.log_file {
            config.log.file = Some(path);
        } else if config.log.file.is_none() {
            config.log.file = dirs::home_dir().map(|home| default_log_path(&home));
        }

        Ok(config)
    }
}
