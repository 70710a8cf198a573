//! Daemon configuration.
//!
//! Loaded from an optional YAML file, then overridden by CLI flags.
//! Relative root paths in a config file resolve against the file's directory.
//!
//! ```yaml
//! source: /srv/data
//! target: /mnt/backup/data
//! interval_secs: 900
//! log:
//!   file: /var/log/dirmirror.log
//!   max_bytes: 10485760
//!   max_files: 5
//!   format: text
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, RootRole};

/// Default seconds between cycles.
pub const DEFAULT_INTERVAL_SECS: u64 = 900;

/// Maximum log file size before rotation (10 MiB).
pub const DEFAULT_MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;

/// Maximum number of rotated backup files to keep.
pub const DEFAULT_MAX_LOG_FILES: usize = 5;

/// Console log encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Where and how the daemon writes its log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Rotating plain-text log file. `None` logs to the console only.
    pub file: Option<PathBuf>,
    pub max_bytes: u64,
    pub max_files: usize,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: None,
            max_bytes: DEFAULT_MAX_LOG_BYTES,
            max_files: DEFAULT_MAX_LOG_FILES,
            format: LogFormat::Text,
        }
    }
}

/// Everything `run_forever` needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DaemonConfig {
    pub source: PathBuf,
    pub target: PathBuf,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default)]
    pub log: LogConfig,
}

fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}

impl DaemonConfig {
    pub fn new(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            interval_secs: DEFAULT_INTERVAL_SECS,
            log: LogConfig::default(),
        }
    }

    #[must_use]
    pub fn with_interval_secs(mut self, secs: u64) -> Self {
        self.interval_secs = secs;
        self
    }

    /// Load a YAML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self =
            serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        if let Some(base) = path.parent() {
            config.source = resolve_against(base, &config.source);
            config.target = resolve_against(base, &config.target);
            if let Some(file) = config.log.file.take() {
                config.log.file = Some(resolve_against(base, &file));
            }
        }
        Ok(config)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Check that both roots are existing, distinct, non-nested directories
    /// and that the interval and log limits are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs == 0 {
            return Err(ConfigError::InvalidInterval);
        }
        if self.log.max_bytes == 0 || self.log.max_files == 0 {
            return Err(ConfigError::InvalidLogRotation {
                max_bytes: self.log.max_bytes,
                max_files: self.log.max_files,
            });
        }

        let source = check_root(RootRole::Source, &self.source)?;
        let target = check_root(RootRole::Target, &self.target)?;
        if source.starts_with(&target) || target.starts_with(&source) {
            return Err(ConfigError::OverlappingRoots {
                source_root: self.source.clone(),
                target_root: self.target.clone(),
            });
        }
        Ok(())
    }
}

fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Returns the canonical form of an existing directory root.
fn check_root(role: RootRole, path: &Path) -> Result<PathBuf, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::MissingRoot {
            role,
            path: path.to_path_buf(),
        });
    }
    if !path.is_dir() {
        return Err(ConfigError::NotADirectory {
            role,
            path: path.to_path_buf(),
        });
    }
    std::fs::canonicalize(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}
