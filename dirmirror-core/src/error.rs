//! Error types for dirmirror-core.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Which side of the mirror a root path belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootRole {
    Source,
    Target,
}

impl fmt::Display for RootRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RootRole::Source => f.write_str("source"),
            RootRole::Target => f.write_str("target"),
        }
    }
}

/// Startup configuration failures. All of them are fatal before the sync
/// loop starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A root directory does not exist.
    #[error("{role} directory does not exist: {path}")]
    MissingRoot { role: RootRole, path: PathBuf },

    /// A root path exists but is not a directory.
    #[error("{role} path is not a directory: {path}")]
    NotADirectory { role: RootRole, path: PathBuf },

    /// Source and target are the same directory, or one contains the other.
    #[error("source {source_root} and target {target_root} must not overlap")]
    OverlappingRoots {
        source_root: PathBuf,
        target_root: PathBuf,
    },

    /// The sync interval is zero.
    #[error("sync interval must be at least one second")]
    InvalidInterval,

    /// Log rotation was configured with a zero size or zero backup count.
    #[error("log rotation needs max_bytes > 0 and max_files > 0 (got {max_bytes} bytes, {max_files} files)")]
    InvalidLogRotation { max_bytes: u64, max_files: usize },

    /// The config file (or a root, while resolving it) could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load; includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}
