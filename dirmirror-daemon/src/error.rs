use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the daemon runtime and its log file.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(#[from] dirmirror_core::ConfigError),

    #[error("sync error: {0}")]
    Sync(#[from] dirmirror_sync::SyncError),

    #[error("task join error: {0}")]
    Join(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
