//! Error types for dirmirror-sync.
//!
//! Only cycle-level failures are errors here; single-file problems are
//! recorded as [`dirmirror_core::FileError`] entries in the report.

use std::path::PathBuf;

use thiserror::Error;

/// Failures that abort a whole snapshot or cycle.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A tree root is missing, not a directory, or cannot be listed.
    #[error("cannot traverse {root}: {source}")]
    Traversal {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A snapshot worker thread panicked.
    #[error("snapshot worker for {root} panicked")]
    WorkerPanicked { root: PathBuf },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

/// Convenience constructor for [`SyncError::Traversal`].
pub(crate) fn traversal_err(root: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Traversal {
        root: root.into(),
        source,
    }
}
