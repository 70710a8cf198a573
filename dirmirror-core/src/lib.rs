//! dirmirror core library: domain types, configuration, errors.
//!
//! - [`types`]: relative paths, fingerprints, snapshots, actions, reports
//! - [`config`]: daemon configuration loaded from YAML and CLI flags
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod types;

pub use config::{DaemonConfig, LogConfig, LogFormat};
pub use error::{ConfigError, RootRole};
pub use types::{
    FileError, FileOp, Fingerprint, RelPath, Snapshot, SyncAction, SyncReport, SyncSummary,
};
