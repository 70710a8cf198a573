//! # dirmirror-sync
//!
//! Content-hash snapshots and one-way reconciliation.
//!
//! Call [`snapshot`] to fingerprint a tree, [`diff`] to compare two
//! snapshots, and [`reconcile`] to run a full snapshot → diff → apply cycle.

pub mod error;
pub mod fingerprint;
pub mod reconcile;
pub mod snapshot;

pub use error::SyncError;
pub use fingerprint::{fingerprint_bytes, fingerprint_file};
pub use reconcile::{apply, diff, reconcile, ReconcileOptions};
pub use snapshot::snapshot;
