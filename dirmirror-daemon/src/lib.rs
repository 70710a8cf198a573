//! dirmirror daemon: fixed-interval sync loop, tracing setup, log rotation.

mod error;
pub mod log_rotation;
pub mod logging;
pub mod paths;
mod runtime;

pub use error::DaemonError;
pub use runtime::{run, run_cycle, run_forever};
