//! Tracing subscriber setup: console output plus an optional rotating file.
//!
//! The file layer is plain text without ANSI colours, so it reads as a list
//! of `Copied: …` / `Updated: …` / `Deleted: …` lines with timestamps.

use std::sync::Arc;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use dirmirror_core::{LogConfig, LogFormat};

use crate::error::DaemonError;
use crate::log_rotation::{LogWriter, RotatingLog};

/// Install the global subscriber. `RUST_LOG` overrides the default `info`
/// level.
///
/// Returns the log file handle (if one is configured) so the runtime can
/// rotate it. A subscriber that is already installed is left in place.
pub fn init_tracing(config: &LogConfig) -> Result<Option<Arc<RotatingLog>>, DaemonError> {
    let log_file = match &config.file {
        Some(path) => Some(Arc::new(RotatingLog::open(
            path,
            config.max_bytes,
            config.max_files,
        )?)),
        None => None,
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let text = (config.format == LogFormat::Text).then(|| fmt::layer().with_target(false));
    let json = (config.format == LogFormat::Json).then(|| fmt::layer().json().with_target(false));
    let file = log_file.clone().map(|log| {
        fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .with_writer(LogWriter::new(log))
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(text)
        .with(json)
        .with(file)
        .try_init();

    Ok(log_file)
}
