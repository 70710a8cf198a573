use std::path::{Path, PathBuf};
use std::time::Duration;

pub const LOG_FILE_NAME: &str = "dirmirror.log";

/// How often the rotation task checks the log size.
pub const ROTATION_CHECK_INTERVAL: Duration = Duration::from_secs(5);

pub fn dirmirror_root(home: &Path) -> PathBuf {
    home.join(".dirmirror")
}

pub fn logs_dir(home: &Path) -> PathBuf {
    dirmirror_root(home).join("logs")
}

pub fn default_log_path(home: &Path) -> PathBuf {
    logs_dir(home).join(LOG_FILE_NAME)
}
