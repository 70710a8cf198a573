//! Size-based rotation for the daemon's action log.
//!
//! Rotates `dirmirror.log` when it exceeds the configured size (10 MiB by
//! default), keeping at most `max_files` rotated copies:
//!   dirmirror.log → dirmirror.log.1 → dirmirror.log.2 → … → dirmirror.log.5
//!
//! [`RotatingLog`] owns the open handle so rotation can swap it while no
//! event is being written; [`LogWriter`] plugs it into `tracing_subscriber`.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing_subscriber::fmt::MakeWriter;

use crate::error::{io_err, DaemonError};

/// Rotate `log_path` if its size exceeds `max_bytes`.
///
/// Rotation sequence (oldest first):
///   `<name>.<max_files>` deleted
///   `<name>.<n>` → `<name>.<n+1>` for n = max_files-1 … 1
///   `<name>` → `<name>.1`
///   Create fresh empty `<name>`.
///
/// Returns `true` if rotation occurred, `false` if the file was under the
/// threshold (or did not exist yet).
pub fn rotate_if_needed(log_path: &Path, max_bytes: u64, max_files: usize) -> io::Result<bool> {
    let size = match fs::metadata(log_path) {
        Ok(meta) => meta.len(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };

    if size < max_bytes {
        return Ok(false);
    }

    let oldest = numbered_path(log_path, max_files);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }

    for n in (1..max_files).rev() {
        let src = numbered_path(log_path, n);
        let dst = numbered_path(log_path, n + 1);
        if src.exists() {
            fs::rename(&src, &dst)?;
        }
    }

    fs::rename(log_path, numbered_path(log_path, 1))?;

    fs::OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(log_path)?;

    Ok(true)
}

/// Build the path for the `n`-th rotated copy of `base` (e.g. `dirmirror.log.2`).
pub fn numbered_path(base: &Path, n: usize) -> PathBuf {
    let name = base
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(crate::paths::LOG_FILE_NAME);
    base.with_file_name(format!("{name}.{n}"))
}

fn open_append(path: &Path) -> io::Result<File> {
    fs::OpenOptions::new().create(true).append(true).open(path)
}

// ─── RotatingLog ──────────────────────────────────────────────────────────────

/// An append-only log file that can be rotated while in use.
#[derive(Debug)]
pub struct RotatingLog {
    path: PathBuf,
    max_bytes: u64,
    max_files: usize,
    file: Mutex<File>,
}

impl RotatingLog {
    /// Open (or create) the log at `path`, rotating first if it is already
    /// over the limit.
    pub fn open(path: &Path, max_bytes: u64, max_files: usize) -> Result<Self, DaemonError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }
        rotate_if_needed(path, max_bytes, max_files).map_err(|e| io_err(path, e))?;
        let file = open_append(path).map_err(|e| io_err(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            max_bytes,
            max_files,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rotate if over the size limit, then reopen the live file.
    ///
    /// Holds the writer lock for the whole rotation, so no log line is
    /// written to a file that is being renamed.
    pub fn rotate(&self) -> io::Result<bool> {
        let mut file = self.lock();
        file.flush()?;
        if !rotate_if_needed(&self.path, self.max_bytes, self.max_files)? {
            return Ok(false);
        }
        *file = open_append(&self.path)?;
        Ok(true)
    }

    fn lock(&self) -> MutexGuard<'_, File> {
        self.file.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// `MakeWriter` handle over a shared [`RotatingLog`].
#[derive(Debug, Clone)]
pub struct LogWriter(Arc<RotatingLog>);

impl LogWriter {
    pub fn new(log: Arc<RotatingLog>) -> Self {
        Self(log)
    }
}

impl<'a> MakeWriter<'a> for LogWriter {
    type Writer = LogGuard<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        LogGuard(self.0.lock())
    }
}

/// Exclusive access to the log file for the duration of one event.
pub struct LogGuard<'a>(MutexGuard<'a, File>);

impl Write for LogGuard<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
