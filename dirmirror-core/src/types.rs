//! Domain types for one reconciliation cycle.
//!
//! Relative paths inside a tree are [`RelPath`] (`/`-separated strings);
//! filesystem locations are always `PathBuf`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RelPath
// ---------------------------------------------------------------------------

/// A root-relative file path with `/` separators and no `.`/`..` components.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelPath(String);

impl RelPath {
    /// Express `path` relative to `root`.
    ///
    /// Returns `None` when `path` is not strictly below `root`, or when one of
    /// its components is not valid UTF-8.
    pub fn from_root(root: &Path, path: &Path) -> Option<Self> {
        let relative = path.strip_prefix(root).ok()?;
        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_str()?),
                _ => return None,
            }
        }
        if parts.is_empty() {
            return None;
        }
        Some(Self(parts.join("/")))
    }

    /// Like [`RelPath::from_root`] but never fails; non-UTF-8 bytes are
    /// replaced. Only suitable for error reporting.
    pub fn lossy(root: &Path, path: &Path) -> Self {
        let relative = path.strip_prefix(root).unwrap_or(path);
        let joined = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/");
        Self(joined)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolve this path under `root` with native separators.
    pub fn to_path(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        path.extend(self.0.split('/'));
        path
    }

    /// `true` if `self` is `ancestor` or lies underneath it. The empty path
    /// is the root, so everything lies within it.
    pub fn is_within(&self, ancestor: &RelPath) -> bool {
        ancestor.0.is_empty()
            || self.0 == ancestor.0
            || (self.0.starts_with(&ancestor.0)
                && self.0.as_bytes().get(ancestor.0.len()) == Some(&b'/'))
    }
}

impl fmt::Display for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for RelPath {
    fn from(s: &str) -> Self {
        Self(s.replace('\\', "/").trim_matches('/').to_owned())
    }
}

impl From<String> for RelPath {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

// ---------------------------------------------------------------------------
// Fingerprint
// ---------------------------------------------------------------------------

/// 128-bit content digest of a file's bytes. Used only for equality.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint([u8; 16]);

impl Fingerprint {
    pub const fn from_digest(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// ---------------------------------------------------------------------------
// Per-file errors
// ---------------------------------------------------------------------------

/// The filesystem operation a [`FileError`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileOp {
    Read,
    Copy,
    Update,
    Delete,
}

impl fmt::Display for FileOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileOp::Read => "read",
            FileOp::Copy => "copy",
            FileOp::Update => "update",
            FileOp::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// A single-file failure, recorded in the report instead of aborting the cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileError {
    pub path: RelPath,
    pub op: FileOp,
    pub cause: String,
}

impl FileError {
    pub fn new(path: RelPath, op: FileOp, cause: impl fmt::Display) -> Self {
        Self {
            path,
            op,
            cause: cause.to_string(),
        }
    }
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.op, self.path, self.cause)
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Path → fingerprint map for one tree, plus the entries that could not be
/// read while building it. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    files: BTreeMap<RelPath, Fingerprint>,
    unreadable: Vec<FileError>,
}

impl Snapshot {
    pub fn from_parts(files: BTreeMap<RelPath, Fingerprint>, unreadable: Vec<FileError>) -> Self {
        Self { files, unreadable }
    }

    pub fn get(&self, path: &RelPath) -> Option<&Fingerprint> {
        self.files.get(path)
    }

    pub fn contains(&self, path: &RelPath) -> bool {
        self.files.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Entries in sorted path order.
    pub fn iter(&self) -> impl Iterator<Item = (&RelPath, &Fingerprint)> {
        self.files.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &RelPath> {
        self.files.keys()
    }

    pub fn files(&self) -> &BTreeMap<RelPath, Fingerprint> {
        &self.files
    }

    pub fn unreadable(&self) -> &[FileError] {
        &self.unreadable
    }

    /// `true` if `path`, or a directory containing it, could not be read.
    pub fn covers_unreadable(&self, path: &RelPath) -> bool {
        self.unreadable.iter().any(|e| path.is_within(&e.path))
    }
}

impl FromIterator<(RelPath, Fingerprint)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (RelPath, Fingerprint)>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().collect(),
            unreadable: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// SyncAction
// ---------------------------------------------------------------------------

/// One filesystem change needed to bring the target in line with the source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "action", content = "path", rename_all = "lowercase")]
pub enum SyncAction {
    /// Exists only in the source.
    Copy(RelPath),
    /// Exists in both with different content.
    Update(RelPath),
    /// Exists only in the target.
    Delete(RelPath),
}

impl SyncAction {
    pub fn path(&self) -> &RelPath {
        match self {
            SyncAction::Copy(p) | SyncAction::Update(p) | SyncAction::Delete(p) => p,
        }
    }

    pub fn op(&self) -> FileOp {
        match self {
            SyncAction::Copy(_) => FileOp::Copy,
            SyncAction::Update(_) => FileOp::Update,
            SyncAction::Delete(_) => FileOp::Delete,
        }
    }

    /// Log label: `Copied`, `Updated`, or `Deleted`.
    pub fn past_tense(&self) -> &'static str {
        match self {
            SyncAction::Copy(_) => "Copied",
            SyncAction::Update(_) => "Updated",
            SyncAction::Delete(_) => "Deleted",
        }
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.op(), self.path())
    }
}

// ---------------------------------------------------------------------------
// SyncReport
// ---------------------------------------------------------------------------

/// Outcome of one reconciliation cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    pub copied: Vec<RelPath>,
    pub updated: Vec<RelPath>,
    pub deleted: Vec<RelPath>,
    pub errors: Vec<FileError>,
}

impl SyncReport {
    pub fn new(started_at: DateTime<Utc>, dry_run: bool) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            dry_run,
            copied: Vec::new(),
            updated: Vec::new(),
            deleted: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Record an action that was applied (or would have been, in dry-run).
    pub fn record(&mut self, action: &SyncAction) {
        let path = action.path().clone();
        match action {
            SyncAction::Copy(_) => self.copied.push(path),
            SyncAction::Update(_) => self.updated.push(path),
            SyncAction::Delete(_) => self.deleted.push(path),
        }
    }

    /// Recorded actions in application order: copies, updates, deletes.
    pub fn actions(&self) -> Vec<SyncAction> {
        let copies = self.copied.iter().cloned().map(SyncAction::Copy);
        let updates = self.updated.iter().cloned().map(SyncAction::Update);
        let deletes = self.deleted.iter().cloned().map(SyncAction::Delete);
        copies.chain(updates).chain(deletes).collect()
    }

    pub fn action_count(&self) -> usize {
        self.copied.len() + self.updated.len() + self.deleted.len()
    }

    /// No actions and no errors.
    pub fn is_clean(&self) -> bool {
        self.action_count() == 0 && self.errors.is_empty()
    }

    pub fn summary(&self) -> SyncSummary {
        let elapsed = self.finished_at - self.started_at;
        SyncSummary {
            copied: self.copied.len(),
            updated: self.updated.len(),
            deleted: self.deleted.len(),
            errors: self.errors.len(),
            duration_ms: u64::try_from(elapsed.num_milliseconds()).unwrap_or(0),
        }
    }
}

/// Per-cycle counts, logged by the daemon after every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub copied: usize,
    pub updated: usize,
    pub deleted: usize,
    pub errors: usize,
    pub duration_ms: u64,
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} copied, {} updated, {} deleted, {} errors",
            self.copied, self.updated, self.deleted, self.errors
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
