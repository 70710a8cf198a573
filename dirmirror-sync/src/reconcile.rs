//! Reconciler: diff two snapshots and apply the result to the target tree.
//!
//! ## Cycle
//!
//! 1. Snapshot source and target on two threads; join both.
//! 2. Diff: `Copy`/`Update` for every source path (sorted), then `Delete`
//!    for every target path the source does not have.
//! 3. Apply in that order. Each copy is staged in an exclusively created
//!    `.<name>.XXXXXX.dirmirror.tmp` next to the destination and renamed
//!    into place with the source's permissions and timestamps. A symbolic
//!    link in the target standing where a mirrored directory belongs is
//!    removed first, so writes never leave the target tree.
//! 4. Per-file failures land in [`SyncReport::errors`]; the cycle continues.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::thread::ScopedJoinHandle;

use chrono::Utc;
use filetime::FileTime;
use tempfile::NamedTempFile;

use dirmirror_core::{FileError, RelPath, Snapshot, SyncAction, SyncReport};

use crate::error::{io_err, SyncError};
use crate::snapshot::snapshot;

/// Suffix of the temporary file a copy is staged in.
pub const TMP_SUFFIX: &str = ".dirmirror.tmp";

/// Knobs for a single [`reconcile`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Compute and report actions without touching the target.
    pub dry_run: bool,
}

// ---------------------------------------------------------------------------
// reconcile
// ---------------------------------------------------------------------------

/// Make `target_root` mirror `source_root`.
///
/// Returns `Err` only when a root cannot be traversed. Everything else,
/// including unreadable files in either tree, is reported in the
/// [`SyncReport`].
pub fn reconcile(
    source_root: &Path,
    target_root: &Path,
    options: &ReconcileOptions,
) -> Result<SyncReport, SyncError> {
    let started_at = Utc::now();
    let (source, target) = snapshot_pair(source_root, target_root)?;

    let mut report = SyncReport::new(started_at, options.dry_run);
    report.errors.extend(source.unreadable().iter().cloned());
    report.errors.extend(target.unreadable().iter().cloned());

    let actions = diff(&source, &target);
    apply_into(
        &mut report,
        &actions,
        source_root,
        target_root,
        options.dry_run,
    );

    report.finished_at = Utc::now();
    Ok(report)
}

fn snapshot_pair(
    source_root: &Path,
    target_root: &Path,
) -> Result<(Snapshot, Snapshot), SyncError> {
    std::thread::scope(|scope| {
        let source = scope.spawn(|| snapshot(source_root));
        let target = scope.spawn(|| snapshot(target_root));
        let source = join_snapshot(source, source_root);
        let target = join_snapshot(target, target_root);
        Ok((source?, target?))
    })
}

fn join_snapshot(
    handle: ScopedJoinHandle<'_, Result<Snapshot, SyncError>>,
    root: &Path,
) -> Result<Snapshot, SyncError> {
    handle.join().unwrap_or_else(|_| {
        Err(SyncError::WorkerPanicked {
            root: root.to_path_buf(),
        })
    })
}

// ---------------------------------------------------------------------------
// diff
// ---------------------------------------------------------------------------

/// Actions that turn `target` into `source`: copies and updates first, then
/// deletes.
///
/// Target paths the source could not read (or that sit under an unreadable
/// source directory) are never deleted.
pub fn diff(source: &Snapshot, target: &Snapshot) -> Vec<SyncAction> {
    let mut actions = Vec::new();

    for (path, fingerprint) in source.iter() {
        match target.get(path) {
            None => actions.push(SyncAction::Copy(path.clone())),
            Some(existing) if existing != fingerprint => {
                actions.push(SyncAction::Update(path.clone()));
            }
            Some(_) => tracing::debug!("unchanged: {path}"),
        }
    }

    for path in target.paths() {
        if source.contains(path) {
            continue;
        }
        if source.covers_unreadable(path) {
            tracing::debug!(path = %path, "keeping target file; source entry unreadable");
            continue;
        }
        actions.push(SyncAction::Delete(path.clone()));
    }

    actions
}

// ---------------------------------------------------------------------------
// apply
// ---------------------------------------------------------------------------

/// Apply `actions` in order and report each outcome.
pub fn apply(
    actions: &[SyncAction],
    source_root: &Path,
    target_root: &Path,
    dry_run: bool,
) -> SyncReport {
    let mut report = SyncReport::new(Utc::now(), dry_run);
    apply_into(&mut report, actions, source_root, target_root, dry_run);
    report.finished_at = Utc::now();
    report
}

fn apply_into(
    report: &mut SyncReport,
    actions: &[SyncAction],
    source_root: &Path,
    target_root: &Path,
    dry_run: bool,
) {
    for action in actions {
        let path = action.path();

        if dry_run {
            tracing::info!("[dry-run] would {}: {}", action.op(), path);
            report.record(action);
            continue;
        }

        let result = match action {
            SyncAction::Copy(p) | SyncAction::Update(p) => {
                unlink_symlinked_parents(target_root, p)
                    .and_then(|()| copy_file(&p.to_path(source_root), &p.to_path(target_root)))
            }
            SyncAction::Delete(p) => {
                let dest = p.to_path(target_root);
                fs::remove_file(&dest).map_err(|e| io_err(&dest, e))
            }
        };

        match result {
            Ok(()) => {
                tracing::info!("{}: {}", action.past_tense(), path);
                report.record(action);
            }
            Err(err) => {
                tracing::error!(path = %path, error = %err, "{} failed", action.op());
                report
                    .errors
                    .push(FileError::new(path.clone(), action.op(), err));
            }
        }
    }
}

/// Remove a symbolic link standing in for one of `path`'s parent
/// directories under `target_root`. Only the link goes; its referent is
/// untouched and the directory is recreated by the copy.
fn unlink_symlinked_parents(target_root: &Path, path: &RelPath) -> Result<(), SyncError> {
    let mut parents: Vec<&str> = path.as_str().split('/').collect();
    parents.pop();

    let mut dir = target_root.to_path_buf();
    for component in parents {
        dir.push(component);
        match fs::symlink_metadata(&dir) {
            Ok(meta) if meta.file_type().is_symlink() => {
                fs::remove_file(&dir)
                    .or_else(|_| fs::remove_dir(&dir))
                    .map_err(|e| io_err(&dir, e))?;
                tracing::info!(path = %dir.display(), "removed symbolic link in place of a directory");
                return Ok(());
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(io_err(&dir, e)),
        }
    }
    Ok(())
}

/// Create the staging file for `dest` in `dir`: `.<name>.XXXXXX.dirmirror.tmp`,
/// opened with `O_EXCL` so an existing entry is never reused or followed.
fn staging_file(dir: &Path, dest: &Path) -> io::Result<NamedTempFile> {
    let mut prefix = OsString::from(".");
    if let Some(name) = dest.file_name() {
        prefix.push(name);
        prefix.push(".");
    }
    tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(TMP_SUFFIX)
        .tempfile_in(dir)
}

/// Copy `source` over `dest`, creating parent directories and carrying the
/// source's permissions and access/modification times.
///
/// The staging file is removed on every failure path.
fn copy_file(source: &Path, dest: &Path) -> Result<(), SyncError> {
    let metadata = fs::metadata(source).map_err(|e| io_err(source, e))?;
    let dir = dest.parent().ok_or_else(|| {
        io_err(
            dest,
            io::Error::new(io::ErrorKind::InvalidInput, "destination has no parent"),
        )
    })?;
    fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let mut reader = File::open(source).map_err(|e| io_err(source, e))?;
    let mut staged = staging_file(dir, dest).map_err(|e| io_err(dir, e))?;
    let staged_path = staged.path().to_path_buf();

    io::copy(&mut reader, staged.as_file_mut()).map_err(|e| io_err(&staged_path, e))?;
    let file = staged.as_file();
    file.set_permissions(metadata.permissions())
        .map_err(|e| io_err(&staged_path, e))?;
    let atime = FileTime::from_last_access_time(&metadata);
    let mtime = FileTime::from_last_modification_time(&metadata);
    filetime::set_file_handle_times(file, Some(atime), Some(mtime))
        .map_err(|e| io_err(&staged_path, e))?;

    staged.persist(dest).map_err(|e| io_err(dest, e.error))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::fingerprint_bytes;
    use dirmirror_core::{FileOp, Fingerprint, RelPath};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn staged_leftovers(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(TMP_SUFFIX))
            .collect()
    }

    fn snap(entries: &[(&str, &str)]) -> Snapshot {
        entries
            .iter()
            .map(|(path, content)| (RelPath::from(*path), fingerprint_bytes(content.as_bytes())))
            .collect()
    }

    fn rel(s: &str) -> RelPath {
        RelPath::from(s)
    }

    #[test]
    fn diff_emits_copy_update_then_delete() {
        let source = snap(&[("a.txt", "same"), ("b.txt", "new"), ("c.txt", "only-src")]);
        let target = snap(&[("a.txt", "same"), ("b.txt", "old"), ("0-gone.txt", "x")]);

        let actions = diff(&source, &target);
        assert_eq!(
            actions,
            vec![
                SyncAction::Update(rel("b.txt")),
                SyncAction::Copy(rel("c.txt")),
                SyncAction::Delete(rel("0-gone.txt")),
            ]
        );
    }

    #[test]
    fn diff_membership_is_not_substring_based() {
        // "b.txt" is a substring of "sub/b.txt" but a different entry.
        let source = snap(&[("b.txt", "x")]);
        let target = snap(&[("sub/b.txt", "x")]);

        let actions = diff(&source, &target);
        assert_eq!(
            actions,
            vec![
                SyncAction::Copy(rel("b.txt")),
                SyncAction::Delete(rel("sub/b.txt")),
            ]
        );
    }

    #[test]
    fn diff_of_identical_snapshots_is_empty() {
        let source = snap(&[("f.txt", "x"), ("d/g.txt", "y")]);
        assert!(diff(&source, &source.clone()).is_empty());
    }

    #[test]
    fn diff_keeps_target_files_under_unreadable_source_entries() {
        let source = Snapshot::from_parts(
            BTreeMap::<RelPath, Fingerprint>::new(),
            vec![FileError::new(rel("private"), FileOp::Read, "permission denied")],
        );
        let target = snap(&[("private/secret.txt", "s"), ("public.txt", "p")]);

        let actions = diff(&source, &target);
        assert_eq!(actions, vec![SyncAction::Delete(rel("public.txt"))]);
    }

    #[test]
    fn diff_keeps_whole_target_when_source_root_unreadable() {
        let source = Snapshot::from_parts(
            BTreeMap::<RelPath, Fingerprint>::new(),
            vec![FileError::new(rel(""), FileOp::Read, "No such file or directory")],
        );
        let target = snap(&[("keep.txt", "k"), ("d/deep.txt", "d")]);

        assert!(diff(&source, &target).is_empty());
    }

    #[test]
    fn staging_never_reuses_an_existing_tmp_name() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        fs::write(src.path().join("f.txt"), "fresh").unwrap();
        // A mirrored file that happens to carry the staging suffix.
        let mirrored = dst.path().join("f.txt.dirmirror.tmp");
        fs::write(&mirrored, "mirrored").unwrap();

        copy_file(&src.path().join("f.txt"), &dst.path().join("f.txt")).unwrap();

        assert_eq!(fs::read_to_string(dst.path().join("f.txt")).unwrap(), "fresh");
        assert_eq!(fs::read_to_string(&mirrored).unwrap(), "mirrored");
    }

    #[test]
    #[cfg(unix)]
    fn symlinked_parent_is_unlinked_not_followed() {
        let outside = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        fs::write(outside.path().join("untouched.txt"), "u").unwrap();
        std::os::unix::fs::symlink(outside.path(), dst.path().join("a")).unwrap();

        unlink_symlinked_parents(dst.path(), &rel("a/b/c.txt")).unwrap();

        assert!(!dst.path().join("a").exists());
        assert!(outside.path().join("untouched.txt").exists());
    }

    #[test]
    fn dry_run_apply_records_but_touches_nothing() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        fs::write(src.path().join("new.txt"), "x").unwrap();
        fs::write(dst.path().join("old.txt"), "y").unwrap();

        let actions = vec![
            SyncAction::Copy(rel("new.txt")),
            SyncAction::Delete(rel("old.txt")),
        ];
        let report = apply(&actions, src.path(), dst.path(), true);

        assert!(report.dry_run);
        assert_eq!(report.actions(), actions);
        assert!(!dst.path().join("new.txt").exists());
        assert!(dst.path().join("old.txt").exists());
    }

    #[test]
    fn copy_creates_parents_and_cleans_tmp() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        fs::create_dir_all(src.path().join("x/y")).unwrap();
        fs::write(src.path().join("x/y/z.txt"), "deep").unwrap();

        let dest = dst.path().join("x").join("y").join("z.txt");
        copy_file(&src.path().join("x/y/z.txt"), &dest).unwrap();

        assert_eq!(fs::read_to_string(&dest).unwrap(), "deep");
        assert!(staged_leftovers(&dst.path().join("x/y")).is_empty());
    }

    #[test]
    fn failed_rename_leaves_destination_and_removes_tmp() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        fs::write(src.path().join("clash"), "file").unwrap();
        // A non-empty directory where the file should go blocks the rename.
        let dest = dst.path().join("clash");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("inner.txt"), "keep").unwrap();

        let err = copy_file(&src.path().join("clash"), &dest).unwrap_err();
        assert!(matches!(err, SyncError::Io { .. }), "got: {err}");
        assert!(dest.join("inner.txt").exists());
        assert!(staged_leftovers(dst.path()).is_empty(), "staging file should be cleaned up");
    }

    #[test]
    fn missing_source_file_is_reported_not_fatal() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        fs::write(src.path().join("ok.txt"), "ok").unwrap();

        let actions = vec![
            SyncAction::Copy(rel("vanished.txt")),
            SyncAction::Copy(rel("ok.txt")),
        ];
        let report = apply(&actions, src.path(), dst.path(), false);

        assert_eq!(report.copied, vec![rel("ok.txt")]);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].path, rel("vanished.txt"));
        assert_eq!(report.errors[0].op, FileOp::Copy);
    }

    #[test]
    fn reconcile_fails_on_missing_root() {
        let src = TempDir::new().unwrap();
        let err = reconcile(
            src.path(),
            &src.path().join("missing-target"),
            &ReconcileOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SyncError::Traversal { .. }), "got: {err}");
    }
}
