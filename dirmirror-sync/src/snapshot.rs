//! Snapshotter: fingerprint every regular file under a root.
//!
//! Symbolic links are never followed; they are skipped in both trees, so a
//! link in the source is not mirrored. A target link only goes away when it
//! stands where a mirrored directory belongs (see `reconcile`).
//! Entries that cannot be read are recorded in [`Snapshot::unreadable`] and
//! the walk continues.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use walkdir::WalkDir;

use dirmirror_core::{FileError, FileOp, RelPath, Snapshot};

use crate::error::{traversal_err, SyncError};
use crate::fingerprint::fingerprint_file;

/// Build the snapshot of the tree rooted at `root`.
///
/// Fails only when `root` itself is missing, not a directory, or cannot be
/// listed, including when it disappears between the check and the walk.
pub fn snapshot(root: &Path) -> Result<Snapshot, SyncError> {
    let metadata = std::fs::metadata(root).map_err(|e| traversal_err(root, e))?;
    if !metadata.is_dir() {
        return Err(traversal_err(
            root,
            io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
        ));
    }

    let mut files = BTreeMap::new();
    let mut unreadable = Vec::new();

    for entry in WalkDir::new(root).follow_links(false).min_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => return Err(traversal_err(root, err.into())),
            Err(err) => {
                match err.path() {
                    Some(path) => {
                        let rel = RelPath::lossy(root, path);
                        tracing::warn!(path = %rel, error = %err, "skipping unreadable entry");
                        unreadable.push(FileError::new(rel, FileOp::Read, &err));
                    }
                    None => tracing::warn!(root = %root.display(), error = %err, "walk error"),
                }
                continue;
            }
        };

        let file_type = entry.file_type();
        if file_type.is_symlink() {
            tracing::debug!(path = %entry.path().display(), "skipping symbolic link");
            continue;
        }
        if !file_type.is_file() {
            continue;
        }

        let Some(rel) = RelPath::from_root(root, entry.path()) else {
            let rel = RelPath::lossy(root, entry.path());
            tracing::warn!(path = %rel, "skipping file with non UTF-8 name");
            unreadable.push(FileError::new(rel, FileOp::Read, "file name is not valid UTF-8"));
            continue;
        };

        match fingerprint_file(entry.path()) {
            Ok(fingerprint) => {
                files.insert(rel, fingerprint);
            }
            Err(err) => {
                tracing::warn!(path = %rel, error = %err, "skipping unreadable file");
                unreadable.push(FileError::new(rel, FileOp::Read, err));
            }
        }
    }

    Ok(Snapshot::from_parts(files, unreadable))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::fingerprint_bytes;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = RelPath::from(rel).to_path(root);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn nested_files_keyed_by_posix_relative_path() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "top.txt", "1");
        write(tmp.path(), "a/b/deep.txt", "2");

        let snap = snapshot(tmp.path()).unwrap();
        let keys: Vec<_> = snap.paths().map(RelPath::as_str).collect();
        assert_eq!(keys, vec!["a/b/deep.txt", "top.txt"]);
        assert_eq!(
            snap.get(&RelPath::from("a/b/deep.txt")),
            Some(&fingerprint_bytes(b"2"))
        );
        assert!(snap.unreadable().is_empty());
    }

    #[test]
    fn directories_are_not_entries() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("empty").join("nested")).unwrap();

        let snap = snapshot(tmp.path()).unwrap();
        assert!(snap.is_empty());
    }

    #[test]
    fn missing_root_is_traversal_error() {
        let tmp = TempDir::new().unwrap();
        let err = snapshot(&tmp.path().join("missing")).unwrap_err();
        assert!(matches!(err, SyncError::Traversal { .. }), "got: {err}");
    }

    #[test]
    fn file_root_is_traversal_error() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("file.txt");
        fs::write(&file, "x").unwrap();
        let err = snapshot(&file).unwrap_err();
        assert!(matches!(err, SyncError::Traversal { .. }), "got: {err}");
    }

    #[test]
    #[cfg(unix)]
    fn unlistable_root_is_traversal_error() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("locked");
        write(&root, "inner.txt", "x");
        fs::set_permissions(&root, fs::Permissions::from_mode(0o000)).unwrap();
        let listable = fs::read_dir(&root).is_ok();

        let result = snapshot(&root);
        fs::set_permissions(&root, fs::Permissions::from_mode(0o755)).unwrap();

        if listable {
            // Privileged user; mode bits are not enforced.
            return;
        }
        let err = result.unwrap_err();
        assert!(matches!(err, SyncError::Traversal { .. }), "got: {err}");
    }

    #[test]
    #[cfg(unix)]
    fn symlinks_are_skipped() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "real.txt", "data");
        std::os::unix::fs::symlink(tmp.path().join("real.txt"), tmp.path().join("link.txt"))
            .unwrap();

        let snap = snapshot(tmp.path()).unwrap();
        assert!(snap.contains(&RelPath::from("real.txt")));
        assert!(!snap.contains(&RelPath::from("link.txt")));
        assert_eq!(snap.len(), 1);
    }
}
