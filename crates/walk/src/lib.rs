#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `walk` enumerates a source tree depth-first, compares each entry against
//! the corresponding destination path, and classifies it into a
//! [`SyncAction`] the executor can act on.
//!
//! # Design
//!
//! Directory entries are sorted by name before recursion so that repeated
//! runs over the same tree produce an identical, reproducible action
//! sequence. Symlinks are followed (`fs::metadata`, not
//! `fs::symlink_metadata`) and treated as their referent; anything that is
//! neither a regular file nor a directory after following links (devices,
//! sockets, FIFOs) is skipped with `reason = "unsupported"`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Which strategy an out-of-date file should be classified under.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileStrategy {
    /// Classify out-of-date files as `CopyFile`.
    Copy,
    /// Classify out-of-date files as `DeltaFile`.
    Delta,
}

/// The kind of action planned for one considered path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncActionKind {
    /// The destination directory is missing and must be created.
    CreateDir,
    /// The destination directory already exists.
    SkipDir,
    /// The destination file is missing and must be created (always via the
    /// copy strategy, regardless of the configured strategy).
    CreateFile,
    /// Source and destination already agree; no action needed.
    SkipFile,
    /// The destination file exists but differs; mirror it wholesale.
    CopyFile,
    /// The destination file exists but differs; update it via rolling-checksum delta.
    DeltaFile,
}

/// One classified entry, reported to the executor's reporter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncAction {
    /// What was decided for this path.
    pub kind: SyncActionKind,
    /// The destination path the action concerns.
    pub path: PathBuf,
    /// Present for `SkipFile` actions caused by an unsupported or
    /// unreadable entry kind; absent otherwise.
    pub reason: Option<String>,
}

/// A planned action paired with the concrete paths the executor needs to
/// materialize it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedAction {
    /// The classification and destination path.
    pub action: SyncAction,
    /// The source path to read from, when the action concerns a file.
    pub source: PathBuf,
    /// The destination path to write to, when the action concerns a file.
    pub destination: PathBuf,
}

/// Errors raised while walking the source tree.
#[derive(Debug, thiserror::Error)]
pub enum WalkError {
    /// A directory under `source` could not be listed.
    #[error("failed to read directory {path}: {source}")]
    ReadDir {
        /// The directory that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Walks `source` depth-first and classifies every entry against
/// `destination`, returning the planned actions in deterministic,
/// parents-before-children traversal order.
pub fn plan(
    source: &Path,
    destination: &Path,
    strategy: FileStrategy,
) -> Result<Vec<PlannedAction>, WalkError> {
    let mut actions = Vec::new();
    walk_dir(source, destination, strategy, &mut actions)?;
    tracing::debug!(actions = actions.len(), "planned sync actions");
    Ok(actions)
}

fn walk_dir(
    source_dir: &Path,
    destination_dir: &Path,
    strategy: FileStrategy,
    actions: &mut Vec<PlannedAction>,
) -> Result<(), WalkError> {
    let read_dir = fs::read_dir(source_dir).map_err(|source| WalkError::ReadDir {
        path: source_dir.to_path_buf(),
        source,
    })?;

    let mut entries = read_dir
        .collect::<io::Result<Vec<_>>>()
        .map_err(|source| WalkError::ReadDir {
            path: source_dir.to_path_buf(),
            source,
        })?;
    entries.sort_by_key(std::fs::DirEntry::file_name);

    for entry in entries {
        let name = entry.file_name();
        let source_path = entry.path();
        let destination_path = destination_dir.join(&name);

        let metadata = match fs::metadata(&source_path) {
            Ok(metadata) => metadata,
            Err(err) => {
                actions.push(unsupported(&destination_path, &source_path, &err.to_string()));
                continue;
            }
        };

        if metadata.is_dir() {
            let kind = if destination_path.is_dir() {
                SyncActionKind::SkipDir
            } else {
                SyncActionKind::CreateDir
            };
            actions.push(PlannedAction {
                action: SyncAction {
                    kind,
                    path: destination_path.clone(),
                    reason: None,
                },
                source: source_path.clone(),
                destination: destination_path.clone(),
            });
            walk_dir(&source_path, &destination_path, strategy, actions)?;
        } else if metadata.is_file() {
            let kind = classify_file(&destination_path, &metadata, strategy);
            actions.push(PlannedAction {
                action: SyncAction {
                    kind,
                    path: destination_path.clone(),
                    reason: None,
                },
                source: source_path,
                destination: destination_path,
            });
        } else {
            actions.push(unsupported(&destination_path, &source_path, "unsupported"));
        }
    }

    Ok(())
}

fn unsupported(destination_path: &Path, source_path: &Path, reason: &str) -> PlannedAction {
    PlannedAction {
        action: SyncAction {
            kind: SyncActionKind::SkipFile,
            path: destination_path.to_path_buf(),
            reason: Some(reason.to_string()),
        },
        source: source_path.to_path_buf(),
        destination: destination_path.to_path_buf(),
    }
}

fn classify_file(
    destination_path: &Path,
    source_meta: &fs::Metadata,
    strategy: FileStrategy,
) -> SyncActionKind {
    let Ok(dest_meta) = fs::metadata(destination_path) else {
        return SyncActionKind::CreateFile;
    };

    if files_agree(source_meta, &dest_meta) {
        SyncActionKind::SkipFile
    } else {
        match strategy {
            FileStrategy::Copy => SyncActionKind::CopyFile,
            FileStrategy::Delta => SyncActionKind::DeltaFile,
        }
    }
}

/// Compares size exactly and modification time at one-second resolution.
fn files_agree(a: &fs::Metadata, b: &fs::Metadata) -> bool {
    if a.len() != b.len() {
        return false;
    }
    match (a.modified(), b.modified()) {
        (Ok(a_time), Ok(b_time)) => {
            let diff = if a_time >= b_time {
                a_time.duration_since(b_time)
            } else {
                b_time.duration_since(a_time)
            };
            diff.is_ok_and(|diff| diff.as_secs() < 1)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write as _;
    use std::time::{Duration, SystemTime};

    fn touch(path: &Path, contents: &[u8], mtime: SystemTime) {
        let mut file = File::create(path).unwrap();
        file.write_all(contents).unwrap();
        drop(file);
        let mtime = filetime::FileTime::from_system_time(mtime);
        filetime::set_file_mtime(path, mtime).unwrap();
    }

    #[test]
    fn missing_destination_file_is_create_file() {
        let root = tempfile::tempdir().unwrap();
        let source = root.path().join("source");
        let destination = root.path().join("destination");
        fs::create_dir_all(&source).unwrap();
        fs::create_dir_all(&destination).unwrap();
        touch(&source.join("a.txt"), b"hello", SystemTime::now());

        let actions = plan(&source, &destination, FileStrategy::Copy).unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action.kind, SyncActionKind::CreateFile);
    }

    #[test]
    fn matching_size_and_mtime_is_skip_file() {
        let root = tempfile::tempdir().unwrap();
        let source = root.path().join("source");
        let destination = root.path().join("destination");
        fs::create_dir_all(&source).unwrap();
        fs::create_dir_all(&destination).unwrap();

        let now = SystemTime::now();
        touch(&source.join("a.txt"), b"hello", now);
        touch(&destination.join("a.txt"), b"hello", now);

        let actions = plan(&source, &destination, FileStrategy::Delta).unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action.kind, SyncActionKind::SkipFile);
    }

    #[test]
    fn differing_content_uses_configured_strategy() {
        let root = tempfile::tempdir().unwrap();
        let source = root.path().join("source");
        let destination = root.path().join("destination");
        fs::create_dir_all(&source).unwrap();
        fs::create_dir_all(&destination).unwrap();

        let old = SystemTime::now() - Duration::from_secs(120);
        touch(&source.join("a.txt"), b"new content", SystemTime::now());
        touch(&destination.join("a.txt"), b"old", old);

        let copy_actions = plan(&source, &destination, FileStrategy::Copy).unwrap();
        assert_eq!(copy_actions[0].action.kind, SyncActionKind::CopyFile);

        let delta_actions = plan(&source, &destination, FileStrategy::Delta).unwrap();
        assert_eq!(delta_actions[0].action.kind, SyncActionKind::DeltaFile);
    }

    #[test]
    fn nested_directories_recurse_in_sorted_order() {
        let root = tempfile::tempdir().unwrap();
        let source = root.path().join("source");
        let destination = root.path().join("destination");
        fs::create_dir_all(source.join("b")).unwrap();
        fs::create_dir_all(source.join("a")).unwrap();
        fs::create_dir_all(&destination).unwrap();
        touch(&source.join("a").join("file.txt"), b"x", SystemTime::now());
        touch(&source.join("b").join("file.txt"), b"y", SystemTime::now());

        let actions = plan(&source, &destination, FileStrategy::Copy).unwrap();
        let paths: Vec<_> = actions.iter().map(|a| a.action.path.clone()).collect();

        let a_dir_index = paths.iter().position(|p| p == &destination.join("a")).unwrap();
        let b_dir_index = paths.iter().position(|p| p == &destination.join("b")).unwrap();
        assert!(a_dir_index < b_dir_index, "entries should be visited in name order");
    }

    #[test]
    fn existing_destination_directory_is_skip_dir() {
        let root = tempfile::tempdir().unwrap();
        let source = root.path().join("source");
        let destination = root.path().join("destination");
        fs::create_dir_all(source.join("nested")).unwrap();
        fs::create_dir_all(destination.join("nested")).unwrap();

        let actions = plan(&source, &destination, FileStrategy::Copy).unwrap();
        assert_eq!(actions[0].action.kind, SyncActionKind::SkipDir);
    }
}
