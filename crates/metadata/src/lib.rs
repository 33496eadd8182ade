#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `metadata` copies a source file's mode bits and modification time onto a
//! freshly written destination file, once its content is already in place.
//!
//! # Design
//!
//! Preservation is best-effort and Unix-focused: permission bits come from
//! [`std::fs::Permissions`] and the modification time is copied with
//! [`filetime`], the same crate the teacher workspace uses for this purpose.
//! On platforms where a concept (e.g. Unix mode bits on Windows) does not
//! apply, `std::fs` already degrades gracefully and no extra handling is
//! layered on top.
//!
//! # Non-goals
//!
//! Ownership (uid/gid), ACLs, and extended attributes are out of scope.

use std::fs;
use std::io;
use std::path::Path;

/// Errors raised while copying metadata from a source path to a destination
/// path.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    /// Reading the source file's metadata failed.
    #[error("failed to read metadata for {path}: {source}")]
    Source {
        /// The source path that could not be inspected.
        path: std::path::PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Applying permissions or timestamps to the destination failed.
    #[error("failed to apply metadata to {path}: {source}")]
    Destination {
        /// The destination path that could not be updated.
        path: std::path::PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Copies `source`'s mode bits and modification time onto `destination`.
///
/// Intended to run after a strategy has finished writing the destination
/// file's content, so the timestamp reflects the source rather than the
/// moment the copy completed.
pub fn preserve(source: &Path, destination: &Path) -> Result<(), MetadataError> {
    let source_meta = fs::metadata(source).map_err(|source_err| MetadataError::Source {
        path: source.to_path_buf(),
        source: source_err,
    })?;

    fs::set_permissions(destination, source_meta.permissions()).map_err(|source_err| {
        MetadataError::Destination {
            path: destination.to_path_buf(),
            source: source_err,
        }
    })?;

    let mtime = filetime::FileTime::from_last_modification_time(&source_meta);
    filetime::set_file_mtime(destination, mtime).map_err(|source_err| {
        MetadataError::Destination {
            path: destination.to_path_buf(),
            source: source_err,
        }
    })?;

    tracing::debug!(source = %source.display(), destination = %destination.display(), "preserved metadata");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write as _;

    #[test]
    fn mtime_and_mode_are_copied() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source");
        let destination = dir.path().join("destination");

        {
            let mut file = File::create(&source).unwrap();
            file.write_all(b"source content").unwrap();
        }
        File::create(&destination).unwrap();

        let old_mtime = filetime::FileTime::from_unix_time(1_000_000, 0);
        filetime::set_file_mtime(&source, old_mtime).unwrap();

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&source, fs::Permissions::from_mode(0o640)).unwrap();
        }

        preserve(&source, &destination).unwrap();

        let destination_meta = fs::metadata(&destination).unwrap();
        let destination_mtime = filetime::FileTime::from_last_modification_time(&destination_meta);
        assert_eq!(destination_mtime, old_mtime);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            assert_eq!(destination_meta.permissions().mode() & 0o777, 0o640);
        }
    }

    #[test]
    fn missing_source_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("missing");
        let destination = dir.path().join("destination");
        File::create(&destination).unwrap();

        let err = preserve(&source, &destination).unwrap_err();
        assert!(matches!(err, MetadataError::Source { .. }));
    }
}
