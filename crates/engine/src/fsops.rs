//! Temp-file-then-rename discipline shared by every strategy, so a crash
//! or an I/O failure mid-write never leaves a half-written destination.

use std::io;
use std::path::Path;

use tempfile::NamedTempFile;

/// Creates a uniquely named temp file next to `destination`, in the same
/// directory so the final rename stays on one filesystem. Dropping the
/// returned handle without finalizing it removes the temp file, so every
/// early-return error path in a strategy cleans up for free.
pub(crate) fn create_temp_file(destination: &Path) -> io::Result<NamedTempFile> {
    let parent = destination.parent().unwrap_or_else(|| Path::new("."));
    let file_name = destination
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("sync");

    tempfile::Builder::new()
        .prefix(&format!(".{file_name}.sync-tmp-"))
        .tempfile_in(parent)
}

/// Fsyncs the temp file and atomically renames it onto `destination`.
pub(crate) fn finalize_temp_file(tmp: NamedTempFile, destination: &Path) -> io::Result<()> {
    tmp.as_file().sync_all()?;
    tmp.persist(destination)
        .map(|_| ())
        .map_err(|err| err.error)
}
