#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `engine` ties the [`walk`] planner and the [`checksums`]/[`signature`]/
//! [`delta`] fingerprinting stack together into the synchronizer's public
//! surface: the [`sync`] entry point, the [`Strategy`] capability and its
//! two implementations, and the unified [`SyncError`].
//!
//! # Design
//!
//! [`Executor::run`] drives [`walk::plan`] and, for each planned action,
//! either mutates the filesystem or — in dry-run mode — only reports it.
//! Both [`CopyStrategy`] and [`DeltaStrategy`] write through a temp file
//! co-located with the destination, `fsync` it, and atomically rename it
//! into place, so a crash mid-transfer never leaves a partially written
//! destination.

mod fsops;
mod strategy;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

pub use strategy::{CopyStrategy, DeltaStrategy, Strategy};
pub use walk::{FileStrategy, PlannedAction, SyncAction, SyncActionKind};

/// A sink that the executor invokes with every materialized (or, in
/// dry-run mode, decided) action.
pub type Reporter<'a> = dyn FnMut(&SyncAction) + 'a;

/// Errors raised anywhere in the sync pipeline; every subsystem-level
/// error (`walk::WalkError`, `signature::SignatureError`,
/// `delta::DeltaError`, `metadata::MetadataError`) is folded into one of
/// these kinds before crossing the `engine` boundary.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Invalid configuration or arguments: a bad block size, a missing
    /// source, or a destination that exists but is not a directory.
    #[error("{message}")]
    Argument {
        /// Human-readable description of the invalid argument.
        message: String,
    },
    /// Reading from the source tree failed.
    #[error("failed reading source {path}: {source}")]
    SourceIo {
        /// The source path involved.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Writing to the destination tree failed.
    #[error("failed writing destination {path}: {source}")]
    DestinationIo {
        /// The destination path involved.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// A strategy (copy or delta) failed to synchronize one file.
    #[error("strategy failed for {path}: {message}")]
    Strategy {
        /// The destination path the strategy was operating on.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },
    /// An invariant the encoder or applier is supposed to guarantee was
    /// violated; indicates a bug rather than an environmental failure.
    #[error("internal invariant violated: {message}")]
    Internal {
        /// Description of the violated invariant.
        message: String,
    },
}

impl SyncError {
    fn source_io(path: &Path, source: io::Error) -> Self {
        Self::SourceIo {
            path: path.to_path_buf(),
            source,
        }
    }

    fn destination_io(path: &Path, source: io::Error) -> Self {
        Self::DestinationIo {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl From<walk::WalkError> for SyncError {
    fn from(err: walk::WalkError) -> Self {
        match err {
            walk::WalkError::ReadDir { path, source } => Self::SourceIo { path, source },
        }
    }
}

/// Which strategy to use for files that already exist in the destination
/// but no longer match the source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrategyConfig {
    /// Always mirror the whole file.
    Copy,
    /// Reuse unchanged blocks of the existing destination file via the
    /// rolling-checksum delta algorithm.
    Delta {
        /// Block size in bytes; must be in `1..=2^30`.
        block_size: u32,
    },
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self::Copy
    }
}

/// Per-file transfer accounting produced by [`DeltaStrategy`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Total length of the source file.
    pub total_bytes: u64,
    /// Bytes actually written to the destination's temp file (literal
    /// bytes plus a bounded per-instruction encoding overhead).
    pub bytes_transferred: u64,
    /// Bytes reused from the existing destination instead of being
    /// retransmitted.
    pub bytes_saved: u64,
    /// Bytes emitted as literal instructions.
    pub literal_bytes: u64,
    /// Bytes emitted as copy instructions.
    pub matched_bytes: u64,
}

/// Per-path snapshot of [`SyncStats`], owned by a [`DeltaStrategy`]
/// instance across one sync run.
#[derive(Debug, Default)]
pub struct StatsRegistry {
    entries: FxHashMap<PathBuf, SyncStats>,
}

impl StatsRegistry {
    /// Looks up the stats recorded for `path`, if any file was delta-synced there.
    #[must_use]
    pub fn get_for(&self, path: &Path) -> Option<&SyncStats> {
        self.entries.get(path)
    }

    /// Returns every recorded path/stats pair.
    #[must_use]
    pub const fn all(&self) -> &FxHashMap<PathBuf, SyncStats> {
        &self.entries
    }

    fn insert(&mut self, path: PathBuf, stats: SyncStats) {
        self.entries.insert(path, stats);
    }
}

/// Validates `source`/`destination`/`strategy` before any filesystem work
/// begins, per the argument-error cases in the error taxonomy.
fn validate(source: &Path, destination: &Path, strategy: &StrategyConfig) -> Result<(), SyncError> {
    if let StrategyConfig::Delta { block_size } = strategy {
        if *block_size == 0 {
            return Err(SyncError::Argument {
                message: "block size must be greater than zero".to_string(),
            });
        }
    }
    if !source.exists() {
        return Err(SyncError::Argument {
            message: format!("source path {} does not exist", source.display()),
        });
    }
    if destination.exists() && !destination.is_dir() {
        return Err(SyncError::Argument {
            message: format!(
                "destination path {} exists and is not a directory",
                destination.display()
            ),
        });
    }
    Ok(())
}

/// Drives the planner and dispatches each planned action to a strategy,
/// honoring dry-run and reporter verbosity.
pub struct Executor;

impl Executor {
    /// Runs one sync pass over `source`/`destination`.
    ///
    /// `strategy` is invoked for `CopyFile`/`DeltaFile` actions (whichever
    /// the configured [`FileStrategy`] produces); `CreateFile` always goes
    /// through a fresh [`CopyStrategy`] regardless of the configured
    /// strategy, matching the planner's own classification rule.
    pub fn run(
        source: &Path,
        destination: &Path,
        strategy: &mut dyn Strategy,
        walk_strategy: FileStrategy,
        dry_run: bool,
        verbose: bool,
        reporter: &mut dyn FnMut(&SyncAction),
    ) -> Result<(), SyncError> {
        if !dry_run {
            fs::create_dir_all(destination).map_err(|err| SyncError::destination_io(destination, err))?;
        }

        let planned = walk::plan(source, destination, walk_strategy)?;

        for item in planned {
            let PlannedAction {
                action,
                source: item_source,
                destination: item_destination,
            } = item;

            match action.kind {
                SyncActionKind::CreateDir => {
                    if !dry_run {
                        fs::create_dir_all(&item_destination)
                            .map_err(|err| SyncError::destination_io(&item_destination, err))?;
                    }
                    reporter(&action);
                }
                SyncActionKind::SkipDir => {
                    if verbose {
                        reporter(&action);
                    }
                }
                SyncActionKind::CreateFile => {
                    if !dry_run {
                        CopyStrategy.sync_file(&item_source, &item_destination)?;
                    }
                    reporter(&action);
                }
                SyncActionKind::CopyFile | SyncActionKind::DeltaFile => {
                    if !dry_run {
                        strategy.sync_file(&item_source, &item_destination)?;
                    }
                    reporter(&action);
                }
                SyncActionKind::SkipFile => {
                    if verbose {
                        reporter(&action);
                    }
                }
            }
        }

        Ok(())
    }
}

/// Synchronizes `destination` to match `source`, using the configured
/// strategy for files that already exist but differ.
///
/// Returns the delta strategy's [`StatsRegistry`] snapshot when
/// `strategy` was [`StrategyConfig::Delta`], or `None` for
/// [`StrategyConfig::Copy`] (which keeps no per-file statistics).
pub fn sync(
    source: &Path,
    destination: &Path,
    strategy: StrategyConfig,
    dry_run: bool,
    verbose: bool,
    mut reporter: impl FnMut(&SyncAction),
) -> Result<Option<StatsRegistry>, SyncError> {
    validate(source, destination, &strategy)?;

    match strategy {
        StrategyConfig::Copy => {
            let mut copy_strategy = CopyStrategy;
            Executor::run(
                source,
                destination,
                &mut copy_strategy,
                FileStrategy::Copy,
                dry_run,
                verbose,
                &mut reporter,
            )?;
            Ok(None)
        }
        StrategyConfig::Delta { block_size } => {
            let mut delta_strategy = DeltaStrategy::new(block_size);
            Executor::run(
                source,
                destination,
                &mut delta_strategy,
                FileStrategy::Delta,
                dry_run,
                verbose,
                &mut reporter,
            )?;
            Ok(Some(delta_strategy.into_stats()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write as _;

    fn write(path: &Path, contents: &[u8]) {
        let mut file = File::create(path).unwrap();
        file.write_all(contents).unwrap();
    }

    #[test]
    fn missing_source_is_an_argument_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = sync(
            &dir.path().join("missing"),
            &dir.path().join("destination"),
            StrategyConfig::Copy,
            false,
            false,
            |_| {},
        )
        .unwrap_err();
        assert!(matches!(err, SyncError::Argument { .. }));
    }

    #[test]
    fn destination_file_in_place_of_directory_is_an_argument_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source");
        fs::create_dir_all(&source).unwrap();
        let destination = dir.path().join("destination");
        write(&destination, b"not a directory");

        let err = sync(&source, &destination, StrategyConfig::Copy, false, false, |_| {}).unwrap_err();
        assert!(matches!(err, SyncError::Argument { .. }));
    }

    #[test]
    fn zero_block_size_is_an_argument_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source");
        fs::create_dir_all(&source).unwrap();
        let destination = dir.path().join("destination");

        let err = sync(
            &source,
            &destination,
            StrategyConfig::Delta { block_size: 0 },
            false,
            false,
            |_| {},
        )
        .unwrap_err();
        assert!(matches!(err, SyncError::Argument { .. }));
    }

    #[test]
    fn copy_strategy_creates_missing_destination_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source");
        let destination = dir.path().join("destination");
        fs::create_dir_all(&source).unwrap();
        write(&source.join("a.txt"), b"hello world");

        let mut seen = Vec::new();
        sync(&source, &destination, StrategyConfig::Copy, false, false, |action| {
            seen.push(action.kind);
        })
        .unwrap();

        assert_eq!(fs::read(destination.join("a.txt")).unwrap(), b"hello world");
        assert!(seen.contains(&SyncActionKind::CreateFile));
    }

    #[test]
    fn dry_run_makes_no_filesystem_changes() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source");
        let destination = dir.path().join("destination");
        fs::create_dir_all(&source).unwrap();
        write(&source.join("a.txt"), b"hello world");

        sync(&source, &destination, StrategyConfig::Copy, true, false, |_| {}).unwrap();

        assert!(!destination.exists());
    }

    #[test]
    fn delta_strategy_reconstructs_modified_file_and_records_stats() {
        let dir = tempfile::tempdir().unwrap();
        let source_dir = dir.path().join("source");
        let destination_dir = dir.path().join("destination");
        fs::create_dir_all(&source_dir).unwrap();
        fs::create_dir_all(&destination_dir).unwrap();

        let old_content = vec![b'A'; 200_000];
        let mut new_content = old_content.clone();
        new_content.truncate(150_000);
        new_content.extend(vec![b'B'; 500]);

        write(&destination_dir.join("big.bin"), &old_content);
        write(&source_dir.join("big.bin"), &new_content);

        // backdate the destination so the planner doesn't skip it as unchanged
        let old_mtime = filetime::FileTime::from_unix_time(1_000_000, 0);
        filetime::set_file_mtime(destination_dir.join("big.bin"), old_mtime).unwrap();

        let stats = sync(
            &source_dir,
            &destination_dir,
            StrategyConfig::Delta { block_size: 4096 },
            false,
            false,
            |_| {},
        )
        .unwrap()
        .expect("delta strategy returns a stats registry");

        assert_eq!(
            fs::read(destination_dir.join("big.bin")).unwrap(),
            new_content
        );

        let file_stats = stats.get_for(&destination_dir.join("big.bin")).unwrap();
        assert_eq!(file_stats.total_bytes, new_content.len() as u64);
        assert_eq!(file_stats.matched_bytes + file_stats.literal_bytes, file_stats.total_bytes);
        assert!(file_stats.matched_bytes > 0, "should reuse unmodified blocks");
    }

    #[test]
    fn identical_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source");
        let destination = dir.path().join("destination");
        fs::create_dir_all(&source).unwrap();
        fs::create_dir_all(&destination).unwrap();

        let now = filetime::FileTime::now();
        write(&source.join("a.txt"), b"same");
        write(&destination.join("a.txt"), b"same");
        filetime::set_file_mtime(source.join("a.txt"), now).unwrap();
        filetime::set_file_mtime(destination.join("a.txt"), now).unwrap();

        let mut kinds = Vec::new();
        sync(&source, &destination, StrategyConfig::Copy, false, true, |action| {
            kinds.push(action.kind);
        })
        .unwrap();

        assert_eq!(kinds, vec![SyncActionKind::SkipFile]);
    }
}
