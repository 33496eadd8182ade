//! The [`Strategy`] capability and its two implementations.

use std::fs;
use std::path::Path;

use crate::{fsops, StatsRegistry, SyncError, SyncStats};

/// Estimated wire-encoding cost of one `Copy` instruction (an 8-byte
/// offset, a 4-byte length, and a 1-byte tag), used to derive
/// `bytes_transferred` from the literal byte count.
const INSTRUCTION_OVERHEAD_BYTES: u64 = 13;

/// A capability that can bring one destination file into agreement with
/// one source file.
pub trait Strategy {
    /// Synchronizes `destination` to match `source`.
    fn sync_file(&mut self, source: &Path, destination: &Path) -> Result<(), SyncError>;
}

/// Mirrors a source file onto the destination wholesale.
#[derive(Clone, Copy, Debug, Default)]
pub struct CopyStrategy;

impl Strategy for CopyStrategy {
    fn sync_file(&mut self, source: &Path, destination: &Path) -> Result<(), SyncError> {
        let mut source_file = fs::File::open(source).map_err(|err| SyncError::source_io(source, err))?;
        let mut tmp =
            fsops::create_temp_file(destination).map_err(|err| SyncError::destination_io(destination, err))?;

        std::io::copy(&mut source_file, tmp.as_file_mut())
            .map_err(|err| SyncError::destination_io(destination, err))?;

        fsops::finalize_temp_file(tmp, destination).map_err(|err| SyncError::destination_io(destination, err))?;

        metadata::preserve(source, destination).map_err(|err| SyncError::Strategy {
            path: destination.to_path_buf(),
            message: err.to_string(),
        })?;

        tracing::debug!(source = %source.display(), destination = %destination.display(), "copied file");
        Ok(())
    }
}

/// Reuses unchanged blocks of the existing destination file, transferring
/// only the bytes that differ, via the rolling-checksum delta algorithm.
pub struct DeltaStrategy {
    block_size: u32,
    memory_ceiling_bytes: u64,
    stats: StatsRegistry,
}

impl DeltaStrategy {
    /// Creates a strategy using the default memory ceiling
    /// ([`signature::DEFAULT_MEMORY_CEILING_BYTES`]).
    #[must_use]
    pub fn new(block_size: u32) -> Self {
        Self::with_memory_ceiling(block_size, signature::DEFAULT_MEMORY_CEILING_BYTES)
    }

    /// Creates a strategy with an explicit memory ceiling for the
    /// destination's block index.
    #[must_use]
    pub fn with_memory_ceiling(block_size: u32, memory_ceiling_bytes: u64) -> Self {
        Self {
            block_size,
            memory_ceiling_bytes,
            stats: StatsRegistry::default(),
        }
    }

    /// Returns the full per-path stats snapshot recorded so far.
    #[must_use]
    pub const fn stats(&self) -> &StatsRegistry {
        &self.stats
    }

    /// Returns the stats recorded for one destination path, if it was delta-synced.
    #[must_use]
    pub fn get_stats_for(&self, path: &Path) -> Option<&SyncStats> {
        self.stats.get_for(path)
    }

    /// Consumes the strategy, returning its stats registry.
    #[must_use]
    pub fn into_stats(self) -> StatsRegistry {
        self.stats
    }
}

impl Strategy for DeltaStrategy {
    fn sync_file(&mut self, source: &Path, destination: &Path) -> Result<(), SyncError> {
        let dest_for_index =
            fs::File::open(destination).map_err(|err| SyncError::destination_io(destination, err))?;
        let index = signature::build_block_index_with_ceiling(dest_for_index, self.block_size, self.memory_ceiling_bytes)
            .map_err(|err| SyncError::Strategy {
                path: destination.to_path_buf(),
                message: err.to_string(),
            })?;

        let source_file = fs::File::open(source).map_err(|err| SyncError::source_io(source, err))?;
        let (instructions, counts) =
            delta::encode_delta(source_file, &index, self.block_size).map_err(|err| SyncError::Strategy {
                path: destination.to_path_buf(),
                message: err.to_string(),
            })?;

        let mut tmp =
            fsops::create_temp_file(destination).map_err(|err| SyncError::destination_io(destination, err))?;

        let mut dest_reader =
            fs::File::open(destination).map_err(|err| SyncError::destination_io(destination, err))?;

        let written =
            delta::apply_delta(&mut dest_reader, &instructions, tmp.as_file_mut()).map_err(|err| {
                SyncError::Strategy {
                    path: destination.to_path_buf(),
                    message: err.to_string(),
                }
            })?;

        if written != counts.total_bytes {
            return Err(SyncError::Internal {
                message: format!(
                    "instruction stream reconstructed {written} bytes, expected {}",
                    counts.total_bytes
                ),
            });
        }

        fsops::finalize_temp_file(tmp, destination).map_err(|err| SyncError::destination_io(destination, err))?;

        metadata::preserve(source, destination).map_err(|err| SyncError::Strategy {
            path: destination.to_path_buf(),
            message: err.to_string(),
        })?;

        let stats = SyncStats {
            total_bytes: counts.total_bytes,
            bytes_transferred: counts.literal_bytes + instructions.len() as u64 * INSTRUCTION_OVERHEAD_BYTES,
            bytes_saved: counts.matched_bytes,
            literal_bytes: counts.literal_bytes,
            matched_bytes: counts.matched_bytes,
        };
        self.stats.insert(destination.to_path_buf(), stats);

        tracing::debug!(
            source = %source.display(),
            destination = %destination.display(),
            matched_bytes = counts.matched_bytes,
            literal_bytes = counts.literal_bytes,
            "applied delta"
        );
        Ok(())
    }
}
