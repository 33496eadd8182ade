#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `signature` builds the [`BlockIndex`] that the delta encoder matches
//! source bytes against: a destination file, partitioned into fixed-size
//! blocks, each fingerprinted with a weak rolling checksum and a strong MD5
//! digest.
//!
//! # Design
//!
//! [`build_block_index`] reads the destination file sequentially exactly
//! once. Each block's weak checksum becomes the bucket key in an
//! [`rustc_hash::FxHashMap`], so the delta encoder can look up candidates for
//! a given rolling checksum value in expected O(1) time; collisions within a
//! bucket are resolved by the encoder comparing strong digests.
//!
//! # Invariants
//!
//! - Blocks are numbered in file order starting at zero; `index` on a
//!   [`BlockSignature`] is that ordinal, not a byte offset (`index *
//!   block_size` recovers the offset for all but possibly the last block).
//! - The final block may be shorter than `block_size`; its `length` field
//!   reflects the true length.
//! - Within one [`BlockIndex`], the same block size and the same strong
//!   digest algorithm (MD5) are used for every entry.
//!
//! # Errors
//!
//! [`SignatureError::InvalidBlockSize`] is returned for a zero block size.
//! [`SignatureError::MemoryCeiling`] guards against building an index so
//! large it threatens the host process's memory budget; callers may raise
//! or lower the ceiling via [`build_block_index_with_ceiling`].

use std::io::{self, Read};

use checksums::{strong::Md5, RollingChecksum};
use rustc_hash::FxHashMap;

/// Default block size used when a strategy does not override it (64 KiB).
pub const DEFAULT_BLOCK_SIZE: u32 = 64 * 1024;

/// Default ceiling on the in-memory size of a [`BlockIndex`] (256 MiB).
pub const DEFAULT_MEMORY_CEILING_BYTES: u64 = 256 * 1024 * 1024;

/// Errors raised while building a [`BlockIndex`].
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    /// `block_size` was zero; the encoder cannot partition a file into
    /// zero-length blocks.
    #[error("block size must be greater than zero")]
    InvalidBlockSize,
    /// The destination file could not be read while building the index.
    #[error("failed to read destination file: {0}")]
    Io(#[from] io::Error),
    /// The index would exceed the configured memory ceiling.
    #[error(
        "block index would use an estimated {estimated_bytes} bytes, exceeding the \
         {ceiling_bytes} byte ceiling; use a larger block size or raise the ceiling"
    )]
    MemoryCeiling {
        /// Estimated bytes the index would occupy.
        estimated_bytes: u64,
        /// The configured ceiling that was exceeded.
        ceiling_bytes: u64,
    },
}

/// A fingerprint for one fixed-size block of the destination file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockSignature {
    /// Rolling weak checksum over the block's bytes.
    pub weak: u32,
    /// Strong MD5 digest over the block's exact bytes.
    pub strong: [u8; 16],
    /// Ordinal position of this block in the destination file.
    pub index: u64,
    /// Length in bytes of this block (equal to the configured block size
    /// except possibly for the final block).
    pub length: u32,
}

impl BlockSignature {
    /// Byte offset of this block within the destination file, given the
    /// block size the index was built with.
    #[must_use]
    pub fn offset(&self, block_size: u32) -> u64 {
        self.index * u64::from(block_size)
    }
}

/// A weak-checksum-keyed index over a destination file's blocks.
///
/// Deterministic for a given destination content and block size: building
/// the index twice over identical bytes produces identical buckets in
/// identical insertion order.
#[derive(Debug, Default)]
pub struct BlockIndex {
    buckets: FxHashMap<u32, Vec<BlockSignature>>,
    block_size: u32,
    block_count: u64,
}

impl BlockIndex {
    /// The block size this index was built with.
    #[must_use]
    pub const fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Number of blocks fingerprinted into this index.
    #[must_use]
    pub const fn block_count(&self) -> u64 {
        self.block_count
    }

    /// Returns `true` if the index has no blocks (empty destination file).
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.block_count == 0
    }

    /// Candidate blocks sharing the given weak checksum, in ascending
    /// destination-offset order (the order they were inserted).
    #[must_use]
    pub fn candidates(&self, weak: u32) -> &[BlockSignature] {
        self.buckets.get(&weak).map_or(&[], Vec::as_slice)
    }

    /// Returns `false` when the destination is too small relative to
    /// `block_size` for any match to ever be possible: an empty
    /// destination, or one short enough to produce a single block shorter
    /// than `block_size`.
    #[must_use]
    pub fn is_match_capable(&self, block_size: u32) -> bool {
        if self.is_empty() {
            return false;
        }
        if self.block_count != 1 {
            return true;
        }
        self.buckets
            .values()
            .flatten()
            .next()
            .is_some_and(|block| block.length >= block_size)
    }

    fn insert(&mut self, signature: BlockSignature) {
        self.buckets.entry(signature.weak).or_default().push(signature);
    }
}

/// Builds a [`BlockIndex`] over `reader` using the default memory ceiling.
///
/// See [`build_block_index_with_ceiling`] for the full contract.
pub fn build_block_index(
    reader: impl Read,
    block_size: u32,
) -> Result<BlockIndex, SignatureError> {
    build_block_index_with_ceiling(reader, block_size, DEFAULT_MEMORY_CEILING_BYTES)
}

/// Builds a [`BlockIndex`] over `reader`, partitioning it into non-overlapping
/// blocks of `block_size` bytes (the final block may be shorter).
///
/// Reads `reader` to completion, computing a weak rolling checksum and a
/// strong MD5 digest for each block. Aborts with
/// [`SignatureError::MemoryCeiling`] as soon as the estimated index size
/// would exceed `memory_ceiling_bytes`, so a pathological destination file
/// with a tiny block size cannot exhaust host memory.
pub fn build_block_index_with_ceiling(
    mut reader: impl Read,
    block_size: u32,
    memory_ceiling_bytes: u64,
) -> Result<BlockIndex, SignatureError> {
    if block_size == 0 {
        return Err(SignatureError::InvalidBlockSize);
    }

    let entry_size = std::mem::size_of::<BlockSignature>() as u64;
    let mut index = BlockIndex {
        buckets: FxHashMap::default(),
        block_size,
        block_count: 0,
    };

    let mut buffer = vec![0u8; block_size as usize];
    loop {
        let filled = read_block(&mut reader, &mut buffer)?;
        if filled == 0 {
            break;
        }

        let estimated_bytes = (index.block_count + 1) * entry_size;
        if estimated_bytes > memory_ceiling_bytes {
            return Err(SignatureError::MemoryCeiling {
                estimated_bytes,
                ceiling_bytes: memory_ceiling_bytes,
            });
        }

        let block = &buffer[..filled];
        let mut weak = RollingChecksum::new();
        weak.update(block);

        index.insert(BlockSignature {
            weak: weak.value(),
            strong: Md5::digest(block),
            index: index.block_count,
            length: filled as u32,
        });
        index.block_count += 1;

        if filled < buffer.len() {
            break;
        }
    }

    tracing::debug!(blocks = index.block_count, block_size, "built block index");
    Ok(index)
}

/// Reads up to `buffer.len()` bytes, retrying on short reads, returning the
/// number of bytes actually filled (0 only at true EOF).
fn read_block(reader: &mut impl Read, buffer: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}
