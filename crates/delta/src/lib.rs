#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `delta` implements the rolling-checksum block matching algorithm: given a
//! source byte stream and a [`signature::BlockIndex`] built over an existing
//! destination file, [`encode_delta`] emits an ordered
//! [`Instruction`] stream of `Copy`/`Literal` operations that reconstructs
//! the source when [`apply_delta`] replays it against the destination.
//!
//! # Design
//!
//! The encoder slides a `block_size`-byte window across the source with a
//! rolling weak checksum ([`checksums::RollingChecksum`]). A weak-checksum
//! hit is confirmed with a strong MD5 digest before being accepted as a
//! match; unmatched bytes accumulate in a literal buffer that is flushed as
//! a `Literal` instruction whenever a match occurs, the buffer grows past
//! one block, or the source is exhausted.
//!
//! # Invariants
//!
//! - Concatenating the bytes named by every instruction in order
//!   reconstructs the source exactly.
//! - Ties among destination blocks that share both weak and strong digests
//!   are broken by preferring the smallest destination offset, which falls
//!   out naturally from scanning [`signature::BlockIndex`] candidate buckets
//!   in insertion (i.e. ascending offset) order.
//! - The encoder never buffers the whole source in memory: it holds at most
//!   one window (`block_size` bytes) plus a literal buffer bounded to
//!   roughly `block_size` bytes.

use std::collections::VecDeque;
use std::io::{self, Read, Seek, SeekFrom, Write};

use checksums::{strong::Md5, RollingChecksum};
use signature::BlockIndex;

/// Errors raised while encoding or applying a delta instruction stream.
#[derive(Debug, thiserror::Error)]
pub enum DeltaError {
    /// An I/O operation on the source, destination, or temporary file failed.
    #[error("delta I/O failure: {0}")]
    Io(#[from] io::Error),
    /// Applying the instruction stream produced a different length than
    /// expected, indicating a bug in the encoder or a corrupted stream.
    #[error("reconstructed {actual} bytes, expected {expected}")]
    LengthMismatch {
        /// Bytes actually written while applying the instruction stream.
        actual: u64,
        /// Bytes the caller expected (the source's declared length).
        expected: u64,
    },
}

/// One step of a reconstruction script: either reuse bytes already present
/// in the destination, or insert literal bytes from the source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// Copy `length` bytes from the existing destination file starting at
    /// `offset`.
    Copy {
        /// Byte offset into the existing destination file.
        offset: u64,
        /// Number of bytes to copy.
        length: u32,
    },
    /// Insert these literal bytes, taken directly from the source.
    Literal(Vec<u8>),
}

/// Byte accounting produced by [`encode_delta`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeltaCounts {
    /// Total length of the source stream.
    pub total_bytes: u64,
    /// Bytes emitted as `Copy` instructions (reused from the destination).
    pub matched_bytes: u64,
    /// Bytes emitted as `Literal` instructions (transferred from source).
    pub literal_bytes: u64,
}

/// A literal buffer is flushed once it grows past this many bytes, bounding
/// encoder memory use independent of how long a mismatched run is.
fn flush_threshold(block_size: u32) -> usize {
    block_size as usize
}

/// Encodes `source` as an [`Instruction`] stream against `index`.
///
/// If `index` is empty, or holds only a single block shorter than
/// `block_size` (equivalent to `D == 0 || block_size > D` in the design),
/// no destination block can ever match and the whole source is emitted as
/// `Literal` instructions.
pub fn encode_delta(
    mut source: impl Read,
    index: &BlockIndex,
    block_size: u32,
) -> Result<(Vec<Instruction>, DeltaCounts), DeltaError> {
    let mut instructions = Vec::new();
    let mut counts = DeltaCounts::default();

    if index_too_small_to_match(index, block_size) {
        let mut buffer = vec![0u8; flush_threshold(block_size).max(1)];
        loop {
            let filled = read_fully(&mut source, &mut buffer)?;
            if filled == 0 {
                break;
            }
            counts.total_bytes += filled as u64;
            counts.literal_bytes += filled as u64;
            instructions.push(Instruction::Literal(buffer[..filled].to_vec()));
        }
        return Ok((instructions, counts));
    }

    let mut window: VecDeque<u8> = VecDeque::with_capacity(block_size as usize);
    fill_window(&mut source, &mut window, block_size as usize)?;
    counts.total_bytes += window.len() as u64;

    let mut literal_buffer: Vec<u8> = Vec::new();
    let threshold = flush_threshold(block_size);

    // `rolling` tracks the checksum of the current full window; it is only
    // valid while `window.len() == block_size`.
    let mut rolling = RollingChecksum::new();
    if window.len() == block_size as usize {
        let contiguous: Vec<u8> = window.iter().copied().collect();
        rolling.update_from_block(&contiguous);
    }

    while window.len() == block_size as usize {
        let weak = rolling.value();
        let candidates = index.candidates(weak);

        let matched = if candidates.is_empty() {
            None
        } else {
            let contiguous: Vec<u8> = window.iter().copied().collect();
            let strong = Md5::digest(&contiguous);
            candidates
                .iter()
                .find(|c| c.length as usize == contiguous.len() && c.strong == strong)
        };

        if let Some(block) = matched {
            flush_literal(&mut instructions, &mut literal_buffer);
            instructions.push(Instruction::Copy {
                offset: block.offset(block_size),
                length: block.length,
            });
            counts.matched_bytes += u64::from(block.length);

            window.clear();
            fill_window(&mut source, &mut window, block_size as usize)?;
            counts.total_bytes += window.len() as u64;
            if window.len() == block_size as usize {
                let contiguous: Vec<u8> = window.iter().copied().collect();
                rolling = RollingChecksum::new();
                rolling.update_from_block(&contiguous);
            }
            continue;
        }

        let outgoing = window.pop_front().expect("window is full");
        literal_buffer.push(outgoing);

        let mut incoming_byte = [0u8; 1];
        let read = read_fully(&mut source, &mut incoming_byte)?;
        if read == 0 {
            // Source exhausted mid-window; fall through to tail handling.
            break;
        }
        counts.total_bytes += 1;
        window.push_back(incoming_byte[0]);
        rolling.roll(outgoing, incoming_byte[0]).expect("window was non-empty");

        if literal_buffer.len() >= threshold {
            flush_literal(&mut instructions, &mut literal_buffer);
        }
    }

    // Tail: whatever remains in the window (fewer than block_size bytes,
    // possibly zero) could not participate in any further match.
    for byte in window {
        literal_buffer.push(byte);
    }
    flush_literal(&mut instructions, &mut literal_buffer);

    counts.literal_bytes = counts.total_bytes - counts.matched_bytes;
    Ok((instructions, counts))
}

fn index_too_small_to_match(index: &BlockIndex, block_size: u32) -> bool {
    !index.is_match_capable(block_size)
}

fn flush_literal(instructions: &mut Vec<Instruction>, buffer: &mut Vec<u8>) {
    if !buffer.is_empty() {
        instructions.push(Instruction::Literal(std::mem::take(buffer)));
    }
}

/// Fills `window` up to `target_len` bytes by reading from `source`,
/// stopping early at EOF.
fn fill_window(
    source: &mut impl Read,
    window: &mut VecDeque<u8>,
    target_len: usize,
) -> io::Result<()> {
    let mut buffer = vec![0u8; target_len - window.len()];
    let filled = read_fully(source, &mut buffer)?;
    window.extend(&buffer[..filled]);
    Ok(())
}

/// Reads until `buffer` is full or EOF, returning the number of bytes read.
fn read_fully(reader: &mut impl Read, buffer: &mut [u8]) -> io::Result<usize> {
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

/// Applies an instruction stream to reconstruct a file.
///
/// `dest` is the existing destination file (read non-sequentially via
/// `seek`); `out` receives the reconstructed bytes in order.
pub fn apply_delta(
    dest: &mut (impl Read + Seek),
    instructions: &[Instruction],
    out: &mut impl Write,
) -> Result<u64, DeltaError> {
    let mut written = 0u64;
    for instruction in instructions {
        match instruction {
            Instruction::Copy { offset, length } => {
                dest.seek(SeekFrom::Start(*offset))?;
                let mut buffer = vec![0u8; *length as usize];
                dest.read_exact(&mut buffer)?;
                out.write_all(&buffer)?;
                written += u64::from(*length);
            }
            Instruction::Literal(bytes) => {
                out.write_all(bytes)?;
                written += bytes.len() as u64;
            }
        }
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use signature::build_block_index;
    use std::io::Cursor;

    fn round_trip(source: &[u8], dest: &[u8], block_size: u32) -> (Vec<Instruction>, DeltaCounts, Vec<u8>) {
        let index = build_block_index(Cursor::new(dest), block_size).unwrap();
        let (instructions, counts) = encode_delta(Cursor::new(source), &index, block_size).unwrap();
        let mut out = Vec::new();
        apply_delta(&mut Cursor::new(dest), &instructions, &mut out).unwrap();
        (instructions, counts, out)
    }

    #[test]
    fn empty_source_produces_empty_stream() {
        let (instructions, counts, out) = round_trip(b"", b"AAAA", 4);
        assert!(instructions.is_empty());
        assert_eq!(counts.total_bytes, 0);
        assert_eq!(counts.matched_bytes, 0);
        assert_eq!(counts.literal_bytes, 0);
        assert!(out.is_empty());
    }

    #[test]
    fn missing_destination_is_all_literal() {
        let index = build_block_index(Cursor::new(b""), 65536).unwrap();
        let source = b"hello world".to_vec();
        let (instructions, counts) = encode_delta(Cursor::new(&source), &index, 65536).unwrap();
        assert_eq!(counts.literal_bytes, source.len() as u64);
        assert_eq!(counts.matched_bytes, 0);
        let mut out = Vec::new();
        apply_delta(&mut Cursor::new(b""), &instructions, &mut out).unwrap();
        assert_eq!(out, source);
    }

    #[test]
    fn source_smaller_than_block_size_is_single_literal() {
        let dest = vec![b'A'; 200_000];
        let source = b"short".to_vec();
        let (instructions, counts, out) = round_trip(&source, &dest, 65536);
        assert_eq!(counts.literal_bytes, source.len() as u64);
        assert_eq!(out, source);
        assert!(instructions.iter().all(|i| matches!(i, Instruction::Literal(_))));
    }

    #[test]
    fn identical_files_match_aligned_blocks() {
        let block_size = 65536u32;
        let data = vec![b'A'; 200_000];
        let (_instructions, counts, out) = round_trip(&data, &data, block_size);
        assert_eq!(out, data);
        assert_eq!(counts.matched_bytes, 196_608); // 3 full blocks
        assert_eq!(counts.literal_bytes, 3_392); // unaligned tail
        assert_eq!(counts.total_bytes, 200_000);
    }

    #[test]
    fn prepended_byte_shifts_alignment_but_still_matches_tail() {
        let block_size = 65536u32;
        let dest = vec![b'A'; 200_000];
        let mut source = vec![b'X'];
        source.extend(vec![b'A'; 199_999]);

        let (_instructions, counts, out) = round_trip(&source, &dest, block_size);
        assert_eq!(out, source);
        // a single inserted byte should still allow all aligned `A` blocks
        // beyond it to be found once the window resynchronizes.
        assert!(counts.matched_bytes > 0);
    }

    #[test]
    fn localized_change_leaves_surrounding_blocks_matched() {
        let block_size = 4096u32;
        let mut dest = vec![0u8; 1 << 20];
        for (i, byte) in dest.iter_mut().enumerate() {
            *byte = (i % 251) as u8;
        }
        let mut source = dest.clone();
        for byte in &mut source[100..200] {
            *byte = 0xFF;
        }

        let (_instructions, counts, out) = round_trip(&source, &dest, block_size);
        assert_eq!(out, source);
        assert!(counts.matched_bytes >= 1_040_384);
    }

    #[test]
    fn stats_are_internally_consistent() {
        let block_size = 37u32; // deliberately not a power of two
        let dest = (0u32..5000).map(|i| (i % 256) as u8).collect::<Vec<_>>();
        let mut source = dest.clone();
        source.truncate(4000);
        source.extend((0u32..123).map(|i| (255 - i % 256) as u8));

        let (_instructions, counts, out) = round_trip(&source, &dest, block_size);
        assert_eq!(out, source);
        assert_eq!(counts.matched_bytes + counts.literal_bytes, counts.total_bytes);
        assert_eq!(counts.total_bytes, source.len() as u64);
    }

    #[test]
    fn determinism_across_identical_runs() {
        let block_size = 128u32;
        let dest = (0u32..10_000).map(|i| (i * 7 % 256) as u8).collect::<Vec<_>>();
        let source = (0u32..10_000).map(|i| (i * 7 % 256) as u8).collect::<Vec<_>>();

        let (first, _, _) = round_trip(&source, &dest, block_size);
        let (second, _, _) = round_trip(&source, &dest, block_size);
        assert_eq!(first, second);
    }

    #[test]
    fn reconstruction_holds_for_arbitrary_block_sizes() {
        let dest = b"the quick brown fox jumps over the lazy dog, again and again";
        let source = b"the quick brown fox leaps over the lazy dog, again and again!";
        for block_size in [1u32, 2, 3, 5, 8, 16, 64] {
            let (_instructions, _counts, out) = round_trip(source, dest, block_size);
            assert_eq!(out, source, "mismatch at block_size={block_size}");
        }
    }
}
