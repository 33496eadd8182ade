#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `checksums` provides the rolling and strong checksum primitives used by
//! the block-matching delta engine. The weak checksum is an Adler-32-style
//! rolling sum that can be advanced one byte at a time in O(1); the strong
//! digest is MD5, used to confirm a candidate match once its weak checksum
//! collides with a destination block.
//!
//! # Design
//!
//! - [`rolling::RollingChecksum`] implements the rolling weak checksum
//!   (`weak = (b << 16) | a`) described by the delta engine's block
//!   fingerprinting step.
//! - [`strong::Md5`] wraps the `md-5` crate's streaming hasher behind a small
//!   API that matches the shape the signature and delta crates expect.
//!
//! # Invariants
//!
//! - `RollingChecksum` truncates both accumulators to 16 bits after every
//!   update, exactly as the rsync-derived algorithm requires.
//! - Rolling a checksum that has not observed any bytes yet is an error:
//!   there is no window to advance.
//!
//! # Examples
//!
//! ```
//! use checksums::RollingChecksum;
//!
//! let mut rolling = RollingChecksum::new();
//! rolling.update(b"abcd");
//! assert_eq!(rolling.len(), 4);
//!
//! rolling.roll(b'a', b'e').unwrap();
//! assert_eq!(rolling.len(), 4);
//! ```

mod rolling;
pub mod strong;

pub use rolling::{RollingChecksum, RollingError};
