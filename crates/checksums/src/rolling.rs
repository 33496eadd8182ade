use std::io::{self, Read};

/// Errors returned by [`RollingChecksum`] operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RollingError {
    /// [`RollingChecksum::roll`] was called before any bytes were observed.
    #[error("cannot roll a checksum with an empty window")]
    EmptyWindow,
}

const MODULUS: u32 = 1 << 16;

/// Rolling checksum used for weak block matching (rsync's `rsum`).
///
/// Mirrors rsync's Adler-32-style weak checksum: `s1` accumulates the byte
/// sum, `s2` accumulates prefix sums, both truncated to 16 bits.
///
/// # Examples
///
/// Roll the window forward by one byte in O(1) instead of recomputing it.
///
/// ```
/// use checksums::RollingChecksum;
///
/// let data = b"ABCDE";
/// let mut rolling = RollingChecksum::new();
/// rolling.update(&data[0..3]); // "ABC"
///
/// rolling.roll(data[0], data[3]).unwrap(); // now covers "BCD"
///
/// let mut fresh = RollingChecksum::new();
/// fresh.update(&data[1..4]);
/// assert_eq!(rolling.value(), fresh.value());
/// ```
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RollingChecksum {
    s1: u32,
    s2: u32,
    len: usize,
}

impl RollingChecksum {
    /// Creates a new rolling checksum with zeroed state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            s1: 0,
            s2: 0,
            len: 0,
        }
    }

    /// Resets the checksum back to its initial state.
    pub const fn reset(&mut self) {
        self.s1 = 0;
        self.s2 = 0;
        self.len = 0;
    }

    /// Returns the number of bytes that contributed to the current state.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no bytes have been observed yet.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Updates the checksum with an additional slice of bytes.
    ///
    /// `s2` accumulates the running sum of `s1` after each byte, which is
    /// algebraically equivalent to weighting byte `k` (0-indexed from the
    /// start of the whole window) by `(window_len - k)` without needing to
    /// know the final window length in advance.
    #[inline]
    pub fn update(&mut self, chunk: &[u8]) {
        let mut s1 = self.s1;
        let mut s2 = self.s2;
        for &byte in chunk {
            s1 = s1.wrapping_add(u32::from(byte)) % MODULUS;
            s2 = s2.wrapping_add(s1) % MODULUS;
        }
        self.s1 = s1;
        self.s2 = s2;
        self.len += chunk.len();
    }

    /// Resets the state and updates with `block`.
    pub fn update_from_block(&mut self, block: &[u8]) {
        self.reset();
        self.update(block);
    }

    /// Updates the checksum by consuming bytes from `reader` until EOF.
    pub fn update_reader<R: Read>(&mut self, reader: &mut R) -> io::Result<u64> {
        let mut buffer = [0u8; 32 * 1024];
        let mut total = 0u64;
        loop {
            match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => {
                    self.update(&buffer[..n]);
                    total += n as u64;
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(total)
    }

    /// Rolls the checksum by removing one byte and adding another.
    ///
    /// This enables O(1) sliding-window updates: the window length remains
    /// constant after rolling.
    ///
    /// # Errors
    ///
    /// Returns [`RollingError::EmptyWindow`] if no bytes have been processed.
    pub fn roll(&mut self, outgoing: u8, incoming: u8) -> Result<(), RollingError> {
        if self.len == 0 {
            return Err(RollingError::EmptyWindow);
        }
        let len = self.len as u32;
        self.s1 = (self.s1.wrapping_sub(u32::from(outgoing)).wrapping_add(u32::from(incoming)))
            % MODULUS;
        self.s2 = (self
            .s2
            .wrapping_sub(len.wrapping_mul(u32::from(outgoing)))
            .wrapping_add(self.s1))
            % MODULUS;
        Ok(())
    }

    /// Returns the combined 32-bit weak checksum value.
    #[inline]
    #[must_use]
    pub const fn value(&self) -> u32 {
        (self.s2 << 16) | self.s1
    }
}
