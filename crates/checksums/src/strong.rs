//! Strong digest used to confirm a candidate block match.
//!
//! A weak checksum collision only means two blocks are *probably* equal;
//! [`Md5`] resolves the ambiguity with a cryptographic-strength digest.
//! Strong-digest equality is treated as byte equality for the purposes of
//! block matching (no secondary byte-by-byte comparison is performed),
//! matching rsync's own collision-probability tradeoff.

use digest::Digest;

/// Number of bytes in an MD5 digest.
pub const DIGEST_LEN: usize = 16;

/// Streaming MD5 hasher used to confirm weak-checksum block matches.
#[derive(Clone, Debug, Default)]
pub struct Md5 {
    inner: md5::Md5,
}

impl Md5 {
    /// Creates a hasher with empty state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: md5::Md5::new(),
        }
    }

    /// Feeds additional bytes into the digest state.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Finalizes the digest and returns the 128-bit MD5 output.
    #[must_use]
    pub fn finalize(self) -> [u8; DIGEST_LEN] {
        self.inner.finalize().into()
    }

    /// Computes the MD5 digest of `data` in one call.
    #[must_use]
    pub fn digest(data: &[u8]) -> [u8; DIGEST_LEN] {
        let mut hasher = Self::new();
        hasher.update(data);
        hasher.finalize()
    }
}
