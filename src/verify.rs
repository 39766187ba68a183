// Streaming SHA-256 verification of the uploaded image.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 digest length accepted from the caller.
pub const HASH_HEX_LEN: usize = 64;

/// Accumulates a SHA-256 digest over the uploaded byte stream and compares
/// it against a caller-supplied expected digest at finalize.
///
/// Created only when the caller both enabled verification and supplied a
/// well-formed expected hash; an absent or malformed hash means
/// verification was not requested. Never outlives one update session.
pub struct IntegrityVerifier {
    hasher: Sha256,
    expected: [u8; 32],
}

impl IntegrityVerifier {
    /// Builds a verifier from a 64-character hex digest (case-insensitive).
    /// Returns `None` for any other length or non-hex input.
    pub fn from_hex(expected: &str) -> Option<Self> {
        decode_hash(expected).map(|expected| Self { hasher: Sha256::new(), expected })
    }

    /// Feeds uploaded bytes. Calling this per chunk yields the same digest
    /// as hashing the whole concatenated stream.
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    /// Finishes the digest and compares it byte-for-byte against the
    /// expected value.
    pub fn verify(self) -> bool {
        let computed = self.hasher.finalize();
        let ok = computed.as_slice() == self.expected;
        if !ok {
            log::error!(
                "Hash verification failed: computed {} expected {}",
                encode_hash(computed.as_slice()),
                encode_hash(&self.expected)
            );
        }
        ok
    }
}

/// Decodes a 64-hex-char digest string into 32 bytes.
pub fn decode_hash(hex: &str) -> Option<[u8; 32]> {
    if hex.len() != HASH_HEX_LEN {
        return None;
    }
    let mut out = [0u8; 32];
    for (i, byte) in out.iter_mut().enumerate() {
        let pair = hex.get(i * 2..i * 2 + 2)?;
        *byte = u8::from_str_radix(pair, 16).ok()?;
    }
    Some(out)
}

fn encode_hash(digest: &[u8]) -> String {
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
