//! Cryptographic content digests.
//!
//! A [`ContentDigest`] is the SHA-256 hash of the exact encoded bytes of an
//! upload, rendered as 64 lowercase hex characters. Byte-identical inputs
//! always produce identical digests; any single-bit change produces a
//! different digest. This is the strong identity used for exact-duplicate
//! detection, as opposed to the lossy perceptual hash used for
//! near-duplicate detection.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Digest length in hex characters (SHA-256 = 32 bytes).
pub const CONTENT_DIGEST_LEN: usize = 64;

/// SHA-256 digest of exact encoded content bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Compute the digest of the given bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        let digest = hex::encode(hasher.finalize());
        tracing::debug!(%digest, len = data.len(), "computed content digest");
        Self(digest)
    }

    /// Wrap an already-computed hex digest, e.g. one loaded from a record
    /// store. The string is taken as-is; no validation is performed here
    /// because stored digests were validated at write time.
    pub fn from_hex(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hash an arbitrary string payload with SHA-256, returning lowercase hex.
///
/// Shared by the histogram digest and the final fingerprint digest, which
/// both hash canonical UTF-8 serializations rather than raw pixel bytes.
pub(crate) fn sha256_hex(payload: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    hex::encode(hasher.finalize())
}
