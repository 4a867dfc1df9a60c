//! The fixed-width digest type `H` used throughout the cache.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 128-bit content digest computed with XXH3.
///
/// Two byte sequences with the same [`Digest`] are assumed identical. The
/// first two hex characters of the [`Display`](fmt::Display) form are used
/// everywhere as the two-level shard prefix for the object and manifest
/// stores, so the digest must be uniformly distributed in its high bits —
/// XXH3-128 satisfies this for realistic build inputs.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest([u8; 16]);

impl Digest {
    /// Computes `H(data)`.
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = xxhash_rust::xxh3::xxh3_128(data);
        Self(hash.to_le_bytes())
    }

    /// Computes `hashString(s) = H(utf-8(s))`.
    pub fn from_str(s: &str) -> Self {
        Self::from_bytes(s.as_bytes())
    }

    /// Combines two already-computed digests the way the manifest and
    /// object key derivations do: `H(a.to_string() ∥ sep ∥ b.to_string())`.
    pub fn combine(a: &Digest, sep: &str, b: &Digest) -> Self {
        let joined = format!("{a}{sep}{b}");
        Self::from_str(&joined)
    }

    /// The first two lowercase hex characters, used as the shard prefix.
    pub fn shard_prefix(&self) -> String {
        format!("{:02x}", self.0[0])
    }

    /// Raw bytes of the digest.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({:02x}{:02x}..)", self.0[0], self.0[1])
    }
}

impl std::str::FromStr for Digest {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 16];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)?;
        }
        Ok(Self(bytes))
    }
}
