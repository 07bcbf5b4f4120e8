//! 256-bit identities and the double-SHA256 content hasher.
//!
//! Identity hashes are computed over a compact little-endian field encoding
//! (length-prefixed strings, fixed-width integers) so that every node derives
//! the same hash for the same proposal or vote.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A 256-bit hash stored in little-endian byte order.
///
/// Ordering treats the bytes as an unsigned 256-bit integer, so the last byte
/// is the most significant. Display prints the big-endian hex form.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Hash256([u8; 32]);

impl Hash256 {
    /// The all-zero hash. Used as the "everything" filter in sync requests.
    pub const ZERO: Hash256 = Hash256([0u8; 32]);

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// Hash256 with its low 8 bytes set from `value`. Handy for fixtures.
    pub fn from_low_u64(value: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[..8].copy_from_slice(&value.to_le_bytes());
        Self(bytes)
    }
}

impl Ord for Hash256 {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.iter().rev().cmp(other.0.iter().rev())
    }
}

impl PartialOrd for Hash256 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut be = self.0;
        be.reverse();
        f.write_str(&hex::encode(be))
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self)
    }
}

/// Error parsing a hex hash.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid hash hex: {0}")]
pub struct ParseHashError(pub String);

impl FromStr for Hash256 {
    type Err = ParseHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = hex::decode(s.trim()).map_err(|e| ParseHashError(e.to_string()))?;
        let mut bytes: [u8; 32] = raw
            .try_into()
            .map_err(|v: Vec<u8>| ParseHashError(format!("expected 32 bytes, got {}", v.len())))?;
        bytes.reverse();
        Ok(Self(bytes))
    }
}

/// Double SHA-256 of `data`.
pub fn double_sha256(data: &[u8]) -> Hash256 {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    Hash256(second.into())
}

/// Incremental double-SHA256 over a canonical field encoding.
pub struct HashWriter {
    hasher: Sha256,
}

impl HashWriter {
    pub fn new() -> Self {
        Self {
            hasher: Sha256::new(),
        }
    }

    pub fn write_raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.hasher.update(bytes);
        self
    }

    /// Compact-size length prefix.
    pub fn write_compact_size(&mut self, len: u64) -> &mut Self {
        if len < 0xfd {
            self.write_raw(&[len as u8])
        } else if len <= 0xffff {
            self.write_raw(&[0xfd]).write_raw(&(len as u16).to_le_bytes())
        } else if len <= 0xffff_ffff {
            self.write_raw(&[0xfe]).write_raw(&(len as u32).to_le_bytes())
        } else {
            self.write_raw(&[0xff]).write_raw(&len.to_le_bytes())
        }
    }

    pub fn write_str(&mut self, value: &str) -> &mut Self {
        self.write_compact_size(value.len() as u64)
            .write_raw(value.as_bytes())
    }

    pub fn write_i64(&mut self, value: i64) -> &mut Self {
        self.write_raw(&value.to_le_bytes())
    }

    pub fn write_u32(&mut self, value: u32) -> &mut Self {
        self.write_raw(&value.to_le_bytes())
    }

    pub fn write_hash(&mut self, value: &Hash256) -> &mut Self {
        self.write_raw(value.as_bytes())
    }

    pub fn finish(self) -> Hash256 {
        let first = self.hasher.finalize();
        Hash256(Sha256::digest(first).into())
    }
}

impl Default for HashWriter {
    fn default() -> Self {
        Self::new()
    }
}
