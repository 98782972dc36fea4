//! Shared types and identifiers for Tessera.
//!
//! This crate defines the types every other Tessera crate agrees on:
//! the content digest ([`ChunkHash`]), the chunk descriptor ([`Chunk`]),
//! and the named hash provider ([`HashAlgorithm`]) used to fingerprint
//! chunk content.
//!
//! A [`ChunkHash`] is serialized as its lowercase hex string, so the
//! persistent index document and manifests carry human-readable keys.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha1::Sha1;
use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors produced while parsing shared types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypesError {
    /// The requested hash algorithm name is not supported.
    #[error("unsupported hash algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// A hex string could not be decoded into a digest.
    #[error("invalid chunk hash {0:?}: expected 40 or 64 hex characters")]
    InvalidHash(String),
}

// ---------------------------------------------------------------------------
// Digest
// ---------------------------------------------------------------------------

/// Longest supported digest in bytes (sha256, blake3).
pub const MAX_DIGEST_LEN: usize = 32;

/// Digest length of sha1 in bytes.
pub const SHA1_DIGEST_LEN: usize = 20;

/// Content digest of a chunk: the dedup and storage key.
///
/// Holds either a 32-byte (sha256, blake3) or a 20-byte (sha1) digest.
/// Unused trailing bytes are always zero, so equality, ordering and
/// hashing only ever see the digest itself. `Display` renders lowercase
/// hex, which is also the on-disk blob name and the persistent index key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct ChunkHash {
    bytes: [u8; MAX_DIGEST_LEN],
    len: u8,
}

impl ChunkHash {
    /// Return the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    /// Digest length in bytes.
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// False for every computed or parsed digest.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Parse a 40- or 64-character hex string (either case).
    pub fn from_hex(s: &str) -> Result<Self, TypesError> {
        let invalid = || TypesError::InvalidHash(s.to_string());
        let decoded = hex::decode(s).map_err(|_| invalid())?;
        Self::from_slice(&decoded).ok_or_else(invalid)
    }

    /// Lowercase hex encoding of the digest.
    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }

    fn from_slice(digest: &[u8]) -> Option<Self> {
        if digest.len() != MAX_DIGEST_LEN && digest.len() != SHA1_DIGEST_LEN {
            return None;
        }
        let mut bytes = [0u8; MAX_DIGEST_LEN];
        bytes[..digest.len()].copy_from_slice(digest);
        Some(Self {
            bytes,
            len: digest.len() as u8,
        })
    }
}

impl From<[u8; MAX_DIGEST_LEN]> for ChunkHash {
    fn from(bytes: [u8; MAX_DIGEST_LEN]) -> Self {
        Self {
            bytes,
            len: MAX_DIGEST_LEN as u8,
        }
    }
}

impl From<[u8; SHA1_DIGEST_LEN]> for ChunkHash {
    fn from(digest: [u8; SHA1_DIGEST_LEN]) -> Self {
        let mut bytes = [0u8; MAX_DIGEST_LEN];
        bytes[..SHA1_DIGEST_LEN].copy_from_slice(&digest);
        Self {
            bytes,
            len: SHA1_DIGEST_LEN as u8,
        }
    }
}

impl AsRef<[u8]> for ChunkHash {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl FromStr for ChunkHash {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl fmt::Display for ChunkHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.as_bytes() {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ChunkHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkHash({self})")
    }
}

impl Serialize for ChunkHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ChunkHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Hash provider
// ---------------------------------------------------------------------------

/// Hash function used to fingerprint chunk content, selectable by name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    /// SHA-256 (the default).
    #[default]
    Sha256,
    /// SHA-1, for reading stores and manifests written with it. Not
    /// collision resistant; prefer sha256 or blake3 for new data.
    Sha1,
    /// BLAKE3 with its default 256-bit output.
    Blake3,
}

impl HashAlgorithm {
    /// Canonical lowercase name, as recorded in manifests.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha1 => "sha1",
            Self::Blake3 => "blake3",
        }
    }

    /// Digest length in bytes.
    pub fn digest_len(&self) -> usize {
        match self {
            Self::Sha1 => SHA1_DIGEST_LEN,
            Self::Sha256 | Self::Blake3 => MAX_DIGEST_LEN,
        }
    }

    /// Resolve an algorithm by name.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace.
    /// The empty name selects the default (`sha256`).
    pub fn from_name(name: &str) -> Result<Self, TypesError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "" | "sha256" | "sha-256" => Ok(Self::Sha256),
            "sha1" | "sha-1" => Ok(Self::Sha1),
            "blake3" => Ok(Self::Blake3),
            _ => Err(TypesError::UnsupportedAlgorithm(name.to_string())),
        }
    }

    /// Hash `data` with this algorithm.
    pub fn digest(&self, data: &[u8]) -> ChunkHash {
        match self {
            Self::Sha256 => {
                let mut digest = [0u8; MAX_DIGEST_LEN];
                digest.copy_from_slice(&Sha256::digest(data));
                ChunkHash::from(digest)
            }
            Self::Sha1 => {
                let mut digest = [0u8; SHA1_DIGEST_LEN];
                digest.copy_from_slice(&Sha1::digest(data));
                ChunkHash::from(digest)
            }
            Self::Blake3 => ChunkHash::from(<[u8; MAX_DIGEST_LEN]>::from(blake3::hash(data))),
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Chunk descriptor
// ---------------------------------------------------------------------------

/// Descriptor for one content-defined chunk of a logical stream.
///
/// Produced at boundary-detection time and immutable afterwards. The
/// `hash` is the key used by indexes, stores and manifests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Chunk {
    /// Absolute byte offset of the chunk within the original stream.
    pub offset: u64,
    /// Length of the chunk in bytes.
    pub size: usize,
    /// Digest of the chunk content.
    pub hash: ChunkHash,
}

/// Why a chunk's data failed verification against its descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ChunkMismatch {
    /// The recomputed digest differs from the recorded one.
    #[error("hash mismatch: expected {expected}, got {actual}")]
    Hash {
        /// Digest recorded in the descriptor.
        expected: ChunkHash,
        /// Digest of the data actually supplied.
        actual: ChunkHash,
    },

    /// The data length differs from the recorded size.
    #[error("size mismatch: expected {expected} bytes, got {actual}")]
    Size {
        /// Size recorded in the descriptor.
        expected: usize,
        /// Length of the data actually supplied.
        actual: usize,
    },
}

impl Chunk {
    /// Create a descriptor from its parts.
    pub fn new(offset: u64, size: usize, hash: ChunkHash) -> Self {
        Self { offset, size, hash }
    }

    /// Describe `data` located at `offset`, hashing it with `algorithm`.
    pub fn from_data(offset: u64, data: &[u8], algorithm: HashAlgorithm) -> Self {
        Self {
            offset,
            size: data.len(),
            hash: algorithm.digest(data),
        }
    }

    /// Check that `data` is exactly the content this descriptor names.
    ///
    /// The digest is compared first, then the length.
    pub fn verify(&self, data: &[u8], algorithm: HashAlgorithm) -> Result<(), ChunkMismatch> {
        let actual = algorithm.digest(data);
        if actual != self.hash {
            return Err(ChunkMismatch::Hash {
                expected: self.hash,
                actual,
            });
        }
        if data.len() != self.size {
            return Err(ChunkMismatch::Size {
                expected: self.size,
                actual: data.len(),
            });
        }
        Ok(())
    }

    /// Two descriptors name the same content when hash and size agree,
    /// regardless of where each occurred in its stream.
    pub fn same_content(&self, other: &Chunk) -> bool {
        self.hash == other.hash && self.size == other.size
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "chunk {{offset={}, size={}, hash={}}}",
            self.offset, self.size, self.hash
        )
    }
}
