//! Error types for chunking and manifest operations.

use tessera_types::{ChunkHash, TypesError};

/// Boxed error returned by a caller-supplied chunk loader.
pub type LoadError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur during chunking, verification or reassembly.
#[derive(Debug, thiserror::Error)]
pub enum CasError {
    /// Invalid chunking configuration (sizes, buffer capacity).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The requested hash algorithm is not supported.
    #[error(transparent)]
    Algorithm(#[from] TypesError),

    /// Reading from the source stream failed.
    #[error("stream read error: {0}")]
    Read(#[source] std::io::Error),

    /// Writing to the output sink failed.
    #[error("stream write error: {0}")]
    Write(#[source] std::io::Error),

    /// A filesystem operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest or configuration document could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The loader could not supply a chunk's bytes.
    #[error("chunk {index} ({hash}): load failed: {source}")]
    Load {
        /// Position of the chunk in the manifest.
        index: usize,
        /// Hash of the chunk that was requested.
        hash: ChunkHash,
        /// Error returned by the loader.
        source: LoadError,
    },

    /// Loaded bytes hash to a different value than recorded.
    #[error("chunk {index} ({hash}): hash mismatch, data hashes to {actual}")]
    HashMismatch {
        /// Position of the chunk in the manifest.
        index: usize,
        /// Hash recorded in the manifest.
        hash: ChunkHash,
        /// Hash of the bytes actually loaded.
        actual: ChunkHash,
    },

    /// Loaded bytes have a different length than recorded.
    #[error("chunk {index} ({hash}): size mismatch, expected {expected} bytes, got {actual}")]
    SizeMismatch {
        /// Position of the chunk in the manifest.
        index: usize,
        /// Hash recorded in the manifest.
        hash: ChunkHash,
        /// Size recorded in the manifest.
        expected: usize,
        /// Length of the bytes actually loaded.
        actual: usize,
    },

    /// The manifest's chunk sizes do not add up to its file size.
    #[error("manifest file size is {expected} bytes but its chunks cover {actual}")]
    FileSizeMismatch {
        /// Recorded file size.
        expected: u64,
        /// Sum of recorded chunk sizes.
        actual: u64,
    },

    /// The manifest's file name has no usable final path component.
    #[error("invalid file name in manifest: {0:?}")]
    InvalidFileName(String),
}

impl From<serde_json::Error> for CasError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for CasError {
    fn from(e: toml::de::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl CasError {
    /// True for hash or size mismatches found while verifying chunks.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            Self::HashMismatch { .. } | Self::SizeMismatch { .. } | Self::FileSizeMismatch { .. }
        )
    }
}
