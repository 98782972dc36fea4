//! Error types for index, writer and blob storage operations.

use std::path::PathBuf;

use tessera_types::ChunkHash;

/// Errors that can occur while indexing, writing or storing chunks.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested chunk is not present.
    #[error("chunk not found: {0}")]
    NotFound(ChunkHash),

    /// A filesystem operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Writing chunk bytes to the output sink failed.
    #[error("sink write error: {0}")]
    Write(#[source] std::io::Error),

    /// An index document exists but could not be parsed.
    #[error("malformed index document {}: {source}", .path.display())]
    Parse {
        /// Location of the document.
        path: PathBuf,
        /// Underlying parse failure.
        source: serde_json::Error,
    },

    /// The index could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A temporary file could not be renamed into place.
    #[error("failed to persist {}: {source}", .path.display())]
    Persist {
        /// Final destination that was not written.
        path: PathBuf,
        /// Underlying rename failure.
        source: std::io::Error,
    },

    /// Chunk bytes reached the medium but the index does not record them.
    ///
    /// The medium and the index now disagree; the caller must reconcile
    /// (retry the index update or discard the written bytes).
    #[error("chunk {hash} written but not indexed: {source}")]
    Unindexed {
        /// Hash of the chunk that was written.
        hash: ChunkHash,
        /// Why the index update failed.
        source: Box<StoreError>,
    },
}

impl StoreError {
    /// True for [`StoreError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
