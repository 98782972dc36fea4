//! Core traits and types for chunk indexing and storage.

use bytes::Bytes;
use tessera_types::{Chunk, ChunkHash};

use crate::error::StoreError;

/// Hash-keyed record of which chunks are known.
///
/// One entry per distinct hash; the first [`add`](ChunkIndex::add) for a
/// hash wins and later adds are successful no-ops.
///
/// `exists` and `get` never fail. Backends whose lookups can fail override
/// [`try_exists`](ChunkIndex::try_exists) and [`try_get`](ChunkIndex::try_get)
/// to surface the cause; the infallible variants then degrade to "absent".
///
/// Implementations must be `Send + Sync`; they are shared as
/// `Arc<dyn ChunkIndex>` between writers and stores.
pub trait ChunkIndex: Send + Sync {
    /// Record a chunk.
    fn add(&self, chunk: Chunk) -> Result<(), StoreError>;

    /// Whether a chunk with this hash is recorded.
    fn exists(&self, hash: &ChunkHash) -> bool;

    /// Descriptor recorded for this hash.
    fn get(&self, hash: &ChunkHash) -> Option<Chunk>;

    /// Snapshot of every recorded hash.
    fn hashes(&self) -> Vec<ChunkHash>;

    /// Number of recorded chunks.
    fn len(&self) -> usize;

    /// Whether nothing has been recorded.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Like [`exists`](ChunkIndex::exists), reporting lookup failures.
    fn try_exists(&self, hash: &ChunkHash) -> Result<bool, StoreError> {
        Ok(self.exists(hash))
    }

    /// Like [`get`](ChunkIndex::get), reporting lookup failures.
    fn try_get(&self, hash: &ChunkHash) -> Result<Option<Chunk>, StoreError> {
        Ok(self.get(hash))
    }
}

/// Content-addressed blob store.
///
/// The index is authoritative: a blob whose hash is not indexed does not
/// exist as far as the store is concerned, even if it is physically present.
pub trait ChunkStorage: Send + Sync {
    /// Store `data` under `chunk.hash`.
    ///
    /// Returns `true` when the blob was written, `false` when the hash was
    /// already indexed and nothing was done.
    fn save(&self, chunk: &Chunk, data: &[u8]) -> Result<bool, StoreError>;

    /// The exact bytes previously saved under `hash`.
    fn load(&self, hash: &ChunkHash) -> Result<Bytes, StoreError>;

    /// Whether `hash` is indexed.
    fn contains(&self, hash: &ChunkHash) -> Result<bool, StoreError>;

    /// Re-hash every indexed blob and report what does not match.
    ///
    /// A maintenance operation; never invoked by `save` or `load`.
    fn verify_integrity(&self) -> Result<IntegrityReport, StoreError>;
}

/// Outcome of [`ChunkStorage::verify_integrity`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    /// Number of indexed blobs examined.
    pub checked: usize,
    /// Blobs whose content no longer hashes to their name.
    pub corrupt: Vec<ChunkHash>,
    /// Indexed hashes with no blob on the medium.
    pub missing: Vec<ChunkHash>,
}

impl IntegrityReport {
    /// True when every indexed blob is present and intact.
    pub fn is_clean(&self) -> bool {
        self.corrupt.is_empty() && self.missing.is_empty()
    }
}
