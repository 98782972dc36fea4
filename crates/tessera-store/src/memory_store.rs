//! In-memory content-addressed blob store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use bytes::Bytes;
use tessera_types::{Chunk, ChunkHash, HashAlgorithm};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::memory_index::MemoryIndex;
use crate::traits::{ChunkIndex, ChunkStorage, IntegrityReport};

/// Blob store backed by a `RwLock<HashMap>`, gated by a [`ChunkIndex`].
///
/// Useful for tests and for pipelines that only need chunks for the
/// lifetime of the process.
///
/// **[`verify_integrity`](ChunkStorage::verify_integrity) re-hashes blobs
/// with the store's algorithm, sha256 unless set with
/// [`with_algorithm`](MemoryStorage::with_algorithm).** It must match the
/// algorithm the chunks were hashed with, otherwise every blob is
/// reported corrupt. `save` and `load` do not hash.
pub struct MemoryStorage {
    blobs: RwLock<HashMap<ChunkHash, Bytes>>,
    index: Arc<dyn ChunkIndex>,
    algorithm: HashAlgorithm,
    lock: Mutex<()>,
}

impl MemoryStorage {
    /// Create an empty store gated by `index`.
    pub fn new(index: Arc<dyn ChunkIndex>) -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
            index,
            algorithm: HashAlgorithm::default(),
            lock: Mutex::new(()),
        }
    }

    /// Create an empty store with a fresh in-memory index.
    pub fn with_memory_index() -> Self {
        Self::new(Arc::new(MemoryIndex::new()))
    }

    /// Hash algorithm used by [`verify_integrity`](ChunkStorage::verify_integrity).
    pub fn with_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// The index gating this store.
    pub fn index(&self) -> &Arc<dyn ChunkIndex> {
        &self.index
    }

    /// Total bytes held.
    pub fn used_bytes(&self) -> u64 {
        let blobs = self.blobs.read().expect("lock poisoned");
        blobs.values().map(|b| b.len() as u64).sum()
    }

    /// Return a reference to the inner map (for testing purposes).
    #[cfg(test)]
    pub(crate) fn inner(&self) -> &RwLock<HashMap<ChunkHash, Bytes>> {
        &self.blobs
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::with_memory_index()
    }
}

impl ChunkStorage for MemoryStorage {
    fn save(&self, chunk: &Chunk, data: &[u8]) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().expect("lock poisoned");

        if self.index.try_exists(&chunk.hash)? {
            debug!(hash = %chunk.hash, "chunk already stored");
            return Ok(false);
        }

        self.blobs
            .write()
            .expect("lock poisoned")
            .insert(chunk.hash, Bytes::copy_from_slice(data));

        if let Err(e) = self.index.add(*chunk) {
            warn!(hash = %chunk.hash, error = %e, "index update failed, dropping blob");
            self.blobs.write().expect("lock poisoned").remove(&chunk.hash);
            return Err(e);
        }

        debug!(hash = %chunk.hash, size = data.len(), "stored chunk in memory");
        Ok(true)
    }

    fn load(&self, hash: &ChunkHash) -> Result<Bytes, StoreError> {
        if !self.index.try_exists(hash)? {
            return Err(StoreError::NotFound(*hash));
        }
        let blobs = self.blobs.read().expect("lock poisoned");
        blobs.get(hash).cloned().ok_or(StoreError::NotFound(*hash))
    }

    fn contains(&self, hash: &ChunkHash) -> Result<bool, StoreError> {
        self.index.try_exists(hash)
    }

    fn verify_integrity(&self) -> Result<IntegrityReport, StoreError> {
        let blobs = self.blobs.read().expect("lock poisoned");
        let mut report = IntegrityReport::default();
        for hash in self.index.hashes() {
            report.checked += 1;
            match blobs.get(&hash) {
                Some(data) if self.algorithm.digest(data) != hash => {
                    warn!(%hash, "blob corruption detected");
                    report.corrupt.push(hash);
                }
                Some(_) => {}
                None => {
                    warn!(%hash, "indexed blob missing");
                    report.missing.push(hash);
                }
            }
        }
        Ok(report)
    }
}
