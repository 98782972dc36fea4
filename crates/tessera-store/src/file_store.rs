//! File-based content-addressed blob store.
//!
//! Stores one file per chunk directly under the root directory, named by
//! the lowercase hex of its hash: `{root}/{hex(hash)}`.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tessera_types::{Chunk, ChunkHash, HashAlgorithm};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::memory_index::MemoryIndex;
use crate::traits::{ChunkIndex, ChunkStorage, IntegrityReport};

/// Flat directory of chunk blobs gated by a [`ChunkIndex`].
///
/// Writes are atomic: bytes go to a temporary file in the root directory,
/// which is synced and then renamed into place, so a blob is either absent
/// or complete. Blobs are write-once.
///
/// **[`verify_integrity`](ChunkStorage::verify_integrity) re-hashes blobs
/// with the store's algorithm, sha256 unless set with
/// [`with_algorithm`](FileStorage::with_algorithm).** A store holding
/// blake3 chunks must be built with `HashAlgorithm::Blake3`, otherwise
/// every blob is reported corrupt. `save` and `load` do not hash.
pub struct FileStorage {
    root: PathBuf,
    index: Arc<dyn ChunkIndex>,
    algorithm: HashAlgorithm,
    lock: Mutex<()>,
}

impl FileStorage {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl AsRef<Path>, index: Arc<dyn ChunkIndex>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            index,
            algorithm: HashAlgorithm::default(),
            lock: Mutex::new(()),
        })
    }

    /// Create a store with a fresh in-memory index.
    pub fn with_memory_index(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::new(root, Arc::new(MemoryIndex::new()))
    }

    /// Hash algorithm used by [`verify_integrity`](ChunkStorage::verify_integrity).
    pub fn with_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Root directory of the blobs.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The index gating this store.
    pub fn index(&self) -> &Arc<dyn ChunkIndex> {
        &self.index
    }

    /// Path of the blob for `hash`.
    pub fn blob_path(&self, hash: &ChunkHash) -> PathBuf {
        self.root.join(hash.to_hex())
    }

    fn write_blob(&self, path: &Path, data: &[u8]) -> Result<(), StoreError> {
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| StoreError::Persist {
            path: path.to_path_buf(),
            source: e.error,
        })?;
        Ok(())
    }
}

impl ChunkStorage for FileStorage {
    fn save(&self, chunk: &Chunk, data: &[u8]) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().expect("lock poisoned");

        if self.index.try_exists(&chunk.hash)? {
            debug!(hash = %chunk.hash, "chunk already stored");
            return Ok(false);
        }

        let path = self.blob_path(&chunk.hash);
        self.write_blob(&path, data)?;

        if let Err(e) = self.index.add(*chunk) {
            warn!(hash = %chunk.hash, error = %e, "index update failed, removing blob");
            if let Err(rm) = fs::remove_file(&path) {
                warn!(hash = %chunk.hash, path = %path.display(), error = %rm, "failed to remove orphan blob");
                return Err(StoreError::Unindexed {
                    hash: chunk.hash,
                    source: Box::new(e),
                });
            }
            return Err(e);
        }

        debug!(hash = %chunk.hash, path = %path.display(), size = data.len(), "stored chunk to file");
        Ok(true)
    }

    fn load(&self, hash: &ChunkHash) -> Result<Bytes, StoreError> {
        if !self.index.try_exists(hash)? {
            return Err(StoreError::NotFound(*hash));
        }
        match fs::read(self.blob_path(hash)) {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(*hash)),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn contains(&self, hash: &ChunkHash) -> Result<bool, StoreError> {
        self.index.try_exists(hash)
    }

    fn verify_integrity(&self) -> Result<IntegrityReport, StoreError> {
        let mut report = IntegrityReport::default();
        for hash in self.index.hashes() {
            report.checked += 1;
            match fs::read(self.blob_path(&hash)) {
                Ok(data) => {
                    let actual = self.algorithm.digest(&data);
                    if actual != hash {
                        warn!(expected = %hash, %actual, "blob corruption detected");
                        report.corrupt.push(hash);
                    }
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    warn!(%hash, "indexed blob missing");
                    report.missing.push(hash);
                }
                Err(e) => return Err(StoreError::Io(e)),
            }
        }
        debug!(
            checked = report.checked,
            corrupt = report.corrupt.len(),
            missing = report.missing.len(),
            "integrity check finished"
        );
        Ok(report)
    }
}
