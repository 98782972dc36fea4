//! In-memory chunk index.

use std::collections::HashMap;
use std::sync::RwLock;

use tessera_types::{Chunk, ChunkHash};
use tracing::debug;

use crate::error::StoreError;
use crate::traits::ChunkIndex;

/// Chunk index backed by a `RwLock<HashMap>`.
///
/// Lives for the lifetime of the process. Never fails.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    entries: RwLock<HashMap<ChunkHash, Chunk>>,
}

impl MemoryIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChunkIndex for MemoryIndex {
    fn add(&self, chunk: Chunk) -> Result<(), StoreError> {
        let mut entries = self.entries.write().expect("lock poisoned");
        entries.entry(chunk.hash).or_insert_with(|| {
            debug!(hash = %chunk.hash, size = chunk.size, "indexed chunk in memory");
            chunk
        });
        Ok(())
    }

    fn exists(&self, hash: &ChunkHash) -> bool {
        let entries = self.entries.read().expect("lock poisoned");
        entries.contains_key(hash)
    }

    fn get(&self, hash: &ChunkHash) -> Option<Chunk> {
        let entries = self.entries.read().expect("lock poisoned");
        entries.get(hash).copied()
    }

    fn hashes(&self) -> Vec<ChunkHash> {
        let entries = self.entries.read().expect("lock poisoned");
        entries.keys().copied().collect()
    }

    fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }
}
