//! Deduplicating chunk sink.

use std::io::Write;
use std::sync::{Arc, Mutex};

use tessera_types::Chunk;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::memory_index::MemoryIndex;
use crate::traits::ChunkIndex;

/// Result of [`ChunkWriter::write_chunk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Bytes written to the sink.
    pub written: usize,
    /// The chunk was already indexed and was skipped.
    pub duplicate: bool,
}

/// Writes chunk bytes to a sink, skipping content whose hash is indexed.
///
/// The lookup, the write and the index update run under one mutex, so two
/// threads can never both see a hash as absent and both write it.
pub struct ChunkWriter<W> {
    state: Mutex<WriterState<W>>,
    index: Arc<dyn ChunkIndex>,
}

struct WriterState<W> {
    sink: W,
    bytes_written: u64,
}

impl<W: Write> ChunkWriter<W> {
    /// Create a writer over `sink` deduplicating against `index`.
    pub fn new(sink: W, index: Arc<dyn ChunkIndex>) -> Self {
        Self {
            state: Mutex::new(WriterState {
                sink,
                bytes_written: 0,
            }),
            index,
        }
    }

    /// Create a writer with a fresh in-memory index.
    pub fn with_memory_index(sink: W) -> Self {
        Self::new(sink, Arc::new(MemoryIndex::new()))
    }

    /// Write `data` unless `chunk.hash` is already indexed.
    ///
    /// A failed sink write leaves the index untouched. If the write succeeds
    /// but the index update fails, [`StoreError::Unindexed`] is returned: the
    /// bytes are in the sink without an index entry.
    pub fn write_chunk(&self, chunk: &Chunk, data: &[u8]) -> Result<WriteOutcome, StoreError> {
        let mut state = self.state.lock().expect("lock poisoned");

        if self.index.try_exists(&chunk.hash)? {
            debug!(hash = %chunk.hash, size = chunk.size, "skipping duplicate chunk");
            return Ok(WriteOutcome {
                written: 0,
                duplicate: true,
            });
        }

        state.sink.write_all(data).map_err(StoreError::Write)?;
        state.bytes_written += data.len() as u64;

        if let Err(e) = self.index.add(*chunk) {
            warn!(hash = %chunk.hash, error = %e, "chunk written but index update failed");
            return Err(StoreError::Unindexed {
                hash: chunk.hash,
                source: Box::new(e),
            });
        }

        debug!(hash = %chunk.hash, size = data.len(), "wrote chunk");
        Ok(WriteOutcome {
            written: data.len(),
            duplicate: false,
        })
    }

    /// Flush the underlying sink.
    pub fn flush(&self) -> Result<(), StoreError> {
        let mut state = self.state.lock().expect("lock poisoned");
        state.sink.flush().map_err(StoreError::Write)
    }

    /// Total bytes written to the sink so far.
    pub fn bytes_written(&self) -> u64 {
        self.state.lock().expect("lock poisoned").bytes_written
    }

    /// The index this writer deduplicates against.
    pub fn index(&self) -> &Arc<dyn ChunkIndex> {
        &self.index
    }

    /// Recover the sink.
    pub fn into_inner(self) -> W {
        self.state.into_inner().expect("lock poisoned").sink
    }
}
