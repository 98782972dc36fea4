//! Chunk index persisted as a single JSON document.
//!
//! The document maps lowercase hex hash to chunk descriptor:
//!
//! ```json
//! { "5feceb66…": { "offset": 0, "size": 15, "hash": "5feceb66…" } }
//! ```
//!
//! Every [`add`](ChunkIndex::add) rewrites the whole document: the new map
//! is serialized to a temporary file in the same directory, synced, and
//! renamed over the document before it is committed to memory. The file on
//! disk is therefore always a complete old state or a complete new state.
//! The cost is linear in the index size per add, which suits small and
//! medium corpora.
//!
//! Only one process may write a given document; concurrent writers in
//! separate processes lose each other's updates.

use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tessera_types::{Chunk, ChunkHash};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::traits::ChunkIndex;

type Entries = BTreeMap<ChunkHash, Chunk>;

/// Durable chunk index backed by a JSON document.
///
/// Lookups are served from memory. On a miss the document is re-read and
/// merged in, so entries persisted by another instance over the same path
/// become visible. A failed re-read makes [`exists`](ChunkIndex::exists)
/// report `false`; [`try_exists`](ChunkIndex::try_exists) and
/// [`try_get`](ChunkIndex::try_get) return the error.
#[derive(Debug)]
pub struct JsonIndex {
    path: PathBuf,
    entries: RwLock<Entries>,
}

impl JsonIndex {
    /// Open the index at `path`, loading the document if it exists.
    ///
    /// A missing document yields an empty index. A document that exists but
    /// cannot be parsed is an error; the index never silently starts empty.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let entries = read_document(&path)?.unwrap_or_default();
        debug!(path = %path.display(), entries = entries.len(), "opened json index");
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    /// Location of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the document and merge entries not yet known in memory.
    ///
    /// Returns the number of entries added.
    pub fn reload(&self) -> Result<usize, StoreError> {
        let mut entries = self.entries.write().expect("lock poisoned");
        merge_document(&self.path, &mut entries)
    }

    /// Write `entries` to the document atomically.
    fn persist(&self, entries: &Entries) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, entries)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StoreError::Persist {
            path: self.path.clone(),
            source: e.error,
        })?;
        Ok(())
    }
}

impl ChunkIndex for JsonIndex {
    fn add(&self, chunk: Chunk) -> Result<(), StoreError> {
        let mut entries = self.entries.write().expect("lock poisoned");
        if entries.contains_key(&chunk.hash) {
            return Ok(());
        }

        let mut next = entries.clone();
        next.insert(chunk.hash, chunk);
        self.persist(&next)?;
        *entries = next;

        debug!(hash = %chunk.hash, size = chunk.size, entries = entries.len(), "indexed chunk");
        Ok(())
    }

    fn exists(&self, hash: &ChunkHash) -> bool {
        match self.try_exists(hash) {
            Ok(found) => found,
            Err(e) => {
                warn!(%hash, path = %self.path.display(), error = %e, "index reload failed, reporting absent");
                false
            }
        }
    }

    fn get(&self, hash: &ChunkHash) -> Option<Chunk> {
        match self.try_get(hash) {
            Ok(found) => found,
            Err(e) => {
                warn!(%hash, path = %self.path.display(), error = %e, "index reload failed, reporting absent");
                None
            }
        }
    }

    fn hashes(&self) -> Vec<ChunkHash> {
        let entries = self.entries.read().expect("lock poisoned");
        entries.keys().copied().collect()
    }

    fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    fn try_exists(&self, hash: &ChunkHash) -> Result<bool, StoreError> {
        Ok(self.try_get(hash)?.is_some())
    }

    fn try_get(&self, hash: &ChunkHash) -> Result<Option<Chunk>, StoreError> {
        {
            let entries = self.entries.read().expect("lock poisoned");
            if let Some(chunk) = entries.get(hash) {
                return Ok(Some(*chunk));
            }
        }

        // Miss: re-read the document under the write lock.
        let mut entries = self.entries.write().expect("lock poisoned");
        if let Some(chunk) = entries.get(hash) {
            return Ok(Some(*chunk));
        }
        merge_document(&self.path, &mut entries)?;
        Ok(entries.get(hash).copied())
    }
}

/// Parse the document at `path`. `Ok(None)` when it does not exist.
fn read_document(path: &Path) -> Result<Option<Entries>, StoreError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::Io(e)),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

/// Merge the document into `entries` without overwriting known hashes.
fn merge_document(path: &Path, entries: &mut Entries) -> Result<usize, StoreError> {
    let Some(document) = read_document(path)? else {
        return Ok(0);
    };
    let before = entries.len();
    for (hash, chunk) in document {
        entries.entry(hash).or_insert(chunk);
    }
    Ok(entries.len() - before)
}
