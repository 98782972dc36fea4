//! File manifests: the ordered chunk ledger of one logical file.
//!
//! A [`Manifest`] records a file's name, size, hash algorithm and the
//! descriptors of its chunks in stream order. It holds no chunk data; bytes
//! are fetched through a caller-supplied loader when the file is verified
//! or reassembled, so any storage backend plugs in as a closure:
//!
//! ```ignore
//! manifest.verify_file(|hash| storage.load(hash))?;
//! ```
//!
//! On disk a manifest is a pretty-printed JSON document with the fields
//! `file_name`, `file_size`, `hash_algorithm` and `chunks`.

use std::collections::HashSet;
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tessera_types::{Chunk, ChunkHash, ChunkMismatch, HashAlgorithm};
use tracing::{debug, warn};

use crate::error::{CasError, LoadError};

/// Ordered chunk composition of a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Name of the original file.
    pub file_name: String,
    /// Total size of the original file in bytes.
    pub file_size: u64,
    /// Name of the hash algorithm the chunk hashes were computed with.
    pub hash_algorithm: String,
    /// Chunk descriptors in stream order.
    pub chunks: Vec<Chunk>,
}

impl Manifest {
    /// Create an empty manifest.
    pub fn new(
        file_name: impl Into<String>,
        file_size: u64,
        hash_algorithm: impl Into<String>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            file_size,
            hash_algorithm: hash_algorithm.into(),
            chunks: Vec::new(),
        }
    }

    /// Append a chunk descriptor.
    pub fn push(&mut self, chunk: Chunk) {
        self.chunks.push(chunk);
    }

    /// Sum of the recorded chunk sizes.
    pub fn chunk_bytes(&self) -> u64 {
        self.chunks.iter().map(|c| c.size as u64).sum()
    }

    /// Number of distinct chunk hashes.
    pub fn unique_chunks(&self) -> usize {
        self.chunks
            .iter()
            .map(|c| c.hash)
            .collect::<HashSet<_>>()
            .len()
    }

    /// Resolve the recorded algorithm name.
    pub fn algorithm(&self) -> Result<HashAlgorithm, CasError> {
        Ok(HashAlgorithm::from_name(&self.hash_algorithm)?)
    }

    /// Write the manifest to `path` as JSON.
    ///
    /// The document is written to a temporary file next to `path`, synced,
    /// then renamed over it, so a reader never observes a partial manifest.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CasError> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, self)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| CasError::Io(e.error))?;

        debug!(path = %path.display(), chunks = self.chunks.len(), "manifest saved");
        Ok(())
    }

    /// Read a manifest previously written by [`Manifest::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CasError> {
        let file = fs::File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Check every chunk against the bytes the loader returns.
    ///
    /// Stops at the first chunk that cannot be loaded or does not match its
    /// recorded hash and size.
    pub fn verify_file<L, D, E>(&self, loader: L) -> Result<(), CasError>
    where
        L: FnMut(&ChunkHash) -> Result<D, E>,
        D: AsRef<[u8]>,
        E: Into<LoadError>,
    {
        self.for_each_verified(loader, |_| Ok(()))
    }

    /// Verify each chunk and write its bytes to `sink` in order.
    ///
    /// Returns the number of bytes written. On failure, whatever was already
    /// written stays in the sink.
    pub fn reassemble<L, D, E, W>(&self, loader: L, sink: &mut W) -> Result<u64, CasError>
    where
        L: FnMut(&ChunkHash) -> Result<D, E>,
        D: AsRef<[u8]>,
        E: Into<LoadError>,
        W: Write + ?Sized,
    {
        let mut written = 0u64;
        self.for_each_verified(loader, |data| {
            sink.write_all(data).map_err(CasError::Write)?;
            written += data.len() as u64;
            Ok(())
        })?;
        Ok(written)
    }

    /// Reassemble into `dir/<file name>`, creating `dir` if needed.
    ///
    /// Only the final component of the recorded file name is used. Returns
    /// the path of the restored file. A failed restore leaves a partial file
    /// behind.
    pub fn restore_file<L, D, E>(&self, loader: L, dir: impl AsRef<Path>) -> Result<PathBuf, CasError>
    where
        L: FnMut(&ChunkHash) -> Result<D, E>,
        D: AsRef<[u8]>,
        E: Into<LoadError>,
    {
        let name = Path::new(&self.file_name)
            .file_name()
            .ok_or_else(|| CasError::InvalidFileName(self.file_name.clone()))?;

        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let target = dir.join(name);

        let mut out = BufWriter::new(fs::File::create(&target)?);
        let written = self.reassemble(loader, &mut out)?;
        out.flush().map_err(CasError::Write)?;

        debug!(path = %target.display(), bytes = written, "file restored");
        Ok(target)
    }

    fn for_each_verified<L, D, E, F>(&self, mut loader: L, mut visit: F) -> Result<(), CasError>
    where
        L: FnMut(&ChunkHash) -> Result<D, E>,
        D: AsRef<[u8]>,
        E: Into<LoadError>,
        F: FnMut(&[u8]) -> Result<(), CasError>,
    {
        let algorithm = self.algorithm()?;

        let covered = self.chunk_bytes();
        if covered != self.file_size {
            warn!(file = %self.file_name, expected = self.file_size, covered, "manifest size mismatch");
            return Err(CasError::FileSizeMismatch {
                expected: self.file_size,
                actual: covered,
            });
        }

        for (index, chunk) in self.chunks.iter().enumerate() {
            let data = loader(&chunk.hash).map_err(|e| CasError::Load {
                index,
                hash: chunk.hash,
                source: e.into(),
            })?;
            let data = data.as_ref();

            if let Err(mismatch) = chunk.verify(data, algorithm) {
                warn!(file = %self.file_name, index, hash = %chunk.hash, %mismatch, "chunk failed verification");
                return Err(match mismatch {
                    ChunkMismatch::Hash { actual, .. } => CasError::HashMismatch {
                        index,
                        hash: chunk.hash,
                        actual,
                    },
                    ChunkMismatch::Size { expected, actual } => CasError::SizeMismatch {
                        index,
                        hash: chunk.hash,
                        expected,
                        actual,
                    },
                });
            }

            visit(data)?;
        }
        Ok(())
    }
}
