//! Streaming chunker over any [`std::io::Read`] source.

use std::io::{self, Read};

use tessera_types::{Chunk, HashAlgorithm};
use tracing::trace;

use crate::cdc_chunker::Chunker;
use crate::error::CasError;

/// Applies a [`Chunker`] to a byte stream, yielding one chunk per call.
///
/// The reader owns a single buffer of `buffer_size` bytes. Each call tops the
/// buffer up until it is full or the source is exhausted, so boundaries do
/// not depend on how the source fragments its reads. A buffer smaller than
/// `max_size` caps chunk sizes at its capacity.
///
/// While the source still delivers bytes, chunks are cut by the
/// [`Chunker`] rules and match [`Chunker::split`] over the same prefix.
/// Once a call finds the source exhausted without reading anything new,
/// everything still buffered is emitted as one final chunk, which is
/// always shorter than the buffer.
///
/// A reader is single-consumer: `next_chunk` takes `&mut self` and the
/// returned bytes borrow the internal buffer until the next call.
pub struct ChunkReader<R> {
    source: R,
    algorithm: HashAlgorithm,
    chunker: Chunker,
    buf: Vec<u8>,
    /// Valid bytes at the front of `buf`.
    filled: usize,
    /// Bytes at the front of `buf` handed out by the previous call.
    consumed: usize,
    /// Absolute stream offset of `buf[0]`.
    offset: u64,
    eof: bool,
    /// Read error hit after bytes were obtained; reported on the next call.
    deferred: Option<io::Error>,
}

impl<R: Read> ChunkReader<R> {
    /// Create a reader hashing chunks with the named algorithm.
    ///
    /// Fails on an unknown algorithm name or a zero `buffer_size`.
    pub fn new(
        source: R,
        algorithm: &str,
        buffer_size: usize,
        chunker: Chunker,
    ) -> Result<Self, CasError> {
        let algorithm = HashAlgorithm::from_name(algorithm)?;
        Self::with_algorithm(source, algorithm, buffer_size, chunker)
    }

    /// Create a reader with an already-resolved algorithm.
    pub fn with_algorithm(
        source: R,
        algorithm: HashAlgorithm,
        buffer_size: usize,
        chunker: Chunker,
    ) -> Result<Self, CasError> {
        if buffer_size == 0 {
            return Err(CasError::Config("buffer size must be positive".into()));
        }

        Ok(Self {
            source,
            algorithm,
            chunker,
            buf: vec![0u8; buffer_size],
            filled: 0,
            consumed: 0,
            offset: 0,
            eof: false,
            deferred: None,
        })
    }

    /// Produce the next chunk and its bytes, or `None` at end of stream.
    ///
    /// A read error with no bytes obtained in this call is returned as
    /// [`CasError::Read`]; the stream should be considered failed.
    pub fn next_chunk(&mut self) -> Result<Option<(Chunk, &[u8])>, CasError> {
        self.compact();
        let obtained = self.fill()?;

        if self.filled == 0 {
            return Ok(None);
        }

        let cut = if obtained == 0 && self.eof {
            // Exhausted source: the leftover goes out whole.
            self.filled
        } else {
            self.chunker.next_boundary(&self.buf[..self.filled])
        };
        let data = &self.buf[..cut];
        let chunk = Chunk::from_data(self.offset, data, self.algorithm);
        trace!(offset = chunk.offset, size = cut, hash = %chunk.hash, "chunk");

        self.consumed = cut;
        Ok(Some((chunk, data)))
    }

    /// Absolute offset of the next chunk to be produced.
    pub fn offset(&self) -> u64 {
        self.offset + self.consumed as u64
    }

    /// Algorithm used to hash chunks.
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// The boundary finder in use.
    pub fn chunker(&self) -> &Chunker {
        &self.chunker
    }

    /// Buffer capacity in bytes.
    pub fn buffer_size(&self) -> usize {
        self.buf.len()
    }

    /// Recover the source. Buffered, unconsumed bytes are lost.
    pub fn into_inner(self) -> R {
        self.source
    }

    /// Move the bytes left over from the previous call to the buffer start.
    fn compact(&mut self) {
        if self.consumed == 0 {
            return;
        }
        self.buf.copy_within(self.consumed..self.filled, 0);
        self.filled -= self.consumed;
        self.offset += self.consumed as u64;
        self.consumed = 0;
    }

    /// Read until the buffer is full or the source reports end of stream.
    ///
    /// Returns the number of bytes obtained by this call.
    fn fill(&mut self) -> Result<usize, CasError> {
        if let Some(err) = self.deferred.take() {
            return Err(CasError::Read(err));
        }

        let mut obtained = 0;
        while self.filled < self.buf.len() && !self.eof {
            match self.source.read(&mut self.buf[self.filled..]) {
                Ok(0) => self.eof = true,
                Ok(n) => {
                    self.filled += n;
                    obtained += n;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if obtained == 0 => return Err(CasError::Read(e)),
                Err(e) => {
                    self.deferred = Some(e);
                    break;
                }
            }
        }
        Ok(obtained)
    }
}
