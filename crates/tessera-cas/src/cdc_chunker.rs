//! Content-defined boundary detection using a gear rolling hash.
//!
//! For each byte the accumulator is shifted left by one and the byte's gear
//! value is added (wrapping). Boundaries are only considered once the
//! candidate chunk reaches `min_size`; past `avg_size` a cut is declared
//! where the low bits of the accumulator selected by the mask are all zero,
//! and a cut is forced at `max_size`.
//!
//! **Parameters and gear table must stay fixed for a deployment**, otherwise
//! the same data produces different boundaries and deduplication breaks.

use crate::params::Params;

/// Stateless boundary finder over a [`Params`] set.
#[derive(Debug, Clone)]
pub struct Chunker {
    params: Params,
}

impl Chunker {
    /// Create a chunker for the given parameters.
    pub fn new(params: Params) -> Self {
        Self { params }
    }

    /// The parameters this chunker cuts with.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Length of the next chunk at the start of `buf`.
    ///
    /// Returns `buf.len()` when no rule fires before the buffer runs out,
    /// including when `buf` is shorter than `min_size`. The result is in
    /// `1..=buf.len()` for a non-empty buffer and `0` for an empty one.
    pub fn next_boundary(&self, buf: &[u8]) -> usize {
        let p = &self.params;
        let table = p.gear();
        let mut hash: u64 = 0;

        for (i, &byte) in buf.iter().enumerate() {
            let size = i + 1;
            hash = (hash << 1).wrapping_add(table.get(byte));

            if size < p.min_size {
                continue;
            }
            if size >= p.avg_size && hash & p.mask == 0 {
                return size;
            }
            if size >= p.max_size {
                return size;
            }
        }

        buf.len()
    }

    /// Iterate the content-defined chunks of an in-memory buffer.
    ///
    /// Yields contiguous slices covering all of `data`.
    pub fn split<'a>(&'a self, data: &'a [u8]) -> Split<'a> {
        Split {
            chunker: self,
            remaining: data,
        }
    }
}

/// Iterator returned by [`Chunker::split`].
pub struct Split<'a> {
    chunker: &'a Chunker,
    remaining: &'a [u8],
}

impl<'a> Iterator for Split<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining.is_empty() {
            return None;
        }
        let cut = self.chunker.next_boundary(self.remaining);
        let (head, tail) = self.remaining.split_at(cut);
        self.remaining = tail;
        Some(head)
    }
}
