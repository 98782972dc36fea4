//! Chunk indexing, deduplicating writers and content-addressed blob storage.
//!
//! This crate defines the [`ChunkIndex`] and [`ChunkStorage`] traits, along
//! with their implementations:
//!
//! - [`MemoryIndex`]: process-lifetime index behind a `RwLock<HashMap>`.
//! - [`JsonIndex`]: durable index persisted as one JSON document, rewritten
//!   atomically on every add.
//! - [`ChunkWriter`]: sink that writes each distinct chunk once.
//! - [`FileStorage`]: flat directory of blobs named by hex hash.
//! - [`MemoryStorage`]: in-memory blob map with the same index gating.

mod error;
mod file_store;
mod json_index;
mod memory_index;
mod memory_store;
mod traits;
mod writer;

pub use error::StoreError;
pub use file_store::FileStorage;
pub use json_index::JsonIndex;
pub use memory_index::MemoryIndex;
pub use memory_store::MemoryStorage;
pub use traits::{ChunkIndex, ChunkStorage, IntegrityReport};
pub use writer::{ChunkWriter, WriteOutcome};
