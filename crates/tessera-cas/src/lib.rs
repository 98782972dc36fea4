//! Content-defined chunking and file manifests.
//!
//! This crate provides:
//! - [`GearTable`] and [`Params`]: the rolling-hash table and size bounds.
//! - [`Chunker`]: finds the next content-defined boundary in a buffer.
//! - [`ChunkReader`]: applies a chunker to any [`std::io::Read`] source,
//!   yielding chunk descriptors and their bytes.
//! - [`Manifest`]: the ordered chunk ledger of one file, with verification
//!   and reassembly through a caller-supplied loader.
//! - [`ChunkingConfig`]: TOML configuration with validated defaults.
//!
//! Storage of chunk bytes lives in `tessera-store`.

mod cdc_chunker;
mod config;
mod error;
mod gear;
mod manifest;
mod params;
mod reader;

pub use cdc_chunker::{Chunker, Split};
pub use config::{ChunkingConfig, DEFAULT_AVG_SIZE, DEFAULT_MAX_SIZE, DEFAULT_MIN_SIZE};
pub use error::{CasError, LoadError};
pub use gear::GearTable;
pub use manifest::Manifest;
pub use params::Params;
pub use reader::ChunkReader;
pub use tessera_types::{Chunk, ChunkHash, HashAlgorithm};
