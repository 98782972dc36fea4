//! TOML configuration for chunking.
//!
//! Every field is optional; effective values fall back to the defaults
//! below. Validation happens here, once, rather than in the chunking loop.
//!
//! ```toml
//! min_size = 16384
//! avg_size = 65536
//! max_size = 262144
//! buffer_size = 262144
//! hash_algorithm = "sha256"
//! gear_seed = 42
//! ```

use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tessera_types::HashAlgorithm;

use crate::cdc_chunker::Chunker;
use crate::error::CasError;
use crate::params::Params;
use crate::reader::ChunkReader;

/// Default minimum chunk size (16 KiB).
pub const DEFAULT_MIN_SIZE: usize = 16 * 1024;

/// Default average chunk size (64 KiB).
pub const DEFAULT_AVG_SIZE: usize = 64 * 1024;

/// Default maximum chunk size (256 KiB).
pub const DEFAULT_MAX_SIZE: usize = 256 * 1024;

/// Chunking configuration, parsed from TOML.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChunkingConfig {
    /// Minimum chunk size in bytes.
    pub min_size: Option<usize>,
    /// Average (target) chunk size in bytes.
    pub avg_size: Option<usize>,
    /// Maximum chunk size in bytes.
    pub max_size: Option<usize>,
    /// Stream reader buffer in bytes. Defaults to the maximum chunk size.
    pub buffer_size: Option<usize>,
    /// Chunk hash algorithm name: `"sha256"` (default), `"sha1"` or `"blake3"`.
    pub hash_algorithm: Option<String>,
    /// Seed for a deployment-specific gear table. The default table is used
    /// when absent.
    pub gear_seed: Option<u64>,
}

impl ChunkingConfig {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self, CasError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(s: &str) -> Result<Self, CasError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Effective minimum chunk size.
    pub fn min_size(&self) -> usize {
        self.min_size.unwrap_or(DEFAULT_MIN_SIZE)
    }

    /// Effective average chunk size.
    pub fn avg_size(&self) -> usize {
        self.avg_size.unwrap_or(DEFAULT_AVG_SIZE)
    }

    /// Effective maximum chunk size.
    pub fn max_size(&self) -> usize {
        self.max_size.unwrap_or(DEFAULT_MAX_SIZE)
    }

    /// Effective reader buffer size.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size.unwrap_or_else(|| self.max_size())
    }

    /// Effective hash algorithm name.
    pub fn hash_algorithm(&self) -> &str {
        self.hash_algorithm.as_deref().unwrap_or("sha256")
    }

    /// Resolve the configured hash algorithm.
    pub fn algorithm(&self) -> Result<HashAlgorithm, CasError> {
        Ok(HashAlgorithm::from_name(self.hash_algorithm())?)
    }

    /// Chunking parameters described by this config.
    pub fn params(&self) -> Params {
        let params = Params::new(self.min_size(), self.avg_size(), self.max_size(), None);
        match self.gear_seed {
            Some(seed) => params.with_seed(seed),
            None => params,
        }
    }

    /// Check sizes, buffer capacity and algorithm name.
    pub fn validate(&self) -> Result<(), CasError> {
        self.params().validate(Some(self.buffer_size()))?;
        self.algorithm()?;
        Ok(())
    }

    /// Boundary finder for this config.
    pub fn chunker(&self) -> Chunker {
        Chunker::new(self.params())
    }

    /// Build a validated stream reader over `source`.
    pub fn reader<R: Read>(&self, source: R) -> Result<ChunkReader<R>, CasError> {
        self.validate()?;
        ChunkReader::with_algorithm(source, self.algorithm()?, self.buffer_size(), self.chunker())
    }
}
