//! Chunking parameters.

use std::sync::Arc;

use crate::error::CasError;
use crate::gear::GearTable;

/// Size bounds and gear table for content-defined chunking.
///
/// `mask` is derived from `avg_size`: the smallest power of two at or above
/// the average, minus one. A cut past the average fires when
/// `hash & mask == 0`, i.e. with probability `1 / (mask + 1)` per byte.
///
/// Sanity of the bounds (`min <= avg <= max`) is not enforced here; call
/// [`Params::validate`] at the configuration boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Params {
    /// No cut is considered before this many bytes.
    pub min_size: usize,
    /// Content-defined cuts are only accepted at or past this size.
    pub avg_size: usize,
    /// A cut is forced at this size.
    pub max_size: usize,
    /// Boundary mask derived from `avg_size`.
    pub mask: u64,
    gear: Option<Arc<GearTable>>,
}

impl Params {
    /// Create parameters, deriving the mask from `avg_size`.
    ///
    /// `gear` of `None` selects the default table.
    pub fn new(
        min_size: usize,
        avg_size: usize,
        max_size: usize,
        gear: Option<Arc<GearTable>>,
    ) -> Self {
        Self {
            min_size,
            avg_size,
            max_size,
            mask: mask_for(avg_size),
            gear,
        }
    }

    /// Replace the gear table.
    pub fn with_gear(mut self, gear: Arc<GearTable>) -> Self {
        self.gear = Some(gear);
        self
    }

    /// Use a table derived from `seed`.
    pub fn with_seed(self, seed: u64) -> Self {
        self.with_gear(Arc::new(GearTable::from_seed(seed)))
    }

    /// The table in effect: the custom one if supplied, else the default.
    pub fn gear(&self) -> &GearTable {
        match &self.gear {
            Some(table) => table,
            None => GearTable::default_table(),
        }
    }

    /// True when a custom table was supplied.
    pub fn has_custom_gear(&self) -> bool {
        self.gear.is_some()
    }

    /// Check the size bounds.
    ///
    /// Requires non-zero sizes with `min <= avg <= max`, and, when a
    /// reader buffer capacity is given, `max <= capacity`.
    pub fn validate(&self, buffer_capacity: Option<usize>) -> Result<(), CasError> {
        if self.min_size == 0 || self.avg_size == 0 || self.max_size == 0 {
            return Err(CasError::Config(format!(
                "chunk sizes must be positive (min={}, avg={}, max={})",
                self.min_size, self.avg_size, self.max_size
            )));
        }
        if self.min_size > self.avg_size || self.avg_size > self.max_size {
            return Err(CasError::Config(format!(
                "chunk sizes must satisfy min <= avg <= max (min={}, avg={}, max={})",
                self.min_size, self.avg_size, self.max_size
            )));
        }
        if let Some(capacity) = buffer_capacity
            && capacity < self.max_size
        {
            return Err(CasError::Config(format!(
                "buffer size {capacity} is smaller than max chunk size {}",
                self.max_size
            )));
        }
        Ok(())
    }
}

/// Smallest power of two `>= avg`, minus one.
fn mask_for(avg: usize) -> u64 {
    (avg as u64).next_power_of_two() - 1
}
