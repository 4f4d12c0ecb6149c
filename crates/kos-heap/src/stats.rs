//! Heap statistics for status reports

use core::fmt;

/// Point-in-time view of heap usage.
///
/// `free_bytes + used_bytes + meta_bytes + sentinel_bytes == region_size`
/// holds for every snapshot of a consistent heap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HeapStats {
    /// Aligned size of the managed region
    pub region_size: usize,
    /// Payload bytes in free chunks
    pub free_bytes: usize,
    /// Payload bytes in used chunks
    pub used_bytes: usize,
    /// Header bytes of all non-sentinel chunks
    pub meta_bytes: usize,
    /// Header bytes of the two sentinels
    pub sentinel_bytes: usize,
    /// Successful allocations since setup
    pub allocations: u64,
    /// Frees since setup
    pub frees: u64,
    /// Allocations that failed with out-of-memory
    pub failed_allocations: u64,
    /// Number of free chunks
    pub free_chunks: usize,
    /// Payload size of the largest free chunk
    pub largest_free: usize,
}

impl HeapStats {
    /// Returns true when the byte totals add up to the region size.
    pub fn is_balanced(&self) -> bool {
        self.free_bytes + self.used_bytes + self.meta_bytes + self.sentinel_bytes
            == self.region_size
    }

    /// Allocations not yet freed
    pub fn live_allocations(&self) -> u64 {
        self.allocations.saturating_sub(self.frees)
    }
}

impl fmt::Display for HeapStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "heap: {} bytes, used {}, free {} in {} chunks (largest {}), meta {}",
            self.region_size,
            self.used_bytes,
            self.free_bytes,
            self.free_chunks,
            self.largest_free,
            self.meta_bytes + self.sentinel_bytes,
        )
    }
}
