//! Error types for the kernel heap
//!
//! Every failure the heap can detect is returned to the immediate caller as a
//! value. The heap never panics on bad input and never logs on its own behalf.

use core::fmt;

/// What a corruption check found wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CorruptionKind {
    /// Pointer does not fall inside the heap's payload range
    OutOfRange,
    /// Pointer is not on an allocation boundary
    Misaligned,
    /// Pointer resolves to one of the two sentinel headers
    Sentinel,
    /// Header canary does not match its offset
    BadCanary,
    /// Header state tag is not a known value
    BadState,
    /// Chunk is already free
    DoubleFree,
    /// Address-chain or bin links do not point back at this chunk
    BrokenLinks,
    /// Free chunk sits in the wrong bin, or a used chunk sits in a bin
    Misplaced,
    /// Two address-consecutive chunks are both free
    AdjacentFree,
    /// Byte counters do not add up to the region size
    CounterMismatch,
}

impl CorruptionKind {
    /// Short lowercase description used in `Display`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OutOfRange => "pointer outside heap",
            Self::Misaligned => "misaligned pointer",
            Self::Sentinel => "sentinel chunk",
            Self::BadCanary => "header canary mismatch",
            Self::BadState => "unknown chunk state",
            Self::DoubleFree => "double free",
            Self::BrokenLinks => "broken chunk links",
            Self::Misplaced => "chunk in wrong bin",
            Self::AdjacentFree => "adjacent free chunks",
            Self::CounterMismatch => "byte counters out of balance",
        }
    }
}

/// Errors from heap operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HeapError {
    /// Region end lies below its start
    InvalidRegion {
        /// Requested start address
        start: usize,
        /// Requested end address (exclusive)
        end: usize,
    },

    /// Aligned region cannot host the two sentinels and one free chunk
    RegionTooSmall {
        /// Aligned region size in bytes
        size: usize,
        /// Minimum region size in bytes
        required: usize,
    },

    /// `init` was called on a heap that already manages a region
    AlreadyInitialized,

    /// Heap was used before `init`
    NotInitialized,

    /// No bin at or above the admission class holds a free chunk
    OutOfMemory {
        /// Requested payload size in bytes
        requested: usize,
    },

    /// Heap metadata failed validation
    Corruption {
        /// Address of the offending pointer or header
        address: usize,
        /// What was wrong with it
        kind: CorruptionKind,
    },
}

impl HeapError {
    /// Create a corruption error at `address`.
    pub fn corruption(address: usize, kind: CorruptionKind) -> Self {
        Self::Corruption { address, kind }
    }

    /// Returns true for errors raised while setting the heap up.
    ///
    /// These are fatal to the caller's startup sequence.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidRegion { .. } | Self::RegionTooSmall { .. } | Self::AlreadyInitialized
        )
    }
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRegion { start, end } => {
                write!(f, "invalid heap region {:#x}..{:#x}", start, end)
            }
            Self::RegionTooSmall { size, required } => {
                write!(
                    f,
                    "heap region too small: {} bytes (need {})",
                    size, required
                )
            }
            Self::AlreadyInitialized => write!(f, "heap already initialized"),
            Self::NotInitialized => write!(f, "heap not initialized"),
            Self::OutOfMemory { requested } => {
                write!(f, "out of memory allocating {} bytes", requested)
            }
            Self::Corruption { address, kind } => {
                write!(f, "heap corruption at {:#x}: {}", address, kind.as_str())
            }
        }
    }
}

/// Result type alias for heap operations
pub type HeapResult<T> = Result<T, HeapError>;
