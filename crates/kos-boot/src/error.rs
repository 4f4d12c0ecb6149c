//! Boot error types

use core::fmt;

use kos_heap::HeapError;

/// Errors raised while bringing up the kernel heap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootError {
    /// The memory map holds no usable region large enough for a heap
    NoUsableRegion,
    /// The heap rejected the selected region
    Heap(HeapError),
}

impl fmt::Display for BootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootError::NoUsableRegion => write!(f, "No usable memory region for the kernel heap"),
            BootError::Heap(e) => write!(f, "Heap setup failed: {}", e),
        }
    }
}

impl From<HeapError> for BootError {
    fn from(e: HeapError) -> Self {
        BootError::Heap(e)
    }
}

/// Result type for boot operations
pub type BootResult<T> = Result<T, BootError>;
