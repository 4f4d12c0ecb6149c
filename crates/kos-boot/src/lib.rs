//! KOS Boot Crate
//!
//! Early initialization glue between the bootloader and the kernel heap.
//!
//! # Boot Process
//!
//! 1. **Bootloader**: hands over the physical memory map and the virtual
//!    offset at which all physical memory is mapped.
//!
//! 2. **Heap bring-up** ([`allocator::init`]):
//!    - Picks the largest usable region above 1 MiB ([`memory::select_heap_region`])
//!    - Clamps it to [`HEAP_MAX_SIZE`]
//!    - Hands the range to the global [`kos_heap::LockedHeap`]
//!
//! 3. **Status**: the kernel's status command renders the heap counters
//!    through [`status::write_heap_status`].
//!
//! The global allocator is only installed when building for bare metal
//! (`target_os = "none"`); hosted builds (tests) keep the system allocator.

#![no_std]

#[cfg(test)]
extern crate std;

pub mod allocator;
pub mod error;
pub mod memory;
pub mod status;

pub use error::{BootError, BootResult};
pub use memory::{select_heap_region, HeapRegion};

/// Kernel version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Kernel name
pub const NAME: &str = "KOS";

/// Largest heap the kernel will manage (64 MiB)
pub const HEAP_MAX_SIZE: u64 = 64 * 1024 * 1024;

/// Memory below this address belongs to the BIOS and the bootloader
pub const LOW_MEMORY_LIMIT: u64 = 0x10_0000;
