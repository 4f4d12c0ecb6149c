//! Kernel heap allocator
//!
//! Owns the kernel's [`LockedHeap`]. On bare metal it is registered as the
//! global allocator; [`init`] must run before the first allocation.

use bootloader_api::info::MemoryRegion;
use kos_heap::{HeapStats, LockedHeap};
use spin::Once;

use crate::error::BootResult;
use crate::memory::{select_heap_region, HeapRegion};
use crate::HEAP_MAX_SIZE;

/// Global kernel heap
#[cfg_attr(target_os = "none", global_allocator)]
pub static KERNEL_HEAP: LockedHeap = LockedHeap::empty();

/// Region the kernel heap was given
static HEAP_REGION: Once<HeapRegion> = Once::new();

/// Initialize the kernel heap from the bootloader memory map.
///
/// # Safety
/// `regions` must describe physical memory accurately and all of it must be
/// mapped at `phys_offset`. The chosen region must not be used by anything
/// else for the rest of the kernel's life.
pub unsafe fn init(regions: &[MemoryRegion], phys_offset: u64) -> BootResult<HeapRegion> {
    let region = select_heap_region(regions, phys_offset, HEAP_MAX_SIZE)?;
    // SAFETY: forwarded caller contract.
    unsafe { init_heap(&KERNEL_HEAP, region)? };
    HEAP_REGION.call_once(|| region);
    Ok(region)
}

/// Hand `region` to `heap` and log the result.
///
/// # Safety
/// `region` must be writable memory owned exclusively by `heap`.
pub unsafe fn init_heap(heap: &LockedHeap, region: HeapRegion) -> BootResult<()> {
    // SAFETY: forwarded caller contract.
    unsafe { heap.init(region.start, region.end)? };
    let stats = heap.stats();
    tracing::info!(
        start = region.start,
        size = stats.region_size,
        free = stats.free_bytes,
        "kernel heap ready"
    );
    Ok(())
}

/// Region the kernel heap manages, once initialized
pub fn heap_region() -> Option<HeapRegion> {
    HEAP_REGION.get().copied()
}

/// Current kernel heap statistics
pub fn heap_stats() -> HeapStats {
    KERNEL_HEAP.stats()
}
