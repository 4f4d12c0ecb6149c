//! Heap region discovery
//!
//! The bootloader reports physical memory as a list of regions. The kernel
//! heap takes the largest usable one, skipping low memory, and addresses it
//! through the physical memory mapping.

use bootloader_api::info::{MemoryRegion, MemoryRegionKind};
use kos_heap::MIN_REGION_SIZE;

use crate::error::{BootError, BootResult};
use crate::LOW_MEMORY_LIMIT;

/// Virtual address range handed to the heap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapRegion {
    /// First byte (inclusive)
    pub start: usize,
    /// One past the last byte
    pub end: usize,
}

impl HeapRegion {
    /// Region size in bytes
    pub fn size(&self) -> usize {
        self.end - self.start
    }
}

/// Physical span of `region` that the heap may use, or `None` if the region
/// is not usable RAM or lies entirely below [`LOW_MEMORY_LIMIT`].
pub fn usable_span(region: &MemoryRegion) -> Option<(u64, u64)> {
    if region.kind != MemoryRegionKind::Usable {
        return None;
    }
    // Skip very low memory (< 1MB) to avoid BIOS/bootloader areas
    let start = region.start.max(LOW_MEMORY_LIMIT);
    if region.end <= start {
        return None;
    }
    Some((start, region.end))
}

/// Choose the heap region from the bootloader memory map.
///
/// Picks the largest usable span (the first one on ties), caps it at
/// `max_size` bytes and translates it by `phys_offset` into the virtual
/// mapping of physical memory. Spans too small to host a heap, or that do
/// not fit the address space once translated, are ignored.
pub fn select_heap_region(
    regions: &[MemoryRegion],
    phys_offset: u64,
    max_size: u64,
) -> BootResult<HeapRegion> {
    let mut best: Option<(u64, u64)> = None;

    for (start, end) in regions.iter().filter_map(usable_span) {
        let size = end - start;
        if size < MIN_REGION_SIZE as u64 {
            continue;
        }
        if best.map_or(true, |(s, e)| size > e - s) {
            best = Some((start, end));
        }
    }

    let (start, end) = best.ok_or(BootError::NoUsableRegion)?;
    let end = start + (end - start).min(max_size);

    let region = translate(start, end, phys_offset).ok_or(BootError::NoUsableRegion)?;
    tracing::debug!(
        phys_start = start,
        phys_end = end,
        start = region.start,
        size = region.size(),
        "selected heap region"
    );
    Ok(region)
}

/// Physical `start..end` as a virtual range at `phys_offset`
fn translate(start: u64, end: u64, phys_offset: u64) -> Option<HeapRegion> {
    let start = usize::try_from(start.checked_add(phys_offset)?).ok()?;
    let end = usize::try_from(end.checked_add(phys_offset)?).ok()?;
    Some(HeapRegion { start, end })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    fn region(start: u64, end: u64, kind: MemoryRegionKind) -> MemoryRegion {
        MemoryRegion { start, end, kind }
    }

    fn usable(start: u64, end: u64) -> MemoryRegion {
        region(start, end, MemoryRegionKind::Usable)
    }

    #[test]
    fn test_picks_largest_usable_region() {
        let map = [
            usable(0x10_0000, 0x20_0000),
            region(0x20_0000, 0x100_0000, MemoryRegionKind::Bootloader),
            usable(0x100_0000, 0x400_0000),
            usable(0x400_0000, 0x500_0000),
        ];
        let heap = select_heap_region(&map, 0, u64::MAX).unwrap();
        assert_eq!(heap, HeapRegion { start: 0x100_0000, end: 0x400_0000 });
    }

    #[test]
    fn test_first_region_wins_ties() {
        let map = [usable(2 * MIB, 3 * MIB), usable(5 * MIB, 6 * MIB)];
        let heap = select_heap_region(&map, 0, u64::MAX).unwrap();
        assert_eq!(heap.start, 2 * MIB as usize);
    }

    #[test]
    fn test_skips_low_memory() {
        let map = [usable(0x1000, 0x9_F000), usable(0x8_0000, 0x18_0000)];
        let heap = select_heap_region(&map, 0, u64::MAX).unwrap();
        assert_eq!(heap, HeapRegion { start: 0x10_0000, end: 0x18_0000 });
    }

    #[test]
    fn test_ignores_reserved_regions() {
        let map = [
            region(2 * MIB, 64 * MIB, MemoryRegionKind::UnknownBios(2)),
            region(64 * MIB, 128 * MIB, MemoryRegionKind::UnknownUefi(0)),
        ];
        assert_eq!(
            select_heap_region(&map, 0, u64::MAX),
            Err(BootError::NoUsableRegion)
        );
    }

    #[test]
    fn test_ignores_regions_too_small_for_a_heap() {
        let tiny = usable(2 * MIB, 2 * MIB + 16);
        assert_eq!(
            select_heap_region(&[tiny], 0, u64::MAX),
            Err(BootError::NoUsableRegion)
        );
    }

    #[test]
    fn test_clamps_to_max_size() {
        let map = [usable(16 * MIB, 512 * MIB)];
        let heap = select_heap_region(&map, 0, 8 * MIB).unwrap();
        assert_eq!(heap.start, 16 * MIB as usize);
        assert_eq!(heap.size(), 8 * MIB as usize);
    }

    #[test]
    fn test_applies_physical_memory_offset() {
        let offset = 0x1000_0000_0000;
        let map = [usable(2 * MIB, 4 * MIB)];
        let heap = select_heap_region(&map, offset, u64::MAX).unwrap();
        assert_eq!(heap.start as u64, offset + 2 * MIB);
        assert_eq!(heap.end as u64, offset + 4 * MIB);
    }

    #[test]
    fn test_empty_map() {
        assert_eq!(
            select_heap_region(&[], 0, u64::MAX),
            Err(BootError::NoUsableRegion)
        );
    }

    #[test]
    fn test_usable_span() {
        assert_eq!(usable_span(&usable(0, 0x10_0000)), None);
        assert_eq!(usable_span(&usable(0, 0x20_0000)), Some((0x10_0000, 0x20_0000)));
        assert_eq!(
            usable_span(&region(0x20_0000, 0x30_0000, MemoryRegionKind::Bootloader)),
            None
        );
    }
}
