//! Allocator core
//!
//! [`Heap`] owns one region and the bookkeeping around it: the free bins and
//! the byte counters. It does no locking; wrap it in a
//! [`LockedHeap`](crate::LockedHeap) to share it.

use core::ptr::NonNull;

use crate::bins::FreeBins;
use crate::chunk::{
    align_down, align_up, canary_for, Arena, ALIGNMENT, HEADER_SIZE, MIN_PAYLOAD, STATE_FREE,
    STATE_SENTINEL, STATE_USED,
};
use crate::class::admission_class;
use crate::config::HeapConfig;
use crate::error::{CorruptionKind, HeapError, HeapResult};
use crate::stats::HeapStats;

/// Smallest aligned region `Heap::new` accepts: two sentinels plus one chunk
pub const MIN_REGION_SIZE: usize = 3 * HEADER_SIZE + MIN_PAYLOAD;

/// Running byte and call counters
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Counters {
    pub(crate) free: usize,
    pub(crate) used: usize,
    pub(crate) meta: usize,
    pub(crate) allocations: u64,
    pub(crate) frees: u64,
    pub(crate) failed_allocations: u64,
}

impl Counters {
    const fn zero() -> Self {
        Self {
            free: 0,
            used: 0,
            meta: 0,
            allocations: 0,
            frees: 0,
            failed_allocations: 0,
        }
    }
}

/// A heap over one fixed region
pub struct Heap {
    /// `None` until the heap has been given a region
    arena: Option<Arena>,
    bins: FreeBins,
    counters: Counters,
    config: HeapConfig,
}

impl Heap {
    /// Create a heap without a region. Every allocation fails until `init`.
    pub const fn empty() -> Self {
        Self {
            arena: None,
            bins: FreeBins::new(),
            counters: Counters::zero(),
            config: HeapConfig::DEFAULT,
        }
    }

    /// Create a heap managing `start..end`.
    ///
    /// # Safety
    /// `start..end` must be valid, writable memory that nothing else uses for
    /// the lifetime of the heap.
    pub unsafe fn new(start: usize, end: usize, config: HeapConfig) -> HeapResult<Self> {
        let mut heap = Self::empty();
        heap.init_with_config(start, end, config)?;
        Ok(heap)
    }

    /// Give an empty heap its region, with default configuration.
    ///
    /// # Safety
    /// Same contract as [`Heap::new`].
    pub unsafe fn init(&mut self, start: usize, end: usize) -> HeapResult<()> {
        self.init_with_config(start, end, HeapConfig::DEFAULT)
    }

    /// Give an empty heap its region.
    ///
    /// Lays out the head sentinel, one free chunk spanning the rest, and the
    /// tail sentinel.
    ///
    /// # Safety
    /// Same contract as [`Heap::new`].
    pub unsafe fn init_with_config(
        &mut self,
        start: usize,
        end: usize,
        config: HeapConfig,
    ) -> HeapResult<()> {
        if self.arena.is_some() {
            return Err(HeapError::AlreadyInitialized);
        }
        if end < start {
            return Err(HeapError::InvalidRegion { start, end });
        }

        let base = align_up(start).ok_or(HeapError::InvalidRegion { start, end })?;
        let limit = align_down(end);
        let size = limit.saturating_sub(base);
        if size < MIN_REGION_SIZE {
            return Err(HeapError::RegionTooSmall {
                size,
                required: MIN_REGION_SIZE,
            });
        }

        // SAFETY: caller guarantees the region; base is aligned.
        let arena = unsafe { Arena::new(base, size) };
        let tail = arena.tail();
        let first = HEADER_SIZE;

        arena.write_header(0, tail, first, STATE_SENTINEL);
        arena.write_header(first, 0, tail, STATE_FREE);
        arena.write_header(tail, first, 0, STATE_SENTINEL);

        self.bins = FreeBins::new();
        self.bins.insert(&arena, first);
        self.counters = Counters {
            free: arena.size_of(first),
            meta: HEADER_SIZE,
            ..Counters::zero()
        };
        self.config = config;
        self.arena = Some(arena);
        Ok(())
    }

    /// Returns true once the heap manages a region.
    pub fn is_initialized(&self) -> bool {
        self.arena.is_some()
    }

    /// Configuration the heap was set up with
    pub fn config(&self) -> HeapConfig {
        self.config
    }

    /// Aligned region as `(start, end)`, if initialized
    pub fn region(&self) -> Option<(usize, usize)> {
        self.arena.map(|a| (a.base(), a.base() + a.len()))
    }

    /// Allocate `size` bytes.
    ///
    /// Scans the bins from the request's admission class upward and takes the
    /// newest chunk of the first non-empty one, splitting off the tail when it
    /// is more than a header larger than needed. Bins below the admission class
    /// are never consulted.
    pub fn allocate(&mut self, size: usize) -> HeapResult<NonNull<u8>> {
        let arena = self.arena.ok_or(HeapError::NotInitialized)?;
        match self.take_chunk(&arena, size) {
            Some(offset) => {
                self.counters.allocations += 1;
                let payload = arena.payload(offset);
                if let Some(byte) = self.config.fill_on_alloc {
                    // SAFETY: the payload is at least `size` bytes and owned by us.
                    unsafe { core::ptr::write_bytes(payload as *mut u8, byte, size) };
                }
                // SAFETY: payload addresses lie inside a non-null region.
                Ok(unsafe { NonNull::new_unchecked(payload as *mut u8) })
            }
            None => {
                self.counters.failed_allocations += 1;
                Err(HeapError::OutOfMemory { requested: size })
            }
        }
    }

    /// Allocate `size` zeroed bytes.
    pub fn allocate_zeroed(&mut self, size: usize) -> HeapResult<NonNull<u8>> {
        let ptr = self.allocate(size)?;
        // SAFETY: fresh allocation of at least `size` bytes.
        unsafe { core::ptr::write_bytes(ptr.as_ptr(), 0, size) };
        Ok(ptr)
    }

    /// Pops, splits and marks a chunk; returns its header offset.
    fn take_chunk(&mut self, arena: &Arena, size: usize) -> Option<usize> {
        let need = align_up(size)?.max(MIN_PAYLOAD);
        let class = admission_class(need)?;
        let class = self.bins.first_occupied(class)?;
        let offset = self.bins.pop(arena, class)?;

        let capacity = arena.size_of(offset);
        self.counters.free -= capacity;
        if capacity - need > HEADER_SIZE {
            let rest = offset + HEADER_SIZE + need;
            arena.link_after(offset, rest, STATE_FREE);
            self.bins.insert(arena, rest);
            self.counters.free += arena.size_of(rest);
            self.counters.meta += HEADER_SIZE;
        }

        arena.set_state(offset, STATE_USED);
        self.counters.used += arena.size_of(offset);
        Some(offset)
    }

    /// Return an allocation to the heap.
    ///
    /// Merges with a free successor, then with a free predecessor, so no two
    /// address-adjacent chunks are ever both free afterwards.
    ///
    /// # Safety
    /// `ptr` must come from `allocate` on this heap and not have been freed.
    /// With `validate_frees` enabled most violations are reported as
    /// [`HeapError::Corruption`] instead, but overwritten payload bytes of a
    /// neighbouring chunk can still go unnoticed.
    pub unsafe fn free(&mut self, ptr: NonNull<u8>) -> HeapResult<()> {
        let arena = self.arena.ok_or(HeapError::NotInitialized)?;
        let offset = if self.config.validate_frees {
            self.validate_used(&arena, ptr.as_ptr() as usize)?
        } else {
            ptr.as_ptr() as usize - arena.base() - HEADER_SIZE
        };

        self.counters.used -= arena.size_of(offset);
        self.counters.frees += 1;

        let next = arena.next(offset);
        if arena.is_free(next) {
            self.bins.remove(&arena, next);
            self.counters.free -= arena.size_of(next);
            arena.unlink(next);
            self.counters.meta -= HEADER_SIZE;
        }

        let prev = arena.prev(offset);
        if arena.is_free(prev) {
            self.bins.remove(&arena, prev);
            self.counters.free -= arena.size_of(prev);
            // Stale header keeps a FREE tag; a repeated free reports DoubleFree
            arena.set_state(offset, STATE_FREE);
            arena.unlink(offset);
            self.counters.meta -= HEADER_SIZE;
            self.bins.insert(&arena, prev);
            self.counters.free += arena.size_of(prev);
        } else {
            arena.set_state(offset, STATE_FREE);
            self.bins.insert(&arena, offset);
            self.counters.free += arena.size_of(offset);
        }
        Ok(())
    }

    /// Payload capacity of a live allocation.
    ///
    /// Always at least the size originally requested.
    pub fn usable_size(&self, ptr: NonNull<u8>) -> HeapResult<usize> {
        let arena = self.arena.ok_or(HeapError::NotInitialized)?;
        let offset = self.validate_used(&arena, ptr.as_ptr() as usize)?;
        Ok(arena.size_of(offset))
    }

    /// Resolves `addr` to the header of a used chunk, or reports why not.
    fn validate_used(&self, arena: &Arena, addr: usize) -> HeapResult<usize> {
        let corrupt = |kind| HeapError::corruption(addr, kind);

        if addr % ALIGNMENT != 0 {
            return Err(corrupt(CorruptionKind::Misaligned));
        }
        let offset = arena
            .offset_of_payload(addr)
            .ok_or(corrupt(CorruptionKind::OutOfRange))?;
        if offset == 0 || offset >= arena.tail() {
            return Err(corrupt(CorruptionKind::Sentinel));
        }
        if arena.canary(offset) != canary_for(offset) {
            return Err(corrupt(CorruptionKind::BadCanary));
        }
        match arena.state(offset) {
            STATE_USED => {}
            STATE_FREE => return Err(corrupt(CorruptionKind::DoubleFree)),
            _ => return Err(corrupt(CorruptionKind::BadState)),
        }

        let prev = arena.prev(offset);
        let next = arena.next(offset);
        let linked = prev % ALIGNMENT == 0
            && next % ALIGNMENT == 0
            && prev < offset
            && next > offset
            && next <= arena.tail()
            && arena.next(prev) == offset
            && arena.prev(next) == offset;
        if !linked {
            return Err(corrupt(CorruptionKind::BrokenLinks));
        }
        Ok(offset)
    }

    /// Snapshot of the byte totals and call counters.
    pub fn stats(&self) -> HeapStats {
        let region_size = self.arena.map_or(0, |a| a.len());
        let sentinel_bytes = if self.arena.is_some() {
            2 * HEADER_SIZE
        } else {
            0
        };
        let largest_free = self.arena.map_or(0, |a| self.bins.largest(&a));
        HeapStats {
            region_size,
            free_bytes: self.counters.free,
            used_bytes: self.counters.used,
            meta_bytes: self.counters.meta,
            sentinel_bytes,
            allocations: self.counters.allocations,
            frees: self.counters.frees,
            failed_allocations: self.counters.failed_allocations,
            free_chunks: self.bins.len(),
            largest_free,
        }
    }

    pub(crate) fn arena(&self) -> Option<&Arena> {
        self.arena.as_ref()
    }

    pub(crate) fn bins(&self) -> &FreeBins {
        &self.bins
    }

    pub(crate) fn counters(&self) -> &Counters {
        &self.counters
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::empty()
    }
}

impl core::fmt::Debug for Heap {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Heap")
            .field("region", &self.region())
            .field("counters", &self.counters)
            .field("config", &self.config)
            .finish()
    }
}
