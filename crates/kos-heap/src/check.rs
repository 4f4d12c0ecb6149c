//! Chunk walk and consistency check
//!
//! Used by status commands to dump the heap layout, and by tests to assert
//! the structural invariants after every operation.

use crate::chunk::{
    canary_for, Arena, ALIGNMENT, HEADER_SIZE, STATE_FREE, STATE_SENTINEL, STATE_USED,
};
use crate::class::{class_of, class_range, BIN_COUNT};
use crate::error::{CorruptionKind, HeapError, HeapResult};
use crate::heap::Heap;

/// State of a chunk as seen by the walker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    Used,
    Free,
    Sentinel,
    /// Header carries an unknown state tag
    Invalid,
}

impl ChunkState {
    fn from_tag(tag: u32) -> Self {
        match tag {
            STATE_USED => Self::Used,
            STATE_FREE => Self::Free,
            STATE_SENTINEL => Self::Sentinel,
            _ => Self::Invalid,
        }
    }
}

/// One chunk along the address chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkInfo {
    /// Header offset from the region base
    pub offset: usize,
    /// Payload address
    pub address: usize,
    /// Payload capacity in bytes
    pub size: usize,
    pub state: ChunkState,
}

impl ChunkInfo {
    pub fn is_free(&self) -> bool {
        self.state == ChunkState::Free
    }
}

/// Iterator over every chunk, head sentinel to tail sentinel
pub struct Chunks<'a> {
    arena: Option<&'a Arena>,
    offset: usize,
    done: bool,
}

impl Iterator for Chunks<'_> {
    type Item = ChunkInfo;

    fn next(&mut self) -> Option<ChunkInfo> {
        if self.done {
            return None;
        }
        let arena = self.arena?;
        let offset = self.offset;
        let next = arena.next(offset);

        // Stop at the wrap, or at a link that does not move forward
        if next <= offset || next > arena.tail() || next % ALIGNMENT != 0 {
            self.done = true;
        } else {
            self.offset = next;
        }

        Some(ChunkInfo {
            offset,
            address: arena.payload(offset),
            size: arena.size_of(offset),
            state: ChunkState::from_tag(arena.state(offset)),
        })
    }
}

impl Heap {
    /// Walk the address chain from the head sentinel.
    ///
    /// Yields nothing for an uninitialized heap.
    pub fn chunks(&self) -> Chunks<'_> {
        Chunks {
            arena: self.arena(),
            offset: 0,
            done: false,
        }
    }

    /// Verify every structural invariant of the heap.
    ///
    /// Checks, in order: the address chain is ascending with consistent back
    /// links and valid headers; no two consecutive chunks are free; every free
    /// chunk is in exactly the bin of its size class and every bin member is
    /// free; the byte counters add up to the region size. Returns the first
    /// violation found.
    pub fn check(&self) -> HeapResult<()> {
        let Some(arena) = self.arena() else {
            return Ok(());
        };
        let corrupt = |offset: usize, kind| HeapError::corruption(arena.base() + offset, kind);

        let mut free_seen = 0usize;
        let mut free_bytes = 0usize;
        let mut used_bytes = 0usize;
        let mut meta_bytes = 0usize;
        let mut prev_free = false;
        let mut reached_tail = false;

        for chunk in self.chunks() {
            let offset = chunk.offset;
            if arena.canary(offset) != canary_for(offset) {
                return Err(corrupt(offset, CorruptionKind::BadCanary));
            }
            if offset != 0 && arena.next(arena.prev(offset)) != offset {
                return Err(corrupt(offset, CorruptionKind::BrokenLinks));
            }

            let is_sentinel = offset == 0 || offset == arena.tail();
            match (chunk.state, is_sentinel) {
                (ChunkState::Sentinel, true) => {}
                (ChunkState::Used, false) => used_bytes += chunk.size,
                (ChunkState::Free, false) => {
                    if prev_free {
                        return Err(corrupt(offset, CorruptionKind::AdjacentFree));
                    }
                    free_seen += 1;
                    free_bytes += chunk.size;
                }
                _ => return Err(corrupt(offset, CorruptionKind::BadState)),
            }
            if !is_sentinel {
                meta_bytes += HEADER_SIZE;
            }
            prev_free = chunk.is_free();
            reached_tail = offset == arena.tail();
        }

        if !reached_tail || arena.next(arena.tail()) != 0 || arena.prev(0) != arena.tail() {
            return Err(corrupt(arena.tail(), CorruptionKind::BrokenLinks));
        }

        let mut binned = 0usize;
        for k in 0..BIN_COUNT {
            binned += self.check_bin(arena, k)?;
        }
        if binned != free_seen || self.bins().len() != binned {
            return Err(corrupt(0, CorruptionKind::Misplaced));
        }

        let counters = self.counters();
        let balanced = counters.free == free_bytes
            && counters.used == used_bytes
            && counters.meta == meta_bytes
            && free_bytes + used_bytes + meta_bytes + 2 * HEADER_SIZE == arena.len();
        if !balanced {
            return Err(corrupt(0, CorruptionKind::CounterMismatch));
        }
        Ok(())
    }

    /// Walks bin `k`, returning its member count.
    fn check_bin(&self, arena: &Arena, k: usize) -> HeapResult<usize> {
        let Some(head) = self.bins().head(k) else {
            return Ok(0);
        };
        let (min, max) = class_range(k);
        let limit = arena.len() / HEADER_SIZE;
        let mut count = 0;
        let mut offset = head;

        loop {
            let address = arena.base() + offset;
            let size = arena.size_of(offset);
            if !arena.is_free(offset) || size < min || size > max || class_of(size) != k {
                return Err(HeapError::corruption(address, CorruptionKind::Misplaced));
            }
            let next = arena.bin_next(offset);
            if arena.bin_prev(next) != offset {
                return Err(HeapError::corruption(address, CorruptionKind::BrokenLinks));
            }
            count += 1;
            if count > limit {
                return Err(HeapError::corruption(address, CorruptionKind::BrokenLinks));
            }
            offset = next;
            if offset == head {
                return Ok(count);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HeapConfig;
    use std::vec::Vec;

    #[repr(C, align(16))]
    struct Region([u8; 2048]);

    #[test]
    fn test_chunks_walk_in_address_order() {
        let mut region = Region([0; 2048]);
        let start = region.0.as_mut_ptr() as usize;
        let mut heap = unsafe { Heap::new(start, start + 2048, HeapConfig::DEFAULT) }.unwrap();

        let a = heap.allocate(64).unwrap();
        let _b = heap.allocate(32).unwrap();
        unsafe { heap.free(a).unwrap() };

        let chunks: Vec<_> = heap.chunks().collect();
        let states: Vec<_> = chunks.iter().map(|c| c.state).collect();
        assert_eq!(
            states,
            [
                ChunkState::Sentinel,
                ChunkState::Free,
                ChunkState::Used,
                ChunkState::Free,
                ChunkState::Sentinel
            ]
        );
        assert!(chunks.windows(2).all(|w| w[0].offset < w[1].offset));
        assert_eq!(chunks[1].size, 64);
        assert_eq!(chunks[2].size, 32);
        assert_eq!(chunks[1].address, a.as_ptr() as usize);
    }

    #[test]
    fn test_check_detects_counter_drift() {
        let mut region = Region([0; 2048]);
        let start = region.0.as_mut_ptr() as usize;
        let mut heap = unsafe { Heap::new(start, start + 2048, HeapConfig::DEFAULT) }.unwrap();
        assert!(heap.check().is_ok());

        // Flip a used chunk to free behind the heap's back
        let ptr = heap.allocate(64).unwrap();
        let header = ptr.as_ptr() as usize - HEADER_SIZE;
        unsafe { *((header + 16) as *mut u32) = STATE_FREE };
        assert!(matches!(heap.check(), Err(HeapError::Corruption { .. })));
    }

    #[test]
    fn test_uninitialized_heap_is_consistent() {
        let heap = Heap::empty();
        assert_eq!(heap.chunks().count(), 0);
        assert!(heap.check().is_ok());
    }
}
