//! Free bins
//!
//! One circular doubly-linked ring per size class, threaded through the
//! payloads of free chunks. Each ring behaves as a stack: the most recently
//! freed chunk is the head and is handed out first.

use crate::chunk::Arena;
use crate::class::{class_of, BIN_COUNT};

/// Heads of the per-class rings plus an occupancy bitmap
#[derive(Debug)]
pub(crate) struct FreeBins {
    /// Offset of the newest free chunk in each class
    heads: [Option<usize>; BIN_COUNT],
    /// Bit `k` set iff `heads[k]` is non-empty
    occupied: usize,
    /// Chunks across all rings
    count: usize,
}

impl FreeBins {
    pub(crate) const fn new() -> Self {
        Self {
            heads: [None; BIN_COUNT],
            occupied: 0,
            count: 0,
        }
    }

    /// Number of free chunks in all bins
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.count
    }

    /// Payload size of the largest binned chunk, or 0 when all bins are empty.
    ///
    /// Only the ring of the highest occupied class is walked.
    pub(crate) fn largest(&self, arena: &Arena) -> usize {
        if self.occupied == 0 {
            return 0;
        }
        let k = (usize::BITS - 1 - self.occupied.leading_zeros()) as usize;
        let Some(head) = self.heads[k] else {
            return 0;
        };
        let mut largest = 0;
        let mut offset = head;
        loop {
            largest = largest.max(arena.size_of(offset));
            offset = arena.bin_next(offset);
            if offset == head {
                return largest;
            }
        }
    }

    /// Newest chunk in class `k`, if any
    #[inline]
    pub(crate) fn head(&self, k: usize) -> Option<usize> {
        self.heads[k]
    }

    /// First non-empty class at or above `from`.
    #[inline]
    pub(crate) fn first_occupied(&self, from: usize) -> Option<usize> {
        if from >= BIN_COUNT {
            return None;
        }
        let above = self.occupied >> from;
        if above == 0 {
            None
        } else {
            Some(from + above.trailing_zeros() as usize)
        }
    }

    /// Pushes the free chunk at `offset` onto the bin of its current size.
    pub(crate) fn insert(&mut self, arena: &Arena, offset: usize) {
        let k = class_of(arena.size_of(offset));
        match self.heads[k] {
            None => {
                arena.set_bin_links(offset, offset, offset);
                self.occupied |= 1 << k;
            }
            Some(head) => {
                let last = arena.bin_prev(head);
                arena.set_bin_links(offset, last, head);
                arena.set_bin_next(last, offset);
                arena.set_bin_prev(head, offset);
            }
        }
        self.heads[k] = Some(offset);
        self.count += 1;
    }

    /// Unlinks the free chunk at `offset` from the bin of its current size.
    ///
    /// Must be called before the chunk's size changes.
    pub(crate) fn remove(&mut self, arena: &Arena, offset: usize) {
        let k = class_of(arena.size_of(offset));
        self.remove_from(arena, offset, k);
    }

    /// Pops the newest chunk of class `k`.
    pub(crate) fn pop(&mut self, arena: &Arena, k: usize) -> Option<usize> {
        let head = self.heads[k]?;
        self.remove_from(arena, head, k);
        Some(head)
    }

    fn remove_from(&mut self, arena: &Arena, offset: usize, k: usize) {
        self.count -= 1;
        let next = arena.bin_next(offset);
        if next == offset {
            self.heads[k] = None;
            self.occupied &= !(1 << k);
            return;
        }

        let prev = arena.bin_prev(offset);
        arena.set_bin_next(prev, next);
        arena.set_bin_prev(next, prev);
        if self.heads[k] == Some(offset) {
            self.heads[k] = Some(next);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{HEADER_SIZE, STATE_FREE, STATE_SENTINEL, STATE_USED};

    #[repr(C, align(16))]
    struct Block([u8; 1024]);

    /// head sentinel | free 64 | used 16 | free 64 | used 16 | free rest | tail
    fn layout(block: &mut Block) -> (Arena, [usize; 3]) {
        let arena = unsafe { Arena::new(block.0.as_mut_ptr() as usize, 1024) };
        let tail = arena.tail();
        arena.write_header(0, tail, tail, STATE_SENTINEL);
        arena.write_header(tail, 0, 0, STATE_SENTINEL);

        let a = HEADER_SIZE;
        let b = a + HEADER_SIZE + 64;
        let c = b + HEADER_SIZE + 16;
        let d = c + HEADER_SIZE + 64;
        let e = d + HEADER_SIZE + 16;
        arena.link_after(0, a, STATE_FREE);
        arena.link_after(a, b, STATE_USED);
        arena.link_after(b, c, STATE_FREE);
        arena.link_after(c, d, STATE_USED);
        arena.link_after(d, e, STATE_FREE);
        (arena, [a, c, e])
    }

    #[test]
    fn test_bins_are_lifo() {
        let mut block = Block([0; 1024]);
        let (arena, [a, c, _]) = layout(&mut block);
        let mut bins = FreeBins::new();

        bins.insert(&arena, a);
        bins.insert(&arena, c);
        assert_eq!(bins.head(6), Some(c));
        assert_eq!(bins.pop(&arena, 6), Some(c));
        assert_eq!(bins.pop(&arena, 6), Some(a));
        assert_eq!(bins.pop(&arena, 6), None);
        assert_eq!(bins.first_occupied(0), None);
    }

    #[test]
    fn test_remove_middle_of_ring() {
        let mut block = Block([0; 1024]);
        let (arena, [a, c, _]) = layout(&mut block);
        let mut bins = FreeBins::new();

        bins.insert(&arena, a);
        bins.insert(&arena, c);
        bins.remove(&arena, a);
        assert_eq!(bins.head(6), Some(c));
        assert_eq!(arena.bin_next(c), c);
        assert_eq!(arena.bin_prev(c), c);
    }

    #[test]
    fn test_first_occupied_scans_upward() {
        let mut block = Block([0; 1024]);
        let (arena, [a, _, e]) = layout(&mut block);
        let mut bins = FreeBins::new();

        bins.insert(&arena, a);
        bins.insert(&arena, e);
        let big = class_of(arena.size_of(e));
        assert!(big > 6);
        assert_eq!(bins.first_occupied(0), Some(6));
        assert_eq!(bins.first_occupied(6), Some(6));
        assert_eq!(bins.first_occupied(7), Some(big));
        assert_eq!(bins.first_occupied(big + 1), None);
        assert_eq!(bins.first_occupied(BIN_COUNT), None);
    }

    #[test]
    fn test_len_and_largest_track_membership() {
        let mut block = Block([0; 1024]);
        let (arena, [a, c, e]) = layout(&mut block);
        let mut bins = FreeBins::new();
        assert_eq!(bins.len(), 0);
        assert_eq!(bins.largest(&arena), 0);

        bins.insert(&arena, a);
        bins.insert(&arena, c);
        assert_eq!(bins.len(), 2);
        assert_eq!(bins.largest(&arena), 64);

        bins.insert(&arena, e);
        assert_eq!(bins.len(), 3);
        assert_eq!(bins.largest(&arena), arena.size_of(e));

        bins.remove(&arena, e);
        bins.pop(&arena, 6);
        assert_eq!(bins.len(), 1);
        assert_eq!(bins.largest(&arena), 64);
    }
}
