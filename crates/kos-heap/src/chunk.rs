//! Chunk records and the address-ordered chain
//!
//! Every block in the region starts with a [`ChunkHeader`]. Headers link to
//! their address neighbours by byte offset from the region base; a chunk's size
//! is the distance to its successor minus the header. While a chunk is free,
//! the first bytes of its payload hold the links of its bin ring.

use core::mem::size_of;

/// Payload alignment and size granularity
pub const ALIGNMENT: usize = 16;

/// Size of one chunk header in bytes
pub const HEADER_SIZE: usize = size_of::<ChunkHeader>();

/// Smallest payload a chunk can have (room for its bin links once freed)
pub const MIN_PAYLOAD: usize = size_of::<FreeLinks>();

/// State tag: chunk handed out to a caller
pub(crate) const STATE_USED: u32 = 0x5553_4544; // "USED"
/// State tag: chunk sits in a free bin
pub(crate) const STATE_FREE: u32 = 0x4652_4545; // "FREE"
/// State tag: permanent region boundary
pub(crate) const STATE_SENTINEL: u32 = 0x5345_4E54; // "SENT"

/// Mixed with the header offset to form the canary
const CANARY_SEED: u32 = 0x6B68_6561; // "khea"

const _: () = assert!(HEADER_SIZE % ALIGNMENT == 0);
const _: () = assert!(MIN_PAYLOAD <= ALIGNMENT);
const _: () = assert!(ALIGNMENT.is_power_of_two());

/// Metadata at the front of every chunk
#[repr(C, align(16))]
pub struct ChunkHeader {
    /// Offset of the previous chunk in address order
    prev: usize,
    /// Offset of the next chunk in address order (tail wraps to head)
    next: usize,
    /// One of `STATE_USED`, `STATE_FREE`, `STATE_SENTINEL`
    state: u32,
    /// `CANARY_SEED ^ offset`
    canary: u32,
}

/// Bin ring links, stored in the payload of a free chunk
#[repr(C)]
pub(crate) struct FreeLinks {
    pub(crate) prev: usize,
    pub(crate) next: usize,
}

#[inline]
pub(crate) const fn canary_for(offset: usize) -> u32 {
    CANARY_SEED ^ (offset as u32)
}

/// Aligns `value` up to `ALIGNMENT`, or `None` on overflow.
#[inline]
pub(crate) const fn align_up(value: usize) -> Option<usize> {
    match value.checked_add(ALIGNMENT - 1) {
        Some(v) => Some(v & !(ALIGNMENT - 1)),
        None => None,
    }
}

#[inline]
pub(crate) const fn align_down(value: usize) -> usize {
    value & !(ALIGNMENT - 1)
}

/// View of the managed region: base address and aligned length.
///
/// All accessors take offsets relative to `base`. Callers must only pass
/// offsets of live headers (or, for the link accessors, of free chunks).
#[derive(Debug, Clone, Copy)]
pub(crate) struct Arena {
    base: usize,
    len: usize,
}

impl Arena {
    /// # Safety
    /// `base..base + len` must be writable memory owned exclusively by the
    /// heap for as long as this arena is used, with `base` aligned to
    /// `ALIGNMENT`.
    pub(crate) const unsafe fn new(base: usize, len: usize) -> Self {
        Self { base, len }
    }

    pub(crate) const fn base(&self) -> usize {
        self.base
    }

    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    /// Offset of the tail sentinel
    pub(crate) const fn tail(&self) -> usize {
        self.len - HEADER_SIZE
    }

    #[inline]
    fn header(&self, offset: usize) -> *mut ChunkHeader {
        debug_assert!(offset + HEADER_SIZE <= self.len);
        (self.base + offset) as *mut ChunkHeader
    }

    #[inline]
    fn links(&self, offset: usize) -> *mut FreeLinks {
        debug_assert!(offset + HEADER_SIZE + MIN_PAYLOAD <= self.len);
        (self.base + offset + HEADER_SIZE) as *mut FreeLinks
    }

    /// Writes a fresh header at `offset`.
    pub(crate) fn write_header(&self, offset: usize, prev: usize, next: usize, state: u32) {
        // SAFETY: offset lies inside the region (arena contract) and is aligned.
        unsafe {
            self.header(offset).write(ChunkHeader {
                prev,
                next,
                state,
                canary: canary_for(offset),
            });
        }
    }

    #[inline]
    pub(crate) fn prev(&self, offset: usize) -> usize {
        // SAFETY: offset refers to a live header.
        unsafe { (*self.header(offset)).prev }
    }

    #[inline]
    pub(crate) fn next(&self, offset: usize) -> usize {
        // SAFETY: offset refers to a live header.
        unsafe { (*self.header(offset)).next }
    }

    #[inline]
    pub(crate) fn set_prev(&self, offset: usize, prev: usize) {
        // SAFETY: offset refers to a live header.
        unsafe { (*self.header(offset)).prev = prev }
    }

    #[inline]
    pub(crate) fn set_next(&self, offset: usize, next: usize) {
        // SAFETY: offset refers to a live header.
        unsafe { (*self.header(offset)).next = next }
    }

    #[inline]
    pub(crate) fn state(&self, offset: usize) -> u32 {
        // SAFETY: offset refers to a live header.
        unsafe { (*self.header(offset)).state }
    }

    #[inline]
    pub(crate) fn set_state(&self, offset: usize, state: u32) {
        // SAFETY: offset refers to a live header.
        unsafe { (*self.header(offset)).state = state }
    }

    #[inline]
    pub(crate) fn canary(&self, offset: usize) -> u32 {
        // SAFETY: offset refers to a live header.
        unsafe { (*self.header(offset)).canary }
    }

    #[inline]
    pub(crate) fn is_free(&self, offset: usize) -> bool {
        self.state(offset) == STATE_FREE
    }

    /// Payload capacity of the chunk at `offset`, derived from its successor.
    ///
    /// The tail sentinel wraps to the head and has no payload.
    #[inline]
    pub(crate) fn size_of(&self, offset: usize) -> usize {
        let next = self.next(offset);
        if next <= offset {
            0
        } else {
            next - offset - HEADER_SIZE
        }
    }

    /// Splices a new header at `new` between `offset` and its successor.
    pub(crate) fn link_after(&self, offset: usize, new: usize, state: u32) {
        let next = self.next(offset);
        self.write_header(new, offset, next, state);
        self.set_next(offset, new);
        self.set_prev(next, new);
    }

    /// Removes `offset` from the chain; its predecessor absorbs its bytes.
    pub(crate) fn unlink(&self, offset: usize) {
        let prev = self.prev(offset);
        let next = self.next(offset);
        self.set_next(prev, next);
        self.set_prev(next, prev);
    }

    #[inline]
    pub(crate) fn bin_prev(&self, offset: usize) -> usize {
        // SAFETY: chunk is free, so its payload holds links.
        unsafe { (*self.links(offset)).prev }
    }

    #[inline]
    pub(crate) fn bin_next(&self, offset: usize) -> usize {
        // SAFETY: chunk is free, so its payload holds links.
        unsafe { (*self.links(offset)).next }
    }

    #[inline]
    pub(crate) fn set_bin_links(&self, offset: usize, prev: usize, next: usize) {
        // SAFETY: chunk is free and its payload is at least MIN_PAYLOAD bytes.
        unsafe { self.links(offset).write(FreeLinks { prev, next }) }
    }

    #[inline]
    pub(crate) fn set_bin_prev(&self, offset: usize, prev: usize) {
        // SAFETY: chunk is free.
        unsafe { (*self.links(offset)).prev = prev }
    }

    #[inline]
    pub(crate) fn set_bin_next(&self, offset: usize, next: usize) {
        // SAFETY: chunk is free.
        unsafe { (*self.links(offset)).next = next }
    }

    /// Address of the payload of the chunk at `offset`
    #[inline]
    pub(crate) fn payload(&self, offset: usize) -> usize {
        self.base + offset + HEADER_SIZE
    }

    /// Header offset for a payload address, if it lies in the payload range.
    pub(crate) fn offset_of_payload(&self, addr: usize) -> Option<usize> {
        let offset = addr.checked_sub(self.base)?.checked_sub(HEADER_SIZE)?;
        if offset > self.tail() {
            return None;
        }
        Some(offset)
    }
}
