//! Lock-protected heap and global allocator
//!
//! [`LockedHeap`] serializes every heap operation behind a spin lock held for
//! the whole call and released on every exit path. On bare metal the lock is
//! taken with interrupts masked (see [`irq`](crate::irq)), so the heap can be
//! entered from interrupt handlers.

use core::alloc::{GlobalAlloc, Layout};
use core::mem::size_of;
use core::ptr::{self, NonNull};
use core::sync::atomic::{AtomicBool, Ordering};

use spin::Mutex;

use crate::chunk::ALIGNMENT;
use crate::config::HeapConfig;
use crate::error::HeapResult;
use crate::heap::Heap;
use crate::irq;
use crate::stats::HeapStats;

/// A [`Heap`] behind a spin lock, usable as `#[global_allocator]`
pub struct LockedHeap {
    heap: Mutex<Heap>,
    /// Set while a failure is being logged, so a logger that allocates
    /// cannot recurse into another failure report
    reporting: AtomicBool,
}

impl LockedHeap {
    /// Create a locked heap without a region.
    pub const fn empty() -> Self {
        Self {
            heap: Mutex::new(Heap::empty()),
            reporting: AtomicBool::new(false),
        }
    }

    /// Wrap an already initialized heap.
    pub const fn new(heap: Heap) -> Self {
        Self {
            heap: Mutex::new(heap),
            reporting: AtomicBool::new(false),
        }
    }

    /// Run `f` with exclusive access to the heap.
    pub fn with_heap<R>(&self, f: impl FnOnce(&mut Heap) -> R) -> R {
        irq::without_interrupts(|| {
            let mut heap = self.heap.lock();
            f(&mut heap)
        })
    }

    /// Give the heap its region.
    ///
    /// # Safety
    /// `start..end` must be valid, writable memory that nothing else uses for
    /// the lifetime of the heap.
    pub unsafe fn init(&self, start: usize, end: usize) -> HeapResult<()> {
        self.init_with_config(start, end, HeapConfig::DEFAULT)
    }

    /// Give the heap its region with an explicit configuration.
    ///
    /// # Safety
    /// Same contract as [`LockedHeap::init`].
    pub unsafe fn init_with_config(
        &self,
        start: usize,
        end: usize,
        config: HeapConfig,
    ) -> HeapResult<()> {
        // SAFETY: forwarded caller contract.
        self.with_heap(|heap| unsafe { heap.init_with_config(start, end, config) })
    }

    pub fn is_initialized(&self) -> bool {
        self.with_heap(|heap| heap.is_initialized())
    }

    /// Allocate `size` bytes.
    pub fn allocate(&self, size: usize) -> HeapResult<NonNull<u8>> {
        self.with_heap(|heap| heap.allocate(size))
    }

    /// Allocate `size` zeroed bytes.
    pub fn allocate_zeroed(&self, size: usize) -> HeapResult<NonNull<u8>> {
        self.with_heap(|heap| heap.allocate_zeroed(size))
    }

    /// Return an allocation to the heap.
    ///
    /// # Safety
    /// Same contract as [`Heap::free`].
    pub unsafe fn free(&self, ptr: NonNull<u8>) -> HeapResult<()> {
        // SAFETY: forwarded caller contract.
        self.with_heap(|heap| unsafe { heap.free(ptr) })
    }

    /// Payload capacity of a live allocation.
    pub fn usable_size(&self, ptr: NonNull<u8>) -> HeapResult<usize> {
        self.with_heap(|heap| heap.usable_size(ptr))
    }

    /// Snapshot of heap usage.
    pub fn stats(&self) -> HeapStats {
        self.with_heap(|heap| heap.stats())
    }

    /// Verify the heap's structural invariants.
    pub fn check(&self) -> HeapResult<()> {
        self.with_heap(|heap| heap.check())
    }

    /// Logs a failure unless another report is already in progress.
    fn report(&self, f: impl FnOnce()) {
        if self
            .reporting
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            f();
            self.reporting.store(false, Ordering::Release);
        }
    }
}

impl Default for LockedHeap {
    fn default() -> Self {
        Self::empty()
    }
}

/// Slot just below an over-aligned pointer that holds the raw heap pointer
#[inline]
fn backref_slot(aligned: *mut u8) -> *mut *mut u8 {
    aligned.wrapping_sub(size_of::<*mut u8>()).cast::<*mut u8>()
}

// SAFETY: all heap access goes through the spin lock; the heap hands out
// non-overlapping blocks of at least the requested size and alignment.
unsafe impl GlobalAlloc for LockedHeap {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let size = layout.size();
        let align = layout.align();

        let result = if align <= ALIGNMENT {
            self.allocate(size)
        } else {
            // Over-allocate, align inside the block and remember the raw pointer
            let Some(total) = size.checked_add(align - 1 + size_of::<*mut u8>()) else {
                return ptr::null_mut();
            };
            self.allocate(total).map(|raw| {
                let raw = raw.as_ptr();
                let start = raw as usize + size_of::<*mut u8>();
                let aligned = ((start + align - 1) & !(align - 1)) as *mut u8;
                // SAFETY: the slot lies between `raw` and `aligned`, inside the block.
                unsafe { backref_slot(aligned).write(raw) };
                // SAFETY: derived from a non-null heap pointer.
                unsafe { NonNull::new_unchecked(aligned) }
            })
        };

        match result {
            Ok(ptr) => ptr.as_ptr(),
            Err(err) => {
                self.report(|| tracing::warn!(size, align, %err, "heap allocation failed"));
                ptr::null_mut()
            }
        }
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        // SAFETY: forwarded GlobalAlloc contract.
        let ptr = unsafe { self.alloc(layout) };
        if !ptr.is_null() {
            // SAFETY: fresh block of at least `layout.size()` bytes.
            unsafe { ptr::write_bytes(ptr, 0, layout.size()) };
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        let Some(ptr) = NonNull::new(ptr) else {
            return;
        };
        let raw = if layout.align() <= ALIGNMENT {
            ptr
        } else {
            // SAFETY: `alloc` stored the raw pointer just below the aligned one.
            let raw = unsafe { backref_slot(ptr.as_ptr()).read() };
            match NonNull::new(raw) {
                Some(raw) => raw,
                None => return,
            }
        };

        // SAFETY: GlobalAlloc contract: `ptr` came from `alloc` with `layout`.
        if let Err(err) = unsafe { self.free(raw) } {
            self.report(|| {
                tracing::error!(
                    ptr = raw.as_ptr() as usize,
                    size = layout.size(),
                    %err,
                    "heap free rejected"
                )
            });
        }
    }
}
