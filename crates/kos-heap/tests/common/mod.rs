//! Shared fixtures for heap integration tests

#![allow(dead_code)]

use std::alloc::{alloc_zeroed, dealloc, Layout};

use kos_heap::{Heap, HeapConfig, LockedHeap};

/// Page-aligned scratch memory standing in for the boot-time heap region
pub struct TestRegion {
    ptr: *mut u8,
    layout: Layout,
}

impl TestRegion {
    pub fn new(size: usize) -> Self {
        let layout = Layout::from_size_align(size, 4096).unwrap();
        let ptr = unsafe { alloc_zeroed(layout) };
        assert!(!ptr.is_null());
        Self { ptr, layout }
    }

    pub fn start(&self) -> usize {
        self.ptr as usize
    }

    pub fn end(&self) -> usize {
        self.ptr as usize + self.layout.size()
    }

    pub fn heap(&self) -> Heap {
        self.heap_with(HeapConfig::DEFAULT)
    }

    pub fn heap_with(&self, config: HeapConfig) -> Heap {
        unsafe { Heap::new(self.start(), self.end(), config).unwrap() }
    }

    pub fn locked(&self) -> LockedHeap {
        LockedHeap::new(self.heap())
    }
}

impl Drop for TestRegion {
    fn drop(&mut self) {
        unsafe { dealloc(self.ptr, self.layout) };
    }
}
