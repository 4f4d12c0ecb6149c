//! Several threads sharing one locked heap.

mod common;

use std::sync::Arc;
use std::thread;

use common::TestRegion;

const THREADS: usize = 8;
const ROUNDS: usize = 500;
/// Live allocations each thread keeps before freeing its oldest
const WINDOW: usize = 16;

#[test]
fn test_threads_share_locked_heap() {
    let region = TestRegion::new(256 * 1024);
    let heap = Arc::new(region.locked());
    let before = heap.stats();

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let heap = Arc::clone(&heap);
            thread::spawn(move || {
                let mut live = Vec::new();
                for round in 0..ROUNDS {
                    let size = 16 + (t * 37 + round * 13) % 400;
                    let tag = (t as u8) ^ (round as u8);
                    if let Ok(ptr) = heap.allocate(size) {
                        unsafe { ptr.as_ptr().write_bytes(tag, size) };
                        live.push((ptr, size, tag));
                    }
                    if live.len() > WINDOW {
                        let (ptr, size, tag) = live.remove(0);
                        let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), size) };
                        assert!(bytes.iter().all(|&b| b == tag));
                        unsafe { heap.free(ptr).unwrap() };
                    }
                }
                for (ptr, _, _) in live {
                    unsafe { heap.free(ptr).unwrap() };
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let after = heap.stats();
    assert!(heap.check().is_ok());
    assert_eq!(after.used_bytes, 0);
    assert_eq!(after.free_bytes, before.free_bytes);
    assert_eq!(after.allocations, after.frees);
    drop(heap);
    drop(region);
}
