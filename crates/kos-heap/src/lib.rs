//! Kernel Heap for KOS
//!
//! A general-purpose heap that serves variably-sized allocations out of one
//! fixed, contiguous region handed over at boot. All bookkeeping lives inside
//! the region itself:
//!
//! - **Chunks**: every block (free or used) starts with a [`ChunkHeader`]
//! - **Address chain**: a circular list threading every chunk in address order;
//!   a chunk's size is the distance to its successor, never stored
//! - **Free bins**: one circular LIFO ring per power-of-two size class
//! - **Sentinels**: two permanent used headers bounding the region, so every
//!   real chunk has two neighbours
//!
//! # Architecture
//!
//! ```text
//! base                                                              end
//!  ┌──────────┬──────────┬─────────┬──────────┬─────────────┬──────────┐
//!  │ HEAD (S) │ hdr USED │ payload │ hdr FREE │ links | ... │ TAIL (S) │
//!  └──────────┴──────────┴─────────┴──────────┴─────────────┴──────────┘
//!       ▲  address chain: head -> ... -> tail -> head (offsets)  ▲
//!
//!  bins[k]: FREE chunks with size in [2^k, 2^(k+1)), newest first
//! ```
//!
//! Links are byte offsets from the region base rather than references, so
//! splitting and coalescing is plain offset bookkeeping.
//!
//! # Usage
//!
//! ```ignore
//! use kos_heap::LockedHeap;
//!
//! #[global_allocator]
//! static HEAP: LockedHeap = LockedHeap::empty();
//!
//! unsafe { HEAP.init(heap_start, heap_end)? };
//! ```
//!
//! # Cargo features
//!
//! | Feature | Effect |
//! |---------|--------|
//! | `x86_64` | Mask interrupts while the heap lock is held (bare metal only) |
//! | `serde` | `Serialize`/`Deserialize` for [`HeapStats`] and [`HeapError`] |

#![no_std]

#[cfg(test)]
extern crate std;

pub mod bins;
pub mod check;
pub mod chunk;
pub mod class;
pub mod config;
pub mod error;
pub mod heap;
pub mod irq;
pub mod locked;
pub mod stats;

pub use check::{ChunkInfo, ChunkState, Chunks};
pub use chunk::{ChunkHeader, ALIGNMENT, HEADER_SIZE, MIN_PAYLOAD};
pub use class::{admission_class, class_of, class_range, BIN_COUNT};
pub use config::HeapConfig;
pub use error::{CorruptionKind, HeapError, HeapResult};
pub use heap::{Heap, MIN_REGION_SIZE};
pub use locked::LockedHeap;
pub use stats::HeapStats;
