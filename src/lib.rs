//! # breakheap - A First-Fit Heap on the Program Break
//!
//! This crate provides a **first-fit allocator** with block splitting and
//! coalescing. It manages one contiguous heap that grows on demand through a
//! heap-extension primitive (`sbrk(2)` by default).
//!
//! ## Overview
//!
//! Every allocation is a block: a header followed by the user data. Blocks
//! are kept in an address-ordered doubly linked list (the directory).
//!
//! ```text
//!   Heap Layout:
//!
//!   lower bound                                                upper bound
//!   ▼                                                                    ▼
//!   ┌────────┬──────────┬────────┬──────────────┬────────┬──────────────┐
//!   │ header │  A data  │ header │  B (free)    │ header │  C data      │
//!   └────────┴──────────┴────────┴──────────────┴────────┴──────────────┘
//!       │  ▲                │  ▲                    │
//!       └──┼── next ────────┘  └──── prev ──────────┘
//!          └───── prev ───────┘
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   breakheap
//!   ├── align      - Rounding macro (align_to!)
//!   ├── block      - Block header and header pointer (internal)
//!   ├── config     - HeapConfig
//!   ├── directory  - Address-ordered block list (internal)
//!   ├── dump       - BlockInfo, HeapStats and the heap map
//!   ├── error      - HeapError
//!   ├── heap       - Heap: allocate, free, reallocate, ...
//!   ├── region     - Heap bounds and extension (internal)
//!   └── source     - HeapSource, Sbrk, MappedRegion
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use breakheap::{Heap, MappedRegion};
//!
//! let mut heap = Heap::new(MappedRegion::reserve(1 << 20).unwrap());
//!
//! let data = heap.allocate(64).unwrap();
//! unsafe {
//!     data.as_ptr().write_bytes(0x2A, 64);
//!     heap.free(data.as_ptr());
//! }
//!
//! assert_eq!(heap.stats().free_blocks, 1);
//! ```
//!
//! ## How It Works
//!
//! Allocation scans the directory from the lowest address:
//!
//! ```text
//!   1. free block with capacity >= size   -> reuse it in place
//!   2. block with slack >= size + header  -> split it
//!
//!      ┌────────┬──────┬───────────────────────┐
//!      │ header │ used │         slack         │
//!      └────────┴──────┴───────────────────────┘
//!                      ▼
//!      ┌────────┬──────┬────────┬──────────────┐
//!      │ header │ used │ header │  new block   │
//!      └────────┴──────┴────────┴──────────────┘
//!
//!   3. nothing fits                       -> extend the heap (1 KiB units)
//! ```
//!
//! Freeing a block merges it with free neighbours until no adjacent free
//! block is left, so every run of free blocks collapses into one.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: No synchronization primitives
//! - **No alignment guarantee**: Data starts right after its header
//! - **No partial release**: Memory only goes back to the OS on [`Heap::reset`]
//! - **Linear search**: Allocation is O(n) in the number of blocks
//!
//! ## Safety
//!
//! Pointers handed out by a heap are raw. Freeing, resizing and resetting
//! take `unsafe` because the heap has to trust that the pointer is its own.

pub mod align;
mod block;
mod config;
mod directory;
mod dump;
mod error;
mod heap;
mod region;
mod source;

pub use block::HEADER_SIZE;
pub use config::{DEFAULT_EXTENSION_UNIT, HeapConfig};
pub use dump::{BlockInfo, HeapStats};
pub use error::{HeapError, Result};
pub use heap::{BreakHeap, Heap, MappedHeap};
pub use source::{HeapSource, MappedRegion, Sbrk};
