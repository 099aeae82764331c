//! # tagheap - An Explicit Free-List Heap Allocator
//!
//! This crate provides a classic **heap manager**: it owns one linearly
//! growable region of raw bytes and services allocation, deallocation and
//! resizing requests on top of it, using boundary tags, an explicit free list
//! and a first-fit placement policy.
//!
//! ## Overview
//!
//! ```text
//!   Region Layout:
//!
//!   ┌─────┬───────────┬──────────────┬──────────────┬──────────────┬──────┐
//!   │ pad │ prologue  │   block A    │   block B    │   block C    │ epi- │
//!   │     │ [16:a]    │ [48:a] ...   │ [48:f] ...   │ [3952:f] ... │ logue│
//!   │     │  [16:a]   │      [48:a]  │      [48:f]  │    [3952:f]  │[0:a] │
//!   └─────┴───────────┴──────────────┴──────────────┴──────────────┴──────┘
//!   0     8           32             80             128                   end
//!                     ▲
//!                     └── first payload offset
//! ```
//!
//! Every block stores its size and allocated bit in a header word and an
//! identical footer word, so both neighbors of a block are found in O(1).
//! Free blocks additionally thread a doubly linked list through the first two
//! payload words:
//!
//! ```text
//!   Free Block:                         Allocated Block:
//!   ┌──────────┬──────┬──────┬─────┬──────────┐   ┌──────────┬───────────────┬──────────┐
//!   │ hdr [s:f]│ next │ prev │ ... │ ftr [s:f]│   │ hdr [s:a]│   user data   │ ftr [s:a]│
//!   └──────────┴──────┴──────┴─────┴──────────┘   └──────────┴───────────────┴──────────┘
//!              ▲                                             ▲
//!              └── payload offset                            └── returned to the caller
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   tagheap
//!   ├── align      - Alignment macros (align!, align_to!)
//!   ├── block      - Boundary-tag codec and layout constants
//!   ├── region     - Region trait, VecRegion and MmapRegion providers
//!   ├── free_list  - Intrusive LIFO free list
//!   ├── heap       - Heap: init, allocate, free, reallocate
//!   ├── coalesce   - Boundary-tag coalescing
//!   ├── check      - Consistency checker, iterators, stats, dump
//!   ├── config     - HeapConfig
//!   └── error      - HeapError
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use tagheap::Heap;
//!
//! let mut heap = Heap::new().unwrap();
//!
//! let a = heap.allocate(8).unwrap();
//! heap.payload_mut(a).unwrap()[..8].copy_from_slice(&42u64.to_ne_bytes());
//!
//! let b = heap.allocate(8).unwrap();
//! assert_ne!(a, b);
//!
//! heap.free(a).unwrap();
//! assert_eq!(heap.allocate(8), Some(a));
//! assert!(heap.check().is_ok());
//! ```
//!
//! ## How It Works
//!
//! - **allocate**: the request is rounded to a block size, the free list is
//!   scanned from the head and the first block large enough is split (or
//!   taken whole if the remainder would be smaller than the minimum block).
//!   On a miss the region grows by at least one chunk.
//! - **free**: the block is marked free and merged with any free physical
//!   neighbor, so no two adjacent blocks are ever free.
//! - **reallocate**: shrinks in place, grows into a free successor or the end
//!   of the region, and otherwise moves the payload to a new block.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: wrap the whole [`Heap`] in one lock to share it
//! - **Trusting**: `free` rejects offsets whose tags do not describe an
//!   allocated block, but user data that forges tags can still fool it
//! - **Monotonic**: the region never shrinks

pub mod align;
pub mod block;
mod check;
mod coalesce;
pub mod config;
pub mod error;
mod free_list;
mod heap;
pub mod region;

pub use block::Offset;
pub use check::{BlockInfo, Blocks, HeapStats, Violation};
pub use config::HeapConfig;
pub use error::HeapError;
pub use free_list::FreeIter;
pub use heap::Heap;
#[cfg(unix)]
pub use region::MmapRegion;
pub use region::{Region, VecRegion};
