//! # triarena - Three Interchangeable User-Space Allocator Engines
//!
//! This crate provides three allocator engines that each serve memory
//! out of a single contiguous region acquired via `mmap` at construction,
//! with no further OS calls on the hot path:
//!
//! ```text
//!   triarena
//!   ├── align             - Alignment and power-of-two arithmetic
//!   ├── error             - InitError, DestroyError, ReleaseError
//!   ├── region            - MmapRegion (the one audited unsafe module)
//!   ├── contract          - Allocator / VariableBlockAllocator traits
//!   ├── data_structures
//!   │   ├── linked_list   - Intrusive DoubleLinkedList / Node
//!   │   └── bitmap        - Dense bit-vector + binary-tree index math
//!   ├── slab              - SlabAllocator (fixed-size slots)
//!   ├── buddy             - BuddyAllocator (linked-list buddy, per-block metadata)
//!   └── bitmap_buddy      - BitmapBuddyAllocator (bit-tree buddy)
//! ```
//!
//! ## Why three engines
//!
//! Each engine answers a different allocation shape:
//!
//! ```text
//!   SlabAllocator        - every request is the same size
//!                          O(1) allocate/release, zero fragmentation
//!
//!   BuddyAllocator        - requests vary, sizes rounded to powers of two
//!                          state lives in a node per live/free block
//!
//!   BitmapBuddyAllocator  - same splitting discipline as BuddyAllocator
//!                          state lives in a single bit per tree node
//!                          instead of a node pool — smaller bookkeeping
//!                          overhead, same caveats
//! ```
//!
//! All three implement [`contract::Allocator`]; the two buddy engines
//! additionally implement [`contract::VariableBlockAllocator`], exposing
//! running `internal_fragmentation` and `sparse_free_memory` counters.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use triarena::slab::SlabAllocator;
//! use triarena::contract::Allocator;
//!
//! let mut pool = SlabAllocator::new(64, 128).unwrap();
//! let ptr = pool.allocate(64).unwrap();
//! pool.release(ptr).unwrap();
//! ```
//!
//! ## What this crate does not do
//!
//! No thread safety, no reentrancy, no multi-arena coordination, no OS
//! fallback for oversized requests, no alignment beyond 8 bytes, no
//! zero-on-alloc, no poison-on-free, no NUMA awareness, no garbage
//! collection. Every engine manages exactly one region for its own
//! lifetime; coordinating several regions is left to the caller.
//!
//! ## Safety
//!
//! Acquiring and releasing the backing region is confined to
//! [`region::MmapRegion`]; every other module works with already-mapped
//! memory through that type's safe, bounds-checked accessors. The two
//! buddy engines additionally plant a small metadata record at the
//! front of every block they hand out, which requires `unsafe` reads
//! and writes local to each engine's own file.

pub mod align;
pub mod bitmap_buddy;
pub mod buddy;
pub mod contract;
pub mod data_structures;
pub mod error;
pub mod region;
pub mod slab;

pub use bitmap_buddy::BitmapBuddyAllocator;
pub use buddy::BuddyAllocator;
pub use contract::{Allocator, VariableBlockAllocator};
pub use slab::SlabAllocator;
