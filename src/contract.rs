//! The polymorphic allocator contract (`spec.md` §4.1).
//!
//! A C vtable-at-offset-0 doesn't translate directly into Rust; per the
//! design note in §9 ("a small tagged variant... wrapped in a
//! trait/interface"), the contract here is two traits. Concrete engines
//! implement [`Allocator`] directly — there's no base struct to embed,
//! since a trait object (`Box<dyn Allocator>`) already gives a caller an
//! engine-agnostic handle.

use std::ptr::NonNull;

use crate::error::{DestroyError, ReleaseError};

/// Four-operation contract shared by every allocator engine.
///
/// `init` is realized as each engine's own fallible constructor
/// (`SlabAllocator::new`, `BuddyAllocator::new`, `BitmapBuddyAllocator::new`)
/// rather than a trait method, since constructors produce `Self` and
/// can't be called through `&mut self`. The other three operations stay
/// on the trait so a caller holding only `dyn Allocator` can drive any
/// engine.
pub trait Allocator {
  /// Returns a pointer into the managed region aligned to at least 8
  /// bytes, or `None` if the request cannot be served. Engines that
  /// serve fixed-size requests (the slab) ignore `size`.
  fn allocate(&mut self, size: usize) -> Option<NonNull<u8>>;

  /// Returns a previously allocated pointer to the pool.
  fn release(&mut self, ptr: NonNull<u8>) -> Result<(), ReleaseError>;

  /// Releases all resources owned by this engine. Calling `destroy`
  /// twice on the same instance returns `DestroyError::AlreadyDestroyed`
  /// on the second call and leaves no further state to release.
  fn destroy(&mut self) -> Result<(), DestroyError>;
}

/// Refinement of [`Allocator`] for engines that serve variable-size
/// requests and therefore track fragmentation (`spec.md` §3).
///
/// The slab engine does not implement this trait — it has no notion of
/// "block size served vs. bytes requested" since every slot is the same
/// size.
pub trait VariableBlockAllocator: Allocator {
  /// Σ (block_size_served − bytes_requested) over live allocations.
  fn internal_fragmentation(&self) -> usize;

  /// Bytes currently not committed to any live allocation, including
  /// header/metadata overhead of unallocated blocks.
  fn sparse_free_memory(&self) -> usize;
}
