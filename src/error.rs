//! Error taxonomy for the allocator contract.
//!
//! One enum per failure axis, matching the taxonomy in `spec.md` §7.
//! `allocate` itself never returns a `Result` — per §4.1 it returns
//! `Option<NonNull<u8>>`, collapsing `OutOfMemory` and
//! `TooSmallOrTooLarge` into `None` the same way the teacher's
//! `BumpAllocator::allocate` collapses an `sbrk` failure into a null
//! pointer. `InvalidArgument`, `OutOfMemory` (at construction time),
//! `CorruptMetadata`, `OutOfRangePointer` and `DoubleFree` all carry a
//! `Result` since they're detected at distinct, reportable call sites.

use std::fmt;

/// Failure constructing an allocator engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitError {
  /// A constructor argument was structurally invalid: zero size, zero
  /// level count, or a level count beyond the engine's structural limit.
  InvalidArgument(&'static str),
  /// The OS refused to map the backing region.
  OutOfMemory,
}

impl fmt::Display for InitError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      InitError::InvalidArgument(reason) => write!(f, "invalid argument: {reason}"),
      InitError::OutOfMemory => write!(f, "mmap failed to reserve the backing region"),
    }
  }
}

impl std::error::Error for InitError {}

/// Failure tearing down an allocator engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyError {
  /// `destroy` was already called on this instance.
  AlreadyDestroyed,
}

impl fmt::Display for DestroyError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      DestroyError::AlreadyDestroyed => write!(f, "allocator was already destroyed"),
    }
  }
}

impl std::error::Error for DestroyError {}

/// Failure releasing a previously allocated pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseError {
  /// The pointer does not lie within the managed region.
  OutOfRangePointer,
  /// The header or metadata record decoded from the pointer failed a
  /// self-identity check (data-pointer mismatch, bitmap index out of
  /// range, level out of range, null list pointer).
  CorruptMetadata(&'static str),
  /// The block indicated by the pointer is already marked free.
  DoubleFree,
}

impl fmt::Display for ReleaseError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ReleaseError::OutOfRangePointer => write!(f, "pointer lies outside the managed region"),
      ReleaseError::CorruptMetadata(reason) => write!(f, "corrupt metadata: {reason}"),
      ReleaseError::DoubleFree => write!(f, "block is already free"),
    }
  }
}

impl std::error::Error for ReleaseError {}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn display_messages_are_non_empty_and_stable() {
    assert_eq!(
      InitError::InvalidArgument("num_slots must be nonzero").to_string(),
      "invalid argument: num_slots must be nonzero"
    );
    assert_eq!(InitError::OutOfMemory.to_string(), "mmap failed to reserve the backing region");
    assert_eq!(DestroyError::AlreadyDestroyed.to_string(), "allocator was already destroyed");
    assert_eq!(ReleaseError::OutOfRangePointer.to_string(), "pointer lies outside the managed region");
    assert_eq!(ReleaseError::DoubleFree.to_string(), "block is already free");
  }
}
