//! Leaf data structures the allocator engines depend on.

pub mod bitmap;
pub mod linked_list;

pub use bitmap::Bitmap;
pub use linked_list::{DoubleLinkedList, Node};
