//! Memory management subsystem.
//!
//! The block model lives in [`block`], the first-fit allocation core in
//! [`heap`]. The interrupt-safe global handle is in [`crate::allocator`].

pub mod block;
pub mod heap;

pub use block::{Block, HEADER_SIZE, MIN_ALIGN};
pub use heap::{AllocError, Blocks, Heap, HeapStats};
