//! First-fit kernel heap allocator.
//!
//! This crate is the dynamic-memory subsystem of a freestanding kernel. It
//! manages a single contiguous physical memory region handed over by the boot
//! code and serves allocation requests before paging or any general-purpose
//! memory manager exists.
//!
//! The region is subdivided into an address-ordered chain of blocks, each
//! described by a small header written into the region itself. Allocation is
//! first-fit with block splitting; freed blocks are merged lazily by a
//! coalescing pass that runs on the next allocation, not at release time.
//!
//! ## Usage
//!
//! ```ignore
//! // Boot code hands over the usable region exactly once.
//! unsafe { kheap::KERNEL_HEAP.init(heap_base, heap_size) };
//!
//! let ptr = kheap::KERNEL_HEAP.allocate(256)?;
//! kheap::KERNEL_HEAP.release(ptr.as_ptr());
//! ```
//!
//! Every entry point of [`KernelHeap`] masks interrupts for the duration of
//! the chain mutation (see [`sync::IrqMutex`]), so interrupt handlers may
//! call the allocator without corrupting the chain.

#![cfg_attr(not(test), no_std)]

pub mod allocator;
pub mod arch;
pub mod mm;
pub mod sync;

pub use allocator::{KERNEL_HEAP, KernelHeap};
pub use mm::{AllocError, Block, HEADER_SIZE, Heap, HeapStats, MIN_ALIGN};

/// Debug print that only exists in host test builds; compiled out of kernel
/// builds entirely.
#[cfg(test)]
#[macro_export]
macro_rules! pr_debug {
    ($($arg:tt)*) => (std::println!("[kheap] {}", format_args!($($arg)*)));
}

#[cfg(not(test))]
#[macro_export]
macro_rules! pr_debug {
    ($($arg:tt)*) => {};
}
