//! Global kernel heap handle.
//!
//! Wraps the first-fit [`Heap`] core in an [`IrqMutex`] so that every entry
//! point runs with interrupts masked: an interrupt handler calling the
//! allocator can never observe (or corrupt) a half-mutated block chain. The
//! prior interrupt state is restored on every exit path when the lock guard
//! drops.
//!
//! A `GlobalAlloc` impl is provided so a kernel binary can route Rust's
//! `alloc` machinery through the same heap:
//!
//! ```ignore
//! #[global_allocator]
//! static HEAP: kheap::KernelHeap = kheap::KernelHeap::new();
//! ```

use core::alloc::{GlobalAlloc, Layout};
use core::ptr::{self, NonNull};

use crate::mm::block::{Block, MIN_ALIGN};
use crate::mm::heap::{AllocError, Heap, HeapStats};
use crate::sync::IrqMutex;

/// Interrupt-safe handle around the heap core.
pub struct KernelHeap {
    heap: IrqMutex<Heap>,
}

/// Process-wide heap instance.
pub static KERNEL_HEAP: KernelHeap = KernelHeap::new();

impl KernelHeap {
    /// Create a handle with no region attached (must call [`KernelHeap::init`]
    /// before allocations can succeed).
    pub const fn new() -> Self {
        Self {
            heap: IrqMutex::new(Heap::empty()),
        }
    }

    /// Hand over the usable memory region reported by the boot memory map.
    ///
    /// Called exactly once, before first use; later calls are ignored.
    ///
    /// # Safety
    /// Same contract as [`Heap::set_region`]: `[base, base + size)` must be
    /// valid memory reserved exclusively for this heap, with `base` aligned
    /// to [`MIN_ALIGN`].
    pub unsafe fn init(&self, base: *mut u8, size: usize) {
        unsafe { self.heap.lock().set_region(base, size) };
    }

    /// Allocate `size` bytes. See [`Heap::allocate`].
    pub fn allocate(&self, size: usize) -> Result<NonNull<u8>, AllocError> {
        self.heap.lock().allocate(size)
    }

    /// Release a pointer returned by [`KernelHeap::allocate`]. Null is
    /// ignored. See [`Heap::release`] for the caller contract.
    pub fn release(&self, ptr: *mut u8) {
        self.heap.lock().release(ptr);
    }

    /// Snapshot of the first block, for diagnostics.
    pub fn head(&self) -> Option<Block> {
        self.heap.lock().head()
    }

    /// Run `f` over a snapshot of every block, in address order.
    ///
    /// Closure form because the chain cannot be iterated outside the lock.
    pub fn blocks_with<F: FnMut(Block)>(&self, mut f: F) {
        for block in self.heap.lock().blocks() {
            f(block);
        }
    }

    /// Heap usage counters.
    pub fn stats(&self) -> HeapStats {
        self.heap.lock().stats()
    }
}

impl Default for KernelHeap {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl GlobalAlloc for KernelHeap {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        // Payloads are MIN_ALIGN-aligned by construction; stricter layouts
        // cannot be honored.
        if layout.align() > MIN_ALIGN {
            return ptr::null_mut();
        }
        match self.heap.lock().allocate(layout.size().max(1)) {
            Ok(payload) => payload.as_ptr(),
            Err(AllocError::OutOfMemory) => ptr::null_mut(),
        }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        // The owning block is found from the pointer itself; the layout is
        // not needed.
        self.heap.lock().release(ptr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mm::block::HEADER_SIZE;

    const REGION_SIZE: usize = 4096;

    #[repr(align(16))]
    struct TestRegion([u8; REGION_SIZE]);

    #[test]
    fn handle_allocate_and_release() {
        let mut region = TestRegion([0; REGION_SIZE]);
        let heap = KernelHeap::new();
        unsafe { heap.init(region.0.as_mut_ptr(), REGION_SIZE) };

        let ptr = heap.allocate(256).unwrap();
        assert!(!heap.head().unwrap().free);

        heap.release(ptr.as_ptr());
        assert!(heap.head().unwrap().free);

        let stats = heap.stats();
        assert_eq!(stats.total, REGION_SIZE);
        assert_eq!(stats.used, 0);
    }

    #[test]
    fn head_snapshot_uses_the_subsystem_block_type() {
        let mut region = TestRegion([0; REGION_SIZE]);
        let heap = KernelHeap::new();
        unsafe { heap.init(region.0.as_mut_ptr(), REGION_SIZE) };

        heap.allocate(64).unwrap();

        // The snapshot type is the one the mm subsystem exports.
        let head: crate::mm::Block = heap.head().unwrap();
        assert_eq!(head.offset, 0);
        assert!(!head.free);
    }

    #[test]
    fn blocks_with_visits_whole_chain() {
        let mut region = TestRegion([0; REGION_SIZE]);
        let heap = KernelHeap::new();
        unsafe { heap.init(region.0.as_mut_ptr(), REGION_SIZE) };

        heap.allocate(64).unwrap();
        heap.allocate(64).unwrap();

        let mut end = 0;
        heap.blocks_with(|block| {
            assert_eq!(block.offset, end);
            end = block.offset + HEADER_SIZE + block.size;
        });
        assert_eq!(end, REGION_SIZE);
    }

    #[test]
    fn global_alloc_round_trip() {
        let mut region = TestRegion([0; REGION_SIZE]);
        let heap = KernelHeap::new();
        unsafe { heap.init(region.0.as_mut_ptr(), REGION_SIZE) };

        let layout = Layout::from_size_align(64, 8).unwrap();
        let ptr = unsafe { heap.alloc(layout) };
        assert!(!ptr.is_null());
        assert_eq!(ptr as usize % MIN_ALIGN, 0);

        unsafe {
            ptr.write_bytes(0xAB, 64);
            heap.dealloc(ptr, layout);
        }

        // The freed block is reused first-fit.
        let again = unsafe { heap.alloc(layout) };
        assert_eq!(again, ptr);
    }

    #[test]
    fn global_alloc_refuses_overaligned_layouts() {
        let mut region = TestRegion([0; REGION_SIZE]);
        let heap = KernelHeap::new();
        unsafe { heap.init(region.0.as_mut_ptr(), REGION_SIZE) };

        let layout = Layout::from_size_align(64, 64).unwrap();
        assert!(unsafe { heap.alloc(layout) }.is_null());
    }

    #[test]
    fn global_alloc_without_region_returns_null() {
        let heap = KernelHeap::new();
        let layout = Layout::from_size_align(64, 8).unwrap();
        assert!(unsafe { heap.alloc(layout) }.is_null());
    }
}
