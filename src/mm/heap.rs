//! First-fit heap core.
//!
//! [`Heap`] owns one contiguous memory region and subdivides it into a singly
//! linked, address-ordered chain of blocks (see [`super::block`]). The chain
//! always tiles the region exactly: the byte after one block's payload is the
//! next block's header, and the last block's payload ends at the region end.
//!
//! Allocation walks the chain front to back and takes the first free block
//! that fits (first-fit: fast, accepts fragmentation). Oversized blocks are
//! split unless the excess is too small to be independently useful. Release
//! only flips the free flag; merging of adjacent free blocks is deferred to a
//! coalescing pass on the next allocation.
//!
//! `Heap` itself is not interrupt-safe; the global handle in
//! [`crate::allocator`] wraps it in an [`crate::sync::IrqMutex`].

use core::fmt;
use core::ptr::NonNull;

use crate::mm::block::{Block, BlockHeader, HEADER_SIZE, MIN_ALIGN, NIL, align_up};
use crate::pr_debug;

/// Allocation failure.
///
/// The allocator reports exactly one error: no free block is large enough,
/// or the region is too small (or absent) to hold even one block. There is no
/// recovery path; the region never grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    OutOfMemory,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocError::OutOfMemory => write!(f, "out of memory"),
        }
    }
}

/// Heap usage counters, computed by walking the chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// Total region size in bytes, headers included.
    pub total: usize,
    /// Payload bytes in in-use blocks.
    pub used: usize,
    /// Payload bytes in free blocks.
    pub free: usize,
    /// Number of blocks in the chain.
    pub blocks: usize,
}

/// First-fit allocator over a single fixed region.
///
/// Construct with [`Heap::empty`], hand over the region once with
/// [`Heap::set_region`], then call [`Heap::allocate`] / [`Heap::release`].
/// The head block is established lazily on the first allocation.
pub struct Heap {
    base: *mut u8,
    size: usize,
    initialized: bool,
}

// SAFETY: Heap exclusively owns the region behind `base` (the caller of
// `set_region` guarantees it) and the raw pointer is never handed out except
// as payload pointers into in-use blocks. Moving the Heap between contexts
// moves that ownership with it.
unsafe impl Send for Heap {}

impl Heap {
    /// Create a heap with no region attached. Every allocation fails with
    /// `OutOfMemory` until [`Heap::set_region`] is called.
    pub const fn empty() -> Self {
        Self {
            base: core::ptr::null_mut(),
            size: 0,
            initialized: false,
        }
    }

    /// Hand over the memory region this heap manages.
    ///
    /// Supplied exactly once, before first use; later calls are ignored.
    /// The first allocation lays down the initial free block spanning the
    /// whole region.
    ///
    /// # Safety
    /// The caller must ensure:
    /// - `[base, base + size)` is valid, unused memory reserved for this heap
    ///   for the rest of the kernel's lifetime
    /// - `base` is aligned to [`MIN_ALIGN`]
    /// - no other code writes to the region while the heap is live
    pub unsafe fn set_region(&mut self, base: *mut u8, size: usize) {
        debug_assert!(!base.is_null(), "heap region base is null");
        debug_assert_eq!(
            base as usize % MIN_ALIGN,
            0,
            "heap region base not {}-byte aligned: {:p}",
            MIN_ALIGN,
            base
        );
        if self.base.is_null() {
            self.base = base;
            self.size = size;
        }
    }

    /// Allocate a payload of at least `size` bytes.
    ///
    /// First-fit over the address-ordered chain. The selected block is split
    /// when the excess would make a useful free block on its own; otherwise
    /// the caller receives the whole block unshrunk. After a successful
    /// grab, a full coalescing pass merges any adjacent free blocks left
    /// over from earlier releases.
    ///
    /// Fails with `OutOfMemory` when `size` is zero, exceeds the largest
    /// payload a single block could hold, or no free block fits even after
    /// coalescing. Failure leaves the chain unchanged apart from merging.
    pub fn allocate(&mut self, size: usize) -> Result<NonNull<u8>, AllocError> {
        self.ensure_initialized()?;
        if size == 0 || size > self.size - HEADER_SIZE {
            return Err(AllocError::OutOfMemory);
        }
        let size = align_up(size, MIN_ALIGN);

        let offset = match self.first_fit(size) {
            Some(offset) => offset,
            None => {
                // Merging free neighbors may uncover a block large enough.
                self.coalesce();
                match self.first_fit(size) {
                    Some(offset) => offset,
                    None => {
                        pr_debug!("allocate({}) failed: out of memory", size);
                        return Err(AllocError::OutOfMemory);
                    }
                }
            }
        };

        self.take(offset, size);
        self.coalesce();

        // SAFETY: `offset` is a live header inside the region, so the payload
        // pointer is in bounds and non-null.
        let payload = unsafe { self.base.add(offset + HEADER_SIZE) };
        NonNull::new(payload).ok_or(AllocError::OutOfMemory)
    }

    /// Release a payload pointer previously returned by [`Heap::allocate`].
    ///
    /// A null pointer is ignored. The owning block is located at a fixed
    /// offset before the payload and marked free; no merging happens here
    /// (coalescing is deferred to the next allocation).
    ///
    /// Passing a pointer that did not come from this heap, or releasing the
    /// same pointer twice, is a caller contract violation with undefined
    /// results; it is not validated at runtime.
    pub fn release(&mut self, ptr: *mut u8) {
        if ptr.is_null() || !self.initialized {
            return;
        }
        let addr = ptr as usize;
        let base = self.base as usize;
        debug_assert!(
            addr >= base + HEADER_SIZE && addr < base + self.size,
            "released pointer {:p} outside heap region",
            ptr
        );
        let offset = addr - base - HEADER_SIZE;
        self.block_mut(offset).free = true;
    }

    /// First block in the chain, or `None` before the first allocation.
    pub fn head(&self) -> Option<Block> {
        if self.initialized {
            Some(self.view(0))
        } else {
            None
        }
    }

    /// Iterate the chain in address order.
    pub fn blocks(&self) -> Blocks<'_> {
        Blocks {
            heap: self,
            offset: if self.initialized { Some(0) } else { None },
        }
    }

    /// Usage counters for the whole region.
    pub fn stats(&self) -> HeapStats {
        let mut stats = HeapStats {
            total: self.size,
            ..HeapStats::default()
        };
        for block in self.blocks() {
            stats.blocks += 1;
            if block.free {
                stats.free += block.size;
            } else {
                stats.used += block.size;
            }
        }
        stats
    }

    /// Lay down the initial free block spanning the whole region.
    ///
    /// No-op once the head block exists. Fails when no region was supplied
    /// or the region cannot hold a header plus any payload.
    fn ensure_initialized(&mut self) -> Result<(), AllocError> {
        if self.initialized {
            return Ok(());
        }
        if self.base.is_null() || self.size <= HEADER_SIZE {
            return Err(AllocError::OutOfMemory);
        }
        let payload = self.size - HEADER_SIZE;
        let head = self.block_mut(0);
        head.size = payload;
        head.next = NIL;
        head.free = true;
        self.initialized = true;
        pr_debug!("heap initialized: {} bytes ({} payload)", self.size, payload);
        Ok(())
    }

    /// Walk the chain from the head and return the offset of the first free
    /// block whose payload fits `size`. The search stops at the first fit.
    fn first_fit(&self, size: usize) -> Option<usize> {
        let mut offset = 0;
        loop {
            let header = self.block(offset);
            if header.free && header.size >= size {
                return Some(offset);
            }
            if header.next == NIL {
                return None;
            }
            offset = header.next;
        }
    }

    /// Mark the block at `offset` in-use, splitting off the tail when the
    /// excess can hold a header plus a minimum useful payload.
    fn take(&mut self, offset: usize, size: usize) {
        let splittable = self.block(offset).size >= size + HEADER_SIZE + MIN_ALIGN;
        if splittable {
            self.split(offset, size);
        }
        self.block_mut(offset).free = false;
    }

    /// Shrink the block at `offset` to exactly `size` payload bytes and
    /// create a free block covering the remainder right after it.
    fn split(&mut self, offset: usize, size: usize) {
        let (old_size, old_next) = {
            let header = self.block(offset);
            (header.size, header.next)
        };
        let remainder_offset = offset + HEADER_SIZE + size;

        let remainder = self.block_mut(remainder_offset);
        remainder.size = old_size - size - HEADER_SIZE;
        remainder.next = old_next;
        remainder.free = true;

        let header = self.block_mut(offset);
        header.size = size;
        header.next = remainder_offset;
    }

    /// Merge every run of adjacent free blocks into one block.
    ///
    /// Runs to fixed point: after the pass no two consecutive blocks are both
    /// free. Merging absorbs the second block's header into the first block's
    /// payload, so the chain keeps tiling the region exactly.
    fn coalesce(&mut self) {
        if !self.initialized {
            return;
        }
        let mut offset = 0;
        loop {
            let (free, next) = {
                let header = self.block(offset);
                (header.free, header.next)
            };
            if next == NIL {
                break;
            }
            let (next_free, next_size, next_next) = {
                let header = self.block(next);
                (header.free, header.size, header.next)
            };
            if free && next_free {
                let header = self.block_mut(offset);
                header.size += HEADER_SIZE + next_size;
                header.next = next_next;
                // Stay on the grown block; its new neighbor may be free too.
            } else {
                offset = next;
            }
        }
    }

    fn view(&self, offset: usize) -> Block {
        let header = self.block(offset);
        Block {
            offset,
            size: header.size,
            free: header.free,
        }
    }

    fn header_ptr(&self, offset: usize) -> *mut BlockHeader {
        debug_assert!(offset % MIN_ALIGN == 0, "misaligned header offset {}", offset);
        debug_assert!(
            offset + HEADER_SIZE <= self.size,
            "header offset {} outside region of {} bytes",
            offset,
            self.size
        );
        // SAFETY: offset is bounds-checked above and the region behind `base`
        // is exclusively owned by this heap (set_region contract).
        unsafe { self.base.add(offset) as *mut BlockHeader }
    }

    fn block(&self, offset: usize) -> &BlockHeader {
        // SAFETY: header_ptr yields an in-bounds, MIN_ALIGN-aligned pointer
        // and &self prevents concurrent mutation through this heap.
        unsafe { &*self.header_ptr(offset) }
    }

    fn block_mut(&mut self, offset: usize) -> &mut BlockHeader {
        // SAFETY: as for `block`, with &mut self granting exclusive access.
        unsafe { &mut *self.header_ptr(offset) }
    }
}

/// Iterator over [`Block`] snapshots in address order.
pub struct Blocks<'a> {
    heap: &'a Heap,
    offset: Option<usize>,
}

impl Iterator for Blocks<'_> {
    type Item = Block;

    fn next(&mut self) -> Option<Block> {
        let offset = self.offset?;
        let header = self.heap.block(offset);
        self.offset = if header.next == NIL {
            None
        } else {
            Some(header.next)
        };
        Some(self.heap.view(offset))
    }
}
