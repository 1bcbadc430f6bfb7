//! Heap block model.
//!
//! Every block in the heap is a slice of the managed region: a header written
//! into the region memory, immediately followed by the payload handed to the
//! caller. Blocks are addressed by their header's byte offset from the region
//! base, and the chain link is likewise an offset rather than a raw pointer,
//! so traversal can be bounds-checked against the region size.

use core::mem::size_of;

/// Alignment of every header offset and payload pointer.
///
/// Matches the header alignment, so a region whose base is 16-aligned keeps
/// every payload 16-aligned as long as block sizes stay multiples of 16.
pub const MIN_ALIGN: usize = 16;

/// Bytes of per-block overhead.
pub const HEADER_SIZE: usize = size_of::<BlockHeader>();

/// Chain terminator for [`BlockHeader::next`].
pub(crate) const NIL: usize = usize::MAX;

/// In-region block header.
///
/// `size` counts payload bytes only; the payload starts `HEADER_SIZE` bytes
/// after the header. `next` is the offset of the following header relative to
/// the region base, `NIL` for the last block in the chain.
#[repr(C, align(16))]
pub(crate) struct BlockHeader {
    pub size: usize,
    pub next: usize,
    pub free: bool,
}

/// Read-only snapshot of one block, for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    /// Header offset from the region base.
    pub offset: usize,
    /// Payload size in bytes.
    pub size: usize,
    /// Whether the block is currently free.
    pub free: bool,
}

/// Round `value` up to the next multiple of `align` (a power of two).
pub(crate) const fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_size_keeps_payloads_aligned() {
        // Header offsets advance by HEADER_SIZE + rounded payload sizes, so
        // alignment of the whole chain hinges on this.
        assert_eq!(HEADER_SIZE % MIN_ALIGN, 0);
        assert_eq!(core::mem::align_of::<BlockHeader>(), MIN_ALIGN);
    }

    #[test]
    fn align_up_rounds_to_next_multiple() {
        assert_eq!(align_up(0, 16), 0);
        assert_eq!(align_up(1, 16), 16);
        assert_eq!(align_up(16, 16), 16);
        assert_eq!(align_up(17, 16), 32);
        assert_eq!(align_up(100, 16), 112);
    }
}
