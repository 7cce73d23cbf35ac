//! Size classes for pool allocations.
//!
//! Requests up to [`MAX_BLOCK`] bytes are rounded up to a multiple of
//! [`ALIGN`] and served from one of [`NUM_SIZE_CLASSES`] free lists:
//!
//! ```text
//! class:   0   1   2   3  ...  14   15
//! bytes:   8  16  24  32  ... 120  128
//! ```
//!
//! Anything larger never touches the pool and goes to the primary allocator.

use std::mem;

use crate::{block::FreeBlock, utils::align};

/// Block granularity and alignment of every pool block (bytes).
pub const ALIGN: usize = 8;

/// Largest request served by the pool. Above this, use the primary allocator.
pub const MAX_BLOCK: usize = 128;

/// Number of free lists, one per block size.
pub const NUM_SIZE_CLASSES: usize = MAX_BLOCK / ALIGN;

/// Default number of blocks requested per refill.
pub const BATCH: usize = 20;

// A free block has to hold its own link.
const _: () = assert!(mem::size_of::<FreeBlock>() <= ALIGN);
const _: () = assert!(mem::align_of::<FreeBlock>() <= ALIGN);
const _: () = assert!(ALIGN.is_power_of_two() && MAX_BLOCK % ALIGN == 0);

/// Rounds `bytes` up to the block size of its class.
#[inline]
pub const fn round_up(bytes: usize) -> usize {
    align(bytes, ALIGN)
}

/// Free list index for a request of `bytes`.
///
/// Zero-byte requests share class 0. Callers must not pass sizes above
/// [`MAX_BLOCK`].
#[inline]
pub const fn class_index(bytes: usize) -> usize {
    debug_assert!(bytes <= MAX_BLOCK);
    if bytes == 0 {
        return 0;
    }
    (bytes + ALIGN - 1) / ALIGN - 1
}

/// Block size served by class `index`.
#[inline]
pub const fn class_size(index: usize) -> usize {
    debug_assert!(index < NUM_SIZE_CLASSES);
    (index + 1) * ALIGN
}
