use std::ptr::NonNull;

use crate::{
    block::{FreeBlock, Link},
    size_class::NUM_SIZE_CLASSES,
};

/// One singly linked list of free blocks per size class.
///
/// The lists are intrusive: each node is the [`FreeBlock`] header written
/// into the free block itself, so the table never allocates.
///
/// ```text
///  class   head
///  +----+
///  |  0 | --> [ 8B ] --> [ 8B ] --> [ 8B ]
///  +----+
///  |  1 | --> (empty)
///  +----+
///  |  2 | --> [24B ] --> [24B ]
///  +----+
///  | .. |
///  +----+
///  | 15 | --> [128B]
///  +----+
/// ```
///
/// Lists are LIFO: the most recently pushed block is the next one popped.
pub(crate) struct FreeListTable {
    heads: [Link; NUM_SIZE_CLASSES],
}

impl FreeListTable {
    /// Creates a table where every list is empty.
    pub const fn new() -> Self {
        Self {
            heads: [None; NUM_SIZE_CLASSES],
        }
    }

    /// Unlinks and returns the head of `class`.
    #[inline]
    pub fn pop(&mut self, class: usize) -> Option<NonNull<u8>> {
        let head = self.heads[class]?;
        // Blocks on a list always carry a valid header.
        self.heads[class] = unsafe { FreeBlock::next(head) };

        Some(head.cast())
    }

    /// Pushes `addr` onto the head of `class`.
    ///
    /// **SAFETY**: `addr` must be a block of at least the class size that
    /// the pool owns and that is on no list.
    #[inline]
    pub unsafe fn push(&mut self, class: usize, addr: NonNull<u8>) {
        self.heads[class] = Some(unsafe { FreeBlock::write(addr, self.heads[class]) });
    }

    /// Threads `count` consecutive blocks of `size` bytes starting at `first`
    /// into `class`, in address order, in front of whatever the list holds.
    ///
    /// **SAFETY**: `[first, first + count * size)` must be owned by the pool
    /// and on no list; `size` must be the block size of `class`.
    pub unsafe fn push_run(&mut self, class: usize, first: NonNull<u8>, size: usize, count: usize) {
        // Walk backwards so each block can link to the one already written after it.
        for i in (0..count).rev() {
            unsafe { self.push(class, first.add(i * size)) };
        }
    }

    /// Removes one block from the first non-empty class at or above `from`.
    ///
    /// Returns the block and the class it came from.
    pub fn take_donor(&mut self, from: usize) -> Option<(NonNull<u8>, usize)> {
        (from..NUM_SIZE_CLASSES).find_map(|class| self.pop(class).map(|addr| (addr, class)))
    }

    /// Number of blocks on the list of `class`. Walks the list.
    pub fn len(&self, class: usize) -> usize {
        let mut current = self.heads[class];
        let mut len = 0;

        while let Some(block) = current {
            len += 1;
            current = unsafe { FreeBlock::next(block) };
        }

        len
    }
}
