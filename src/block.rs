use std::ptr::NonNull;

/// Non-null pointer to the next free block of the same class.
pub(crate) type Link = Option<NonNull<FreeBlock>>;

/// Header written at the front of a block while it sits on a free list.
///
/// A free block has no other metadata: its first word is the link, the rest
/// of its bytes are garbage. Once the block is handed out the caller owns
/// every byte, header included, so the link is only meaningful while the
/// block is on a list.
///
/// ```text
///      free                          allocated
/// +---------------+              +---------------+
/// |  next: Link   | ---> ...     |               |
/// +---------------+              |    payload    |
/// |   (unused)    |              |               |
/// +---------------+              +---------------+
/// ```
#[repr(C)]
pub(crate) struct FreeBlock {
    pub next: Link,
}

impl FreeBlock {
    /// Writes a header linking `addr` to `next` and returns it as a block.
    ///
    /// **SAFETY**: `addr` must be valid for writes of one pointer and aligned
    /// to [`crate::size_class::ALIGN`], and the caller must own those bytes.
    #[inline]
    pub unsafe fn write(addr: NonNull<u8>, next: Link) -> NonNull<FreeBlock> {
        let block = addr.cast::<FreeBlock>();
        unsafe { block.as_ptr().write(FreeBlock { next }) };
        block
    }

    /// Reads the link of a block that is on a free list.
    ///
    /// **SAFETY**: `block` must currently be on a free list.
    #[inline]
    pub unsafe fn next(block: NonNull<FreeBlock>) -> Link {
        unsafe { (*block.as_ptr()).next }
    }
}
