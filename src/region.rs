use std::ptr::NonNull;

/// The byte range `[start, end)` the pool carves blocks from.
///
/// `start` only moves forward. When the pool grows the whole range is
/// replaced, so a region never spans two system allocations.
///
/// ```text
///   carved blocks        available
/// +---+---+---+---+-------------------+
/// |   |   |   |   |                   |
/// +---+---+---+---+-------------------+
///                 ^                   ^
///               start                end
/// ```
pub(crate) struct Region {
    start: *mut u8,
    end: *mut u8,
}

impl Region {
    /// Empty region. Every carve attempt on it triggers growth.
    pub const fn empty() -> Self {
        Self {
            start: std::ptr::null_mut(),
            end: std::ptr::null_mut(),
        }
    }

    /// Region covering `len` bytes from `start`.
    ///
    /// **SAFETY**: `[start, start + len)` must be owned by the pool.
    pub unsafe fn new(start: NonNull<u8>, len: usize) -> Self {
        Self {
            start: start.as_ptr(),
            end: unsafe { start.as_ptr().add(len) },
        }
    }

    /// Bytes left between `start` and `end`.
    #[inline]
    pub fn available(&self) -> usize {
        self.end as usize - self.start as usize
    }

    /// Cuts `len` bytes off the front of the region.
    ///
    /// Callers check [`Self::available`] first; `len` must be non-zero and no
    /// larger than what is left.
    #[inline]
    pub fn carve(&mut self, len: usize) -> NonNull<u8> {
        debug_assert!(len > 0 && len <= self.available());
        let carved = self.start;
        self.start = carved.wrapping_add(len);
        // `len > 0` and `len <= available` means the region was not empty,
        // so `start` was a real, non-null address.
        unsafe { NonNull::new_unchecked(carved) }
    }

    /// Takes whatever is left in the region, leaving it empty.
    pub fn take_leftover(&mut self) -> Option<(NonNull<u8>, usize)> {
        let len = self.available();
        let start = NonNull::new(self.start)?;
        *self = Self::empty();

        (len > 0).then_some((start, len))
    }
}
