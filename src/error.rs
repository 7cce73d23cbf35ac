use thiserror::Error;

/// Errors reported by the allocators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
    /// The system allocator could not provide `size` bytes and no OOM
    /// handler was able to recover.
    #[error("out of memory: system allocator could not provide {size} bytes")]
    OutOfMemory { size: usize },
    /// `count` objects of `elem_size` bytes do not fit in `usize`.
    #[error("capacity overflow: {count} objects of {elem_size} bytes")]
    CapacityOverflow { count: usize, elem_size: usize },
}
