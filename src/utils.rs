//! Helper functions that don't particularly belong to any concrete module of the allocator.

/// It aligns `to_be_aligned` using `aligment`, which must be a power of two.
///
/// This is used to round request sizes up to their size class and to round
/// the growth term of the pool to a multiple of [`crate::size_class::ALIGN`],
/// so every block carved from a region keeps the region's alignment.
#[inline]
pub const fn align(to_be_aligned: usize, aligment: usize) -> usize {
    (to_be_aligned + aligment - 1) & !(aligment - 1)
}
