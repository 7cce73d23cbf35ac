//! Typed facade used by containers: "`count` objects of `T`" in, byte
//! requests out.
//!
//! The facade never touches the memory it hands out. Constructing and
//! dropping values in it is up to the caller.

use std::{marker::PhantomData, mem, ptr::NonNull};

use crate::{
    error::AllocError,
    kernel::SystemMemory,
    pool::PoolAllocator,
    primary::PrimaryAllocator,
    size_class::ALIGN,
};

/// Byte-level `(allocate, deallocate)` capability pair shared by both tiers.
pub trait RawAllocator {
    fn allocate(&self, size: usize) -> Result<NonNull<u8>, AllocError>;

    /// **SAFETY**: `addr` must come from [`RawAllocator::allocate`] on the
    /// same allocator with the same `size`, and must not be used afterwards.
    unsafe fn deallocate(&self, addr: NonNull<u8>, size: usize);
}

impl<M: SystemMemory> RawAllocator for PrimaryAllocator<M> {
    #[inline]
    fn allocate(&self, size: usize) -> Result<NonNull<u8>, AllocError> {
        PrimaryAllocator::allocate(self, size)
    }

    #[inline]
    unsafe fn deallocate(&self, addr: NonNull<u8>, size: usize) {
        unsafe { PrimaryAllocator::deallocate(self, addr, size) }
    }
}

impl<M: SystemMemory> RawAllocator for PoolAllocator<M> {
    #[inline]
    fn allocate(&self, size: usize) -> Result<NonNull<u8>, AllocError> {
        PoolAllocator::allocate(self, size)
    }

    #[inline]
    unsafe fn deallocate(&self, addr: NonNull<u8>, size: usize) {
        unsafe { PoolAllocator::deallocate(self, addr, size) }
    }
}

impl<A: RawAllocator + ?Sized> RawAllocator for &A {
    #[inline]
    fn allocate(&self, size: usize) -> Result<NonNull<u8>, AllocError> {
        (**self).allocate(size)
    }

    #[inline]
    unsafe fn deallocate(&self, addr: NonNull<u8>, size: usize) {
        unsafe { (**self).deallocate(addr, size) }
    }
}

/// Allocates storage for values of `T` from the backend `A`.
///
/// Pool blocks are only [`ALIGN`]-aligned, so types with a stricter
/// alignment are rejected when the allocator is created.
pub struct TypedAllocator<T, A> {
    backend: A,
    marker: PhantomData<fn() -> T>,
}

impl<T, A: Clone> Clone for TypedAllocator<T, A> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            marker: PhantomData,
        }
    }
}

impl<T, A: RawAllocator> TypedAllocator<T, A> {
    pub fn new(backend: A) -> Self {
        const { assert!(mem::align_of::<T>() <= ALIGN, "type alignment exceeds pool block alignment") };

        Self {
            backend,
            marker: PhantomData,
        }
    }

    #[inline]
    pub fn backend(&self) -> &A {
        &self.backend
    }

    /// Storage for `count` values of `T`.
    ///
    /// When no bytes are needed (`count == 0` or a zero-sized `T`) a dangling
    /// pointer is returned and the backend is not called.
    pub fn allocate(&self, count: usize) -> Result<NonNull<T>, AllocError> {
        match Self::byte_size(count)? {
            0 => Ok(NonNull::dangling()),
            size => Ok(self.backend.allocate(size)?.cast()),
        }
    }

    /// Storage for a single `T`.
    pub fn allocate_one(&self) -> Result<NonNull<T>, AllocError> {
        self.allocate(1)
    }

    /// Gives back storage obtained from [`Self::allocate`] with the same `count`.
    ///
    /// **SAFETY**: `addr` must come from [`Self::allocate`] on this allocator
    /// with the same `count`, and must not be used afterwards. Any values in
    /// it must already have been dropped.
    pub unsafe fn deallocate(&self, addr: NonNull<T>, count: usize) {
        // `allocate` succeeded with this count, so the size cannot overflow.
        let size = count.wrapping_mul(mem::size_of::<T>());
        if size != 0 {
            unsafe { self.backend.deallocate(addr.cast(), size) }
        }
    }

    /// **SAFETY**: see [`Self::deallocate`].
    pub unsafe fn deallocate_one(&self, addr: NonNull<T>) {
        unsafe { self.deallocate(addr, 1) }
    }

    /// Largest `count` this allocator is meant to be asked for.
    pub fn max_size(&self) -> usize {
        (u32::MAX as usize / mem::size_of::<T>().max(1)).max(1)
    }

    /// Number of values that fit in a 4 KiB page, at least one.
    pub fn init_page_size(&self) -> usize {
        (4096 / mem::size_of::<T>().max(1)).max(1)
    }

    fn byte_size(count: usize) -> Result<usize, AllocError> {
        let elem_size = mem::size_of::<T>();

        count
            .checked_mul(elem_size)
            .ok_or(AllocError::CapacityOverflow { count, elem_size })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::PoolConfig, testing::ScriptedMemory};

    #[derive(Debug, PartialEq)]
    struct Point {
        x: u32,
        y: u32,
    }

    fn scripted_pool() -> (PoolAllocator<ScriptedMemory>, ScriptedMemory) {
        let memory = ScriptedMemory::new();
        (PoolAllocator::with_config(memory.clone(), PoolConfig::default()), memory)
    }

    #[test]
    fn zero_count_skips_backend() {
        let (pool, memory) = scripted_pool();
        let typed = TypedAllocator::<u64, _>::new(&pool);

        let addr = typed.allocate(0).unwrap();
        assert_eq!(addr, NonNull::dangling());
        unsafe { typed.deallocate(addr, 0) };

        assert_eq!(memory.requests(), 0);
        assert_eq!(pool.stats().heap_size, 0);
    }

    #[test]
    fn zero_sized_type_skips_backend() {
        let (pool, memory) = scripted_pool();
        let typed = TypedAllocator::<(), _>::new(&pool);

        let addr = typed.allocate(1000).unwrap();
        unsafe { typed.deallocate(addr, 1000) };
        assert_eq!(memory.requests(), 0);
    }

    #[test]
    fn small_counts_use_pool_classes() {
        let (pool, _memory) = scripted_pool();
        let typed = TypedAllocator::<u32, _>::new(&pool);

        // 5 * 4 = 20 bytes, served from the 24 byte class.
        let addr = typed.allocate(5).unwrap();
        assert_eq!(pool.stats().free_blocks[2], 19);

        unsafe {
            for i in 0..5 {
                addr.as_ptr().add(i).write(i as u32 * 10);
            }
            assert_eq!(*addr.as_ptr().add(4), 40);

            typed.deallocate(addr, 5);
        }
        assert_eq!(pool.stats().free_blocks[2], 20);
    }

    #[test]
    fn large_counts_use_primary() {
        let (pool, memory) = scripted_pool();
        let typed = TypedAllocator::<u64, _>::new(&pool);

        let addr = typed.allocate(100).unwrap();
        assert_eq!(memory.granted_sizes(), vec![800]);
        assert_eq!(pool.stats().heap_size, 0);

        unsafe { typed.deallocate(addr, 100) };
    }

    #[test]
    fn single_object_round_trip() {
        let typed = TypedAllocator::<Point, _>::new(PrimaryAllocator::new());

        unsafe {
            let addr = typed.allocate_one().unwrap();
            addr.as_ptr().write(Point { x: 1, y: 2 });
            assert_eq!(addr.as_ptr().read(), Point { x: 1, y: 2 });
            typed.deallocate_one(addr);
        }
    }

    #[test]
    fn overflowing_count_is_rejected() {
        let (pool, memory) = scripted_pool();
        let typed = TypedAllocator::<u64, _>::new(&pool);

        assert_eq!(
            typed.allocate(usize::MAX),
            Err(AllocError::CapacityOverflow { count: usize::MAX, elem_size: 8 })
        );
        assert_eq!(memory.requests(), 0);
    }

    #[test]
    fn oom_is_forwarded() {
        let (pool, memory) = scripted_pool();
        memory.fail_always();
        let typed = TypedAllocator::<u8, _>::new(&pool);

        assert_eq!(typed.allocate(8), Err(AllocError::OutOfMemory { size: 320 }));
    }

    #[test]
    fn sizing_helpers() {
        let bytes = TypedAllocator::<u8, _>::new(PrimaryAllocator::new());
        assert_eq!(bytes.init_page_size(), 4096);
        assert_eq!(bytes.max_size(), u32::MAX as usize);

        let big = TypedAllocator::<[u8; 8192], _>::new(PrimaryAllocator::new());
        assert_eq!(big.init_page_size(), 1);

        let unit = TypedAllocator::<(), _>::new(PrimaryAllocator::new());
        assert_eq!(unit.init_page_size(), 4096);
    }
}
