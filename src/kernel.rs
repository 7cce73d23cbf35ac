use std::ptr::NonNull;

/// This trait provides an abstraction over the system allocator that backs
/// both tiers. The allocators above it only ever ask for whole byte ranges,
/// so nothing here knows about size classes or free lists.
///
/// Implementations must be usable from several threads at once; the pool
/// serializes its own calls but the primary allocator does not.
pub trait SystemMemory: Send + Sync {
    /// Request a memory range of `len` bytes. It returns a pointer to the
    /// start of the range or `None` if the system allocator is exhausted.
    ///
    /// The returned range is aligned to at least [`crate::size_class::ALIGN`].
    fn request_memory(&self, len: usize) -> Option<NonNull<u8>>;

    /// Returns a range obtained from this backend.
    ///
    /// **SAFETY**: `addr` must come from [`SystemMemory::request_memory`] or
    /// [`SystemMemory::resize_memory`] on the same backend and must not be
    /// used afterwards.
    unsafe fn return_memory(&self, addr: NonNull<u8>, len: usize);

    /// Resizes a range to `new_len` bytes, preserving the first
    /// `min(old_len, new_len)` bytes. On `None` the old range is untouched.
    ///
    /// **SAFETY**: same requirements as [`SystemMemory::return_memory`].
    unsafe fn resize_memory(
        &self,
        addr: NonNull<u8>,
        old_len: usize,
        new_len: usize,
    ) -> Option<NonNull<u8>>;
}

/// System allocator reached through the C runtime (`malloc`, `free`, `realloc`).
#[derive(Debug, Default, Clone, Copy)]
pub struct LibcMemory;

impl LibcMemory {
    pub const fn new() -> Self {
        Self
    }
}

impl SystemMemory for LibcMemory {
    fn request_memory(&self, len: usize) -> Option<NonNull<u8>> {
        // malloc(0) may legally return null, which we would read as exhaustion.
        let addr = unsafe { libc::malloc(len.max(1)) };

        NonNull::new(addr.cast::<u8>())
    }

    unsafe fn return_memory(&self, addr: NonNull<u8>, _len: usize) {
        unsafe { libc::free(addr.as_ptr().cast::<libc::c_void>()) }
    }

    unsafe fn resize_memory(
        &self,
        addr: NonNull<u8>,
        _old_len: usize,
        new_len: usize,
    ) -> Option<NonNull<u8>> {
        let addr = unsafe { libc::realloc(addr.as_ptr().cast::<libc::c_void>(), new_len.max(1)) };

        NonNull::new(addr.cast::<u8>())
    }
}
