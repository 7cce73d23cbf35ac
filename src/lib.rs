//! A two-tier memory allocator.
//!
//! Small requests (up to [`MAX_BLOCK`] bytes) are served by a
//! [`PoolAllocator`]: sixteen size-segregated free lists refilled in batches
//! from a growing region. Everything larger, and every growth of the pool,
//! goes through a [`PrimaryAllocator`] that wraps the system allocator and
//! retries failed requests through a replaceable OOM handler.
//!
//! ```text
//!  container ──> TypedAllocator<T, _> ──> PoolAllocator ──n > 128──> PrimaryAllocator ──> malloc
//!                                              │                            ^
//!                                              └──────── pool growth ───────┘
//! ```
//!
//! Allocators are plain values, so independent instances can coexist. A
//! lazily created process-wide pool is available through [`global`] and the
//! free functions of this module.

use std::{ptr::NonNull, sync::OnceLock};

mod block;
mod config;
mod error;
mod freelist;
mod kernel;
mod pool;
mod primary;
mod region;
pub mod size_class;
#[cfg(test)]
mod testing;
mod typed;
mod utils;

pub use config::PoolConfig;
pub use error::AllocError;
pub use kernel::{LibcMemory, SystemMemory};
pub use pool::{PoolAllocator, PoolStats};
pub use primary::{OomAction, OomHandler, PrimaryAllocator};
pub use size_class::{ALIGN, BATCH, MAX_BLOCK, NUM_SIZE_CLASSES};
pub use typed::{RawAllocator, TypedAllocator};

static GLOBAL_POOL: OnceLock<PoolAllocator> = OnceLock::new();

/// The process-wide pool, created on first use. Its memory is never released.
pub fn global() -> &'static PoolAllocator {
    GLOBAL_POOL.get_or_init(PoolAllocator::new)
}

/// [`PoolAllocator::allocate`] on the [`global`] pool.
pub fn allocate(size: usize) -> Result<NonNull<u8>, AllocError> {
    global().allocate(size)
}

/// [`PoolAllocator::deallocate`] on the [`global`] pool.
///
/// **SAFETY**: `addr` must come from [`allocate`] or [`reallocate`] with the
/// same `size` and must not be used afterwards.
pub unsafe fn deallocate(addr: NonNull<u8>, size: usize) {
    unsafe { global().deallocate(addr, size) }
}

/// [`PoolAllocator::reallocate`] on the [`global`] pool.
///
/// **SAFETY**: same requirements as [`deallocate`] with `old_size`.
pub unsafe fn reallocate(
    addr: NonNull<u8>,
    old_size: usize,
    new_size: usize,
) -> Result<NonNull<u8>, AllocError> {
    unsafe { global().reallocate(addr, old_size, new_size) }
}

/// Replaces the OOM handler of the [`global`] pool, returning the previous one.
pub fn set_oom_handler(handler: Option<OomHandler>) -> Option<OomHandler> {
    global().set_oom_handler(handler)
}

/// Handle to the [`global`] pool, usable as a [`TypedAllocator`] backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct Global;

impl RawAllocator for Global {
    #[inline]
    fn allocate(&self, size: usize) -> Result<NonNull<u8>, AllocError> {
        allocate(size)
    }

    #[inline]
    unsafe fn deallocate(&self, addr: NonNull<u8>, size: usize) {
        unsafe { deallocate(addr, size) }
    }
}
