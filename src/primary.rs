//! First tier: a thin wrapper over the system allocator.
//!
//! Every request goes straight to [`SystemMemory`]. When the system cannot
//! satisfy it, the allocator enters a retry loop driven by the registered
//! [`OomHandler`]:
//!
//! ```text
//! request ──ok──> done
//!    │
//!   fail
//!    v
//! handler set? ──no──> Err(OutOfMemory)
//!    │
//!   yes
//!    v
//! handler() ──GiveUp──> Err(OutOfMemory)
//!    │
//!  Retry
//!    v
//! request again ──ok──> done
//!    └──fail──> back to handler
//! ```
//!
//! The loop has no timeout. A handler that keeps answering
//! [`OomAction::Retry`] without ever freeing memory makes the call spin
//! forever; that is the handler's responsibility.

use std::{fmt, ptr::NonNull, sync::Arc};

use parking_lot::Mutex;
use tracing::warn;

use crate::{
    error::AllocError,
    kernel::{LibcMemory, SystemMemory},
};

/// What the retry loop should do after an [`OomHandler`] ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OomAction {
    /// Memory may have been released; try the system allocator again.
    Retry,
    /// Nothing more can be done; fail the request with [`AllocError::OutOfMemory`].
    GiveUp,
}

/// Callback invoked when the system allocator fails. It is expected to free
/// memory (and answer [`OomAction::Retry`]), give up, or terminate the process.
pub type OomHandler = Arc<dyn Fn() -> OomAction + Send + Sync>;

pub struct PrimaryAllocator<M: SystemMemory = LibcMemory> {
    memory: M,
    oom_handler: Mutex<Option<OomHandler>>,
}

impl PrimaryAllocator<LibcMemory> {
    /// Primary allocator over `malloc`/`free`/`realloc` with no OOM handler.
    pub fn new() -> Self {
        Self::with_memory(LibcMemory::new())
    }
}

impl Default for PrimaryAllocator<LibcMemory> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: SystemMemory> fmt::Debug for PrimaryAllocator<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrimaryAllocator")
            .field("oom_handler_set", &self.oom_handler.lock().is_some())
            .finish_non_exhaustive()
    }
}

impl<M: SystemMemory> PrimaryAllocator<M> {
    pub fn with_memory(memory: M) -> Self {
        Self {
            memory,
            oom_handler: Mutex::new(None),
        }
    }

    /// Backend this allocator draws from.
    #[inline]
    pub fn memory(&self) -> &M {
        &self.memory
    }

    /// Allocates `size` bytes, running the OOM retry loop on failure.
    pub fn allocate(&self, size: usize) -> Result<NonNull<u8>, AllocError> {
        if let Some(addr) = self.memory.request_memory(size) {
            return Ok(addr);
        }

        self.oom_retry(size, || self.memory.request_memory(size))
    }

    /// Releases a block straight to the system allocator.
    ///
    /// **SAFETY**: `addr` must have been returned by [`Self::allocate`] or
    /// [`Self::reallocate`] on this allocator and must not be used afterwards.
    pub unsafe fn deallocate(&self, addr: NonNull<u8>, size: usize) {
        unsafe { self.memory.return_memory(addr, size) }
    }

    /// Resizes a block, keeping its first `min(old_size, new_size)` bytes.
    ///
    /// Same retry contract as [`Self::allocate`]. On error the old block is
    /// still valid and owned by the caller.
    ///
    /// **SAFETY**: same requirements as [`Self::deallocate`].
    pub unsafe fn reallocate(
        &self,
        addr: NonNull<u8>,
        old_size: usize,
        new_size: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        if let Some(resized) = unsafe { self.memory.resize_memory(addr, old_size, new_size) } {
            return Ok(resized);
        }

        self.oom_retry(new_size, || unsafe {
            self.memory.resize_memory(addr, old_size, new_size)
        })
    }

    /// Installs `handler` (or clears it with `None`) and returns the previous one.
    pub fn set_oom_handler(&self, handler: Option<OomHandler>) -> Option<OomHandler> {
        std::mem::replace(&mut *self.oom_handler.lock(), handler)
    }

    fn oom_retry(
        &self,
        size: usize,
        mut attempt: impl FnMut() -> Option<NonNull<u8>>,
    ) -> Result<NonNull<u8>, AllocError> {
        loop {
            // The handler may replace itself, so it is never called with the slot locked.
            let Some(handler) = self.oom_handler.lock().clone() else {
                warn!(size, "system allocation failed and no oom handler is set");
                return Err(AllocError::OutOfMemory { size });
            };

            warn!(size, "system allocation failed, invoking oom handler");
            if handler() == OomAction::GiveUp {
                warn!(size, "oom handler gave up");
                return Err(AllocError::OutOfMemory { size });
            }

            if let Some(addr) = attempt() {
                return Ok(addr);
            }
        }
    }
}
