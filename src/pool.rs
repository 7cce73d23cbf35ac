//! Second tier: the size-class segregated pool.
//!
//! Requests up to [`MAX_BLOCK`] bytes are served from per-class free lists.
//! Empty lists are refilled in batches carved from the pool [`Region`], and
//! the region itself grows by asking the system allocator for more memory.
//! Larger requests never touch the pool and go to the [`PrimaryAllocator`].
//!
//! ```text
//!   allocate(n)
//!       |
//!   n > MAX_BLOCK ───────────────────────────> PrimaryAllocator
//!       |
//!   free list of class(n) ──non-empty──> pop head
//!       |
//!     empty
//!       v
//!   refill ──> chunk_alloc ──region has room──> carve batch
//!                   |
//!                 grow: system memory, else donor block, else primary (OOM loop)
//! ```
//!
//! Pool memory is never returned to the system and freed blocks are never
//! coalesced, so the pool only grows for as long as it lives.

use std::{fmt, ptr::NonNull};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::{
    config::PoolConfig,
    error::AllocError,
    freelist::FreeListTable,
    kernel::{LibcMemory, SystemMemory},
    primary::{OomHandler, PrimaryAllocator},
    region::Region,
    size_class::{self, MAX_BLOCK, NUM_SIZE_CLASSES},
};

/// Everything the pool mutates. Always accessed under [`PoolAllocator::state`].
struct PoolState {
    free_lists: FreeListTable,
    region: Region,
    /// Total bytes ever obtained from the system for this pool.
    heap_size: usize,
}

// The raw pointers inside only refer to memory owned by the pool, and the
// state is only reachable through the pool mutex.
unsafe impl Send for PoolState {}

impl PoolState {
    const fn new() -> Self {
        Self {
            free_lists: FreeListTable::new(),
            region: Region::empty(),
            heap_size: 0,
        }
    }

    /// Replaces the region, first moving what is left of the old one onto
    /// the free list of its own size class.
    ///
    /// **SAFETY**: `[start, start + len)` must be owned by the pool and on no list.
    unsafe fn install_region(&mut self, start: NonNull<u8>, len: usize) {
        if let Some((leftover, leftover_len)) = self.region.take_leftover() {
            // Every carve is a multiple of ALIGN and below the request size,
            // so the leftover is a whole block of a smaller class.
            let class = size_class::class_index(leftover_len);
            debug!(bytes = leftover_len, class, "moving region leftover to free list");
            unsafe { self.free_lists.push(class, leftover) };
        }

        self.region = unsafe { Region::new(start, len) };
    }
}

/// Snapshot of the pool bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    /// Total bytes obtained from the system allocator for the pool.
    pub heap_size: usize,
    /// Bytes left in the current region.
    pub region_available: usize,
    /// Blocks on each class's free list.
    pub free_blocks: [usize; NUM_SIZE_CLASSES],
}

impl PoolStats {
    /// Bytes the pool can hand out without growing: free blocks plus region.
    pub fn free_bytes(&self) -> usize {
        let listed: usize = self
            .free_blocks
            .iter()
            .enumerate()
            .map(|(class, blocks)| blocks * size_class::class_size(class))
            .sum();

        listed + self.region_available
    }
}

pub struct PoolAllocator<M: SystemMemory = LibcMemory> {
    primary: PrimaryAllocator<M>,
    config: PoolConfig,
    state: Mutex<PoolState>,
}

impl PoolAllocator<LibcMemory> {
    /// Pool over `malloc` with the default [`PoolConfig`].
    pub fn new() -> Self {
        Self::with_config(LibcMemory::new(), PoolConfig::default())
    }
}

impl Default for PoolAllocator<LibcMemory> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: SystemMemory> fmt::Debug for PoolAllocator<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolAllocator")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl<M: SystemMemory> PoolAllocator<M> {
    pub fn with_config(memory: M, config: PoolConfig) -> Self {
        Self {
            primary: PrimaryAllocator::with_memory(memory),
            config,
            state: Mutex::new(PoolState::new()),
        }
    }

    /// The allocator large requests and pool growth fall back to.
    #[inline]
    pub fn primary(&self) -> &PrimaryAllocator<M> {
        &self.primary
    }

    #[inline]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// See [`PrimaryAllocator::set_oom_handler`]. The handler runs with the
    /// pool locked when growth escalates, so it must not call back into this pool.
    pub fn set_oom_handler(&self, handler: Option<OomHandler>) -> Option<OomHandler> {
        self.primary.set_oom_handler(handler)
    }

    /// Returns a block of at least `size` bytes.
    ///
    /// Blocks served by the pool are exactly `round_up(size)` bytes and
    /// aligned to [`crate::size_class::ALIGN`].
    pub fn allocate(&self, size: usize) -> Result<NonNull<u8>, AllocError> {
        if size > MAX_BLOCK {
            return self.primary.allocate(size);
        }

        let class = size_class::class_index(size);
        let mut state = self.state.lock();

        if let Some(block) = state.free_lists.pop(class) {
            return Ok(block);
        }

        self.refill(&mut state, size_class::class_size(class))
    }

    /// Gives a block back to the pool, or to the primary allocator for large sizes.
    ///
    /// **SAFETY**: `addr` must come from [`Self::allocate`] or
    /// [`Self::reallocate`] on this pool with the same `size`, and must not be
    /// used afterwards.
    pub unsafe fn deallocate(&self, addr: NonNull<u8>, size: usize) {
        if size > MAX_BLOCK {
            unsafe { self.primary.deallocate(addr, size) };
            return;
        }

        let class = size_class::class_index(size);
        unsafe { self.state.lock().free_lists.push(class, addr) };
    }

    /// Moves a block to one of `new_size` bytes, keeping the first
    /// `min(old_size, new_size)` bytes.
    ///
    /// Pool blocks are never resized in place: a new block is allocated, the
    /// contents copied and the old block freed. When both sizes are above
    /// [`MAX_BLOCK`] the primary allocator resizes the block directly. On
    /// error the old block is untouched.
    ///
    /// **SAFETY**: same requirements as [`Self::deallocate`] with `old_size`.
    pub unsafe fn reallocate(
        &self,
        addr: NonNull<u8>,
        old_size: usize,
        new_size: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        if old_size > MAX_BLOCK && new_size > MAX_BLOCK {
            return unsafe { self.primary.reallocate(addr, old_size, new_size) };
        }

        let moved = self.allocate(new_size)?;
        unsafe {
            std::ptr::copy_nonoverlapping(addr.as_ptr(), moved.as_ptr(), old_size.min(new_size));
            self.deallocate(addr, old_size);
        }

        Ok(moved)
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();

        PoolStats {
            heap_size: state.heap_size,
            region_available: state.region.available(),
            free_blocks: std::array::from_fn(|class| state.free_lists.len(class)),
        }
    }

    /// Gets a batch of `size`-byte blocks, returns the first and files the
    /// rest on the free list of `size`'s class.
    fn refill(&self, state: &mut PoolState, size: usize) -> Result<NonNull<u8>, AllocError> {
        let mut count = self.config.effective_batch();
        let chunk = self.chunk_alloc(state, size, &mut count)?;
        trace!(size, count, "refilled free list");

        // A single block goes straight to the caller.
        if count == 1 {
            return Ok(chunk);
        }

        let class = size_class::class_index(size);
        unsafe {
            state
                .free_lists
                .push_run(class, chunk.add(size), size, count - 1)
        };

        Ok(chunk)
    }

    /// Carves `count` blocks of `size` bytes from the region, growing it when
    /// not even one block fits. `count` is lowered when only part of the
    /// batch fits.
    ///
    /// On error nothing in `state` has changed.
    fn chunk_alloc(
        &self,
        state: &mut PoolState,
        size: usize,
        count: &mut usize,
    ) -> Result<NonNull<u8>, AllocError> {
        loop {
            let Some(total) = size.checked_mul(*count) else {
                return Err(AllocError::OutOfMemory { size: usize::MAX });
            };
            let available = state.region.available();

            if available >= total {
                return Ok(state.region.carve(total));
            }

            if available >= size {
                *count = available / size;
                return Ok(state.region.carve(size * *count));
            }

            let Some(grow) = total
                .checked_mul(2)
                .and_then(|doubled| doubled.checked_add(self.config.growth_term(state.heap_size)))
            else {
                return Err(AllocError::OutOfMemory { size: usize::MAX });
            };

            if let Some(chunk) = self.primary.memory().request_memory(grow) {
                state.heap_size = state.heap_size.saturating_add(grow);
                debug!(grow, heap_size = state.heap_size, "grew pool region");
                unsafe { state.install_region(chunk, grow) };
                continue;
            }

            warn!(grow, "system allocation for pool growth failed");

            let class = size_class::class_index(size);
            if let Some((donor, donor_class)) = state.free_lists.take_donor(class) {
                warn!(donor_class, "reusing free block as pool region");
                unsafe { state.install_region(donor, size_class::class_size(donor_class)) };
                continue;
            }

            let chunk = self.primary.allocate(grow)?;
            state.heap_size = state.heap_size.saturating_add(grow);
            debug!(grow, heap_size = state.heap_size, "grew pool region after oom handling");
            unsafe { state.install_region(chunk, grow) };
        }
    }
}
