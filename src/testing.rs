//! Scripted system memory for tests: counts calls, records request sizes
//! and fails on demand.

use std::{
    ptr::NonNull,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use parking_lot::Mutex;

use crate::kernel::{LibcMemory, SystemMemory};

#[derive(Default)]
struct Script {
    fail_always: AtomicBool,
    fail_next: AtomicUsize,
    requests: AtomicUsize,
    resizes: AtomicUsize,
    sizes: Mutex<Vec<usize>>,
}

/// Clones share the same script, so a test can keep a handle while the
/// allocator owns another.
#[derive(Clone, Default)]
pub(crate) struct ScriptedMemory {
    script: Arc<Script>,
}

impl ScriptedMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every request fails until [`Self::recover`].
    pub fn fail_always(&self) {
        self.script.fail_always.store(true, Ordering::SeqCst);
    }

    /// The next `count` requests fail.
    pub fn fail_next(&self, count: usize) {
        self.script.fail_next.store(count, Ordering::SeqCst);
    }

    pub fn recover(&self) {
        self.script.fail_always.store(false, Ordering::SeqCst);
        self.script.fail_next.store(0, Ordering::SeqCst);
    }

    /// Number of `request_memory` calls, failed ones included.
    pub fn requests(&self) -> usize {
        self.script.requests.load(Ordering::SeqCst)
    }

    /// Number of `resize_memory` calls, failed ones included.
    pub fn resizes(&self) -> usize {
        self.script.resizes.load(Ordering::SeqCst)
    }

    /// Sizes of the `request_memory` calls that succeeded, in order.
    pub fn granted_sizes(&self) -> Vec<usize> {
        self.script.sizes.lock().clone()
    }

    fn should_fail(&self) -> bool {
        if self.script.fail_always.load(Ordering::SeqCst) {
            return true;
        }

        self.script
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }
}

impl SystemMemory for ScriptedMemory {
    fn request_memory(&self, len: usize) -> Option<NonNull<u8>> {
        self.script.requests.fetch_add(1, Ordering::SeqCst);
        if self.should_fail() {
            return None;
        }

        let addr = LibcMemory.request_memory(len)?;
        self.script.sizes.lock().push(len);
        Some(addr)
    }

    unsafe fn return_memory(&self, addr: NonNull<u8>, len: usize) {
        unsafe { LibcMemory.return_memory(addr, len) }
    }

    unsafe fn resize_memory(
        &self,
        addr: NonNull<u8>,
        old_len: usize,
        new_len: usize,
    ) -> Option<NonNull<u8>> {
        self.script.resizes.fetch_add(1, Ordering::SeqCst);
        if self.should_fail() {
            return None;
        }

        unsafe { LibcMemory.resize_memory(addr, old_len, new_len) }
    }
}
