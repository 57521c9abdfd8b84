use std::sync::atomic::{AtomicPtr, AtomicU32, Ordering};

use super::Atomics;

/// Degraded fallback for targets without atomic support.
///
/// Fences do nothing and read-modify-writes are a separate load and store,
/// so concurrent updates can be lost. [`Atomics::atomics_supported`] is
/// `false`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UnsyncAtomics;

impl Atomics for UnsyncAtomics {
    fn atomics_supported(&self) -> bool {
        false
    }

    fn fence_acquire(&self) {}

    fn fence_release(&self) {}

    fn load_u32(&self, target: &AtomicU32) -> u32 {
        target.load(Ordering::Relaxed)
    }

    fn store_u32(&self, target: &AtomicU32, value: u32) {
        target.store(value, Ordering::Relaxed);
    }

    fn fetch_add_u32(&self, target: &AtomicU32, value: u32) -> u32 {
        let prev = target.load(Ordering::Relaxed);
        target.store(prev.wrapping_add(value), Ordering::Relaxed);
        prev
    }

    fn fetch_sub_u32(&self, target: &AtomicU32, value: u32) -> u32 {
        let prev = target.load(Ordering::Relaxed);
        target.store(prev.wrapping_sub(value), Ordering::Relaxed);
        prev
    }

    fn load_ptr(&self, target: &AtomicPtr<u8>) -> *mut u8 {
        target.load(Ordering::Relaxed)
    }

    fn store_ptr(&self, target: &AtomicPtr<u8>, value: *mut u8) {
        target.store(value, Ordering::Relaxed);
    }

    fn compare_and_swap_ptr(
        &self,
        target: &AtomicPtr<u8>,
        expected: *mut u8,
        new: *mut u8,
    ) -> bool {
        if target.load(Ordering::Relaxed) != expected {
            return false;
        }
        target.store(new, Ordering::Relaxed);
        true
    }
}
