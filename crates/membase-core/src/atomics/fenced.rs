use std::sync::atomic::{self, AtomicPtr, AtomicU32, Ordering};

use super::Atomics;

/// Relaxed atomic primitives ordered by explicit fences.
///
/// A release fence precedes every store and read-modify-write; an acquire
/// fence follows every load and read-modify-write.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FencedAtomics;

impl Atomics for FencedAtomics {
    fn atomics_supported(&self) -> bool {
        true
    }

    fn fence_acquire(&self) {
        atomic::fence(Ordering::Acquire);
    }

    fn fence_release(&self) {
        atomic::fence(Ordering::Release);
    }

    fn load_u32(&self, target: &AtomicU32) -> u32 {
        let value = target.load(Ordering::Relaxed);
        atomic::fence(Ordering::Acquire);
        value
    }

    fn store_u32(&self, target: &AtomicU32, value: u32) {
        atomic::fence(Ordering::Release);
        target.store(value, Ordering::Relaxed);
    }

    fn fetch_add_u32(&self, target: &AtomicU32, value: u32) -> u32 {
        atomic::fence(Ordering::Release);
        let prev = target.fetch_add(value, Ordering::Relaxed);
        atomic::fence(Ordering::Acquire);
        prev
    }

    fn fetch_sub_u32(&self, target: &AtomicU32, value: u32) -> u32 {
        atomic::fence(Ordering::Release);
        let prev = target.fetch_sub(value, Ordering::Relaxed);
        atomic::fence(Ordering::Acquire);
        prev
    }

    fn load_ptr(&self, target: &AtomicPtr<u8>) -> *mut u8 {
        let value = target.load(Ordering::Relaxed);
        atomic::fence(Ordering::Acquire);
        value
    }

    fn store_ptr(&self, target: &AtomicPtr<u8>, value: *mut u8) {
        atomic::fence(Ordering::Release);
        target.store(value, Ordering::Relaxed);
    }

    fn compare_and_swap_ptr(
        &self,
        target: &AtomicPtr<u8>,
        expected: *mut u8,
        new: *mut u8,
    ) -> bool {
        atomic::fence(Ordering::Release);
        let swapped = target
            .compare_exchange(expected, new, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok();
        atomic::fence(Ordering::Acquire);
        swapped
    }
}
