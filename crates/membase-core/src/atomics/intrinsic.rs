use std::sync::atomic::{self, AtomicPtr, AtomicU32, Ordering};

use super::Atomics;

/// Hardware atomics through compiler intrinsics.
///
/// Loads are `Acquire`, stores `Release`, read-modify-writes `AcqRel`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IntrinsicAtomics;

impl Atomics for IntrinsicAtomics {
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
        target.load(Ordering::Acquire)
    }

    fn store_u32(&self, target: &AtomicU32, value: u32) {
        target.store(value, Ordering::Release);
    }

    fn fetch_add_u32(&self, target: &AtomicU32, value: u32) -> u32 {
        target.fetch_add(value, Ordering::AcqRel)
    }

    fn fetch_sub_u32(&self, target: &AtomicU32, value: u32) -> u32 {
        target.fetch_sub(value, Ordering::AcqRel)
    }

    fn load_ptr(&self, target: &AtomicPtr<u8>) -> *mut u8 {
        target.load(Ordering::Acquire)
    }

    fn store_ptr(&self, target: &AtomicPtr<u8>, value: *mut u8) {
        target.store(value, Ordering::Release);
    }

    fn compare_and_swap_ptr(
        &self,
        target: &AtomicPtr<u8>,
        expected: *mut u8,
        new: *mut u8,
    ) -> bool {
        target
            .compare_exchange(expected, new, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
