//! Backend contract: the operation set every allocation backend provides.
//!
//! Exactly one backend is active in a given build. Consumers hold a
//! `&dyn Backend` and never name the concrete type, so the libc-backed
//! [`SystemBackend`] and the engine-backed [`HeapBackend`] swap without
//! touching callers.
//!
//! Both backends report out-of-memory as a null pointer and never abort for
//! it. A zero-byte request returns a unique non-null pointer. Heap-structure
//! violations (double free, foreign pointer, corrupt metadata) end the process
//! through [`Backend::fatal_abort`].

use std::ptr;

use crate::atomics::Atomics;

/// Forwards every [`Atomics`] method of a backend to its `atomics` field.
macro_rules! delegate_atomics {
    ($backend:ident) => {
        impl<A: Atomics> Atomics for $backend<A> {
            fn atomics_supported(&self) -> bool {
                self.atomics.atomics_supported()
            }

            fn fence_acquire(&self) {
                self.atomics.fence_acquire();
            }

            fn fence_release(&self) {
                self.atomics.fence_release();
            }

            fn load_u32(&self, target: &::std::sync::atomic::AtomicU32) -> u32 {
                self.atomics.load_u32(target)
            }

            fn store_u32(&self, target: &::std::sync::atomic::AtomicU32, value: u32) {
                self.atomics.store_u32(target, value);
            }

            fn fetch_add_u32(&self, target: &::std::sync::atomic::AtomicU32, value: u32) -> u32 {
                self.atomics.fetch_add_u32(target, value)
            }

            fn fetch_sub_u32(&self, target: &::std::sync::atomic::AtomicU32, value: u32) -> u32 {
                self.atomics.fetch_sub_u32(target, value)
            }

            fn load_ptr(&self, target: &::std::sync::atomic::AtomicPtr<u8>) -> *mut u8 {
                self.atomics.load_ptr(target)
            }

            fn store_ptr(&self, target: &::std::sync::atomic::AtomicPtr<u8>, value: *mut u8) {
                self.atomics.store_ptr(target, value);
            }

            fn compare_and_swap_ptr(
                &self,
                target: &::std::sync::atomic::AtomicPtr<u8>,
                expected: *mut u8,
                new: *mut u8,
            ) -> bool {
                self.atomics.compare_and_swap_ptr(target, expected, new)
            }
        }
    };
}

mod heap;
mod system;

pub use heap::HeapBackend;
pub use system::SystemBackend;

/// Raw allocation, bulk memory, fatal abort and atomics.
pub trait Backend: Atomics + Send + Sync {
    /// Short name for diagnostics.
    fn name(&self) -> &'static str;

    /// Returns at least `size` uninitialized bytes, or null when memory is
    /// exhausted.
    fn allocate(&self, size: usize) -> *mut u8;

    /// Resizes the block at `ptr`, keeping its leading
    /// `min(old size, new_size)` bytes. A null `ptr` allocates. Returns null
    /// on exhaustion, in which case `ptr` stays valid and unchanged.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live pointer returned by this backend.
    unsafe fn reallocate(&self, ptr: *mut u8, new_size: usize) -> *mut u8;

    /// Frees the block at `ptr`. Null is a no-op.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live pointer returned by this backend.
    unsafe fn release(&self, ptr: *mut u8);

    /// Copies `len` bytes between non-overlapping ranges. Returns `dest`.
    ///
    /// # Safety
    ///
    /// Both ranges must be valid for `len` bytes and must not overlap.
    unsafe fn copy(&self, dest: *mut u8, src: *const u8, len: usize) -> *mut u8 {
        // SAFETY: caller guarantees valid, disjoint ranges.
        unsafe { ptr::copy_nonoverlapping(src, dest, len) };
        dest
    }

    /// Copies `len` bytes between possibly overlapping ranges. Returns `dest`.
    ///
    /// # Safety
    ///
    /// Both ranges must be valid for `len` bytes.
    unsafe fn move_bytes(&self, dest: *mut u8, src: *const u8, len: usize) -> *mut u8 {
        // SAFETY: caller guarantees valid ranges; `ptr::copy` permits overlap.
        unsafe { ptr::copy(src, dest, len) };
        dest
    }

    /// Sets `len` bytes at `dest` to `value`. Returns `dest`.
    ///
    /// # Safety
    ///
    /// The range must be valid for writes of `len` bytes.
    unsafe fn fill(&self, dest: *mut u8, value: u8, len: usize) -> *mut u8 {
        // SAFETY: caller guarantees a valid range.
        unsafe { ptr::write_bytes(dest, value, len) };
        dest
    }

    /// Reports `message` and terminates the process.
    fn fatal_abort(&self, message: &str) -> ! {
        crate::abort::fatal_abort(message)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicPtr, AtomicU32};

    use super::*;
    use crate::atomics::{FencedAtomics, UnsyncAtomics};
    use crate::heap::HeapConfig;

    fn forwards_atomics(backend: &dyn Backend) {
        let counter = AtomicU32::new(1);
        assert_eq!(backend.fetch_add_u32(&counter, 4), 1);
        assert_eq!(backend.fetch_sub_u32(&counter, 2), 5);
        backend.store_u32(&counter, 9);
        assert_eq!(backend.load_u32(&counter), 9);

        let mut byte = 0u8;
        let target: *mut u8 = &mut byte;
        let slot = AtomicPtr::new(ptr::null_mut());
        assert!(backend.compare_and_swap_ptr(&slot, ptr::null_mut(), target));
        assert_eq!(backend.load_ptr(&slot), target);
        backend.store_ptr(&slot, ptr::null_mut());
        assert!(backend.load_ptr(&slot).is_null());
        backend.fence_release();
        backend.fence_acquire();
    }

    #[test]
    fn backends_forward_their_atomics_strategy() {
        let system = SystemBackend::with_atomics(FencedAtomics);
        forwards_atomics(&system);
        assert!(system.atomics_supported());

        let heap = HeapBackend::with_atomics(2, HeapConfig::default(), UnsyncAtomics)
            .expect("region");
        forwards_atomics(&heap);
        assert!(!heap.atomics_supported());
    }
}
