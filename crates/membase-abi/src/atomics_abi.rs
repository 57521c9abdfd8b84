//! ABI layer for the atomics half of the backend contract.
//!
//! Targets must be naturally aligned and live for the duration of the call.
//! When `membase_atomics_supported` returns 0 every operation is a plain
//! load or store and callers must provide their own locking.

use std::ffi::{c_int, c_void};
use std::sync::atomic::{AtomicPtr, AtomicU32};

use membase_core::Atomics;

use crate::backend_state::active_backend;

/// Views a C `uint32_t*` as an atomic.
///
/// # Safety
///
/// `target` must be non-null, 4-byte aligned and valid for reads and writes.
unsafe fn atomic_u32<'a>(target: *mut u32) -> &'a AtomicU32 {
    // SAFETY: forwarded caller contract.
    unsafe { AtomicU32::from_ptr(target) }
}

/// Views a C `void**` as an atomic pointer slot.
///
/// # Safety
///
/// `target` must be non-null, pointer-aligned and valid for reads and writes.
unsafe fn atomic_ptr<'a>(target: *mut *mut c_void) -> &'a AtomicPtr<u8> {
    // SAFETY: forwarded caller contract.
    unsafe { AtomicPtr::from_ptr(target.cast::<*mut u8>()) }
}

abi_fn! {
    /// 1 if the operations below are truly atomic, 0 in the degraded mode.
    fn membase_atomics_supported() -> c_int {
        c_int::from(active_backend().atomics_supported())
    }
}

abi_fn! {
    fn membase_fence_acquire() {
        active_backend().fence_acquire();
    }
}

abi_fn! {
    fn membase_fence_release() {
        active_backend().fence_release();
    }
}

abi_fn! {
    fn membase_atomic_load_u32(target: *mut u32) -> u32 {
        active_backend().load_u32(atomic_u32(target))
    }
}

abi_fn! {
    fn membase_atomic_store_u32(target: *mut u32, value: u32) {
        active_backend().store_u32(atomic_u32(target), value);
    }
}

abi_fn! {
    /// Wrapping add; returns the previous value.
    fn membase_atomic_fetch_add_u32(target: *mut u32, value: u32) -> u32 {
        active_backend().fetch_add_u32(atomic_u32(target), value)
    }
}

abi_fn! {
    /// Wrapping subtract; returns the previous value.
    fn membase_atomic_fetch_sub_u32(target: *mut u32, value: u32) -> u32 {
        active_backend().fetch_sub_u32(atomic_u32(target), value)
    }
}

abi_fn! {
    fn membase_atomic_load_ptr(target: *mut *mut c_void) -> *mut c_void {
        active_backend().load_ptr(atomic_ptr(target)).cast()
    }
}

abi_fn! {
    fn membase_atomic_store_ptr(target: *mut *mut c_void, value: *mut c_void) {
        active_backend().store_ptr(atomic_ptr(target), value.cast());
    }
}

abi_fn! {
    /// Stores `new` if `*target == expected`. Returns 1 on success, 0 if the
    /// slot held something else (and was left unchanged).
    fn membase_atomic_cas_ptr(
        target: *mut *mut c_void,
        expected: *mut c_void,
        new: *mut c_void,
    ) -> c_int {
        c_int::from(active_backend().compare_and_swap_ptr(
            atomic_ptr(target),
            expected.cast(),
            new.cast(),
        ))
    }
}
