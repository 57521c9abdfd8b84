//! ABI layer for raw allocation: `membase_malloc`, `membase_realloc`,
//! `membase_free`.
//!
//! Exhaustion comes back as null. Heap violations never return: the active
//! backend aborts the process.

use std::ffi::c_void;

use libc::size_t;

use crate::backend_state::active_backend;

abi_fn! {
    /// Allocates at least `size` bytes; null when memory is exhausted. A
    /// zero-byte request returns a unique non-null pointer.
    fn membase_malloc(size: size_t) -> *mut c_void {
        active_backend().allocate(size).cast()
    }
}

abi_fn! {
    /// Resizes `ptr`, keeping its leading bytes. Null `ptr` allocates. On
    /// null return `ptr` is still valid.
    fn membase_realloc(ptr: *mut c_void, size: size_t) -> *mut c_void {
        active_backend().reallocate(ptr.cast(), size).cast()
    }
}

abi_fn! {
    /// Frees `ptr`. Null is a no-op.
    fn membase_free(ptr: *mut c_void) {
        active_backend().release(ptr.cast());
    }
}
