//! ABI layer for bulk memory: `membase_memcpy`, `membase_memmove`,
//! `membase_memset`.

use std::ffi::{c_int, c_void};

use libc::size_t;

use crate::backend_state::active_backend;

abi_fn! {
    /// Copies `n` bytes between non-overlapping ranges. Returns `dst`.
    fn membase_memcpy(dst: *mut c_void, src: *const c_void, n: size_t) -> *mut c_void {
        if n == 0 {
            return dst;
        }
        active_backend().copy(dst.cast(), src.cast(), n).cast()
    }
}

abi_fn! {
    /// Copies `n` bytes between possibly overlapping ranges. Returns `dst`.
    fn membase_memmove(dst: *mut c_void, src: *const c_void, n: size_t) -> *mut c_void {
        if n == 0 {
            return dst;
        }
        active_backend().move_bytes(dst.cast(), src.cast(), n).cast()
    }
}

abi_fn! {
    /// Sets `n` bytes at `dst` to the low byte of `c`. Returns `dst`.
    fn membase_memset(dst: *mut c_void, c: c_int, n: size_t) -> *mut c_void {
        if n == 0 {
            return dst;
        }
        active_backend().fill(dst.cast(), c as u8, n).cast()
    }
}
