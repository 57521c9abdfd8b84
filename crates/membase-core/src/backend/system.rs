use std::ffi::c_void;

use super::Backend;
use crate::atomics::{Atomics, DefaultAtomics};

/// Backend over the host C library's allocator and memory routines.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBackend<A = DefaultAtomics> {
    atomics: A,
}

impl<A> SystemBackend<A> {
    pub const fn with_atomics(atomics: A) -> Self {
        Self { atomics }
    }
}

impl SystemBackend {
    pub const fn new() -> Self {
        Self::with_atomics(DefaultAtomics {})
    }
}

delegate_atomics!(SystemBackend);

impl<A: Atomics + Send + Sync> Backend for SystemBackend<A> {
    fn name(&self) -> &'static str {
        "system"
    }

    fn allocate(&self, size: usize) -> *mut u8 {
        // SAFETY: malloc accepts any size; a one-byte minimum keeps zero-size
        // results unique and non-null.
        unsafe { libc::malloc(size.max(1)).cast() }
    }

    unsafe fn reallocate(&self, ptr: *mut u8, new_size: usize) -> *mut u8 {
        // SAFETY: caller guarantees `ptr` is null or came from this backend's
        // malloc. realloc leaves `ptr` intact when it returns null.
        unsafe { libc::realloc(ptr.cast::<c_void>(), new_size.max(1)).cast() }
    }

    unsafe fn release(&self, ptr: *mut u8) {
        // SAFETY: caller guarantees `ptr` is null or live; free(NULL) is a no-op.
        unsafe { libc::free(ptr.cast::<c_void>()) }
    }

    unsafe fn copy(&self, dest: *mut u8, src: *const u8, len: usize) -> *mut u8 {
        // SAFETY: caller guarantees valid, disjoint ranges.
        unsafe { libc::memcpy(dest.cast(), src.cast(), len).cast() }
    }

    unsafe fn move_bytes(&self, dest: *mut u8, src: *const u8, len: usize) -> *mut u8 {
        // SAFETY: caller guarantees valid ranges.
        unsafe { libc::memmove(dest.cast(), src.cast(), len).cast() }
    }

    unsafe fn fill(&self, dest: *mut u8, value: u8, len: usize) -> *mut u8 {
        // SAFETY: caller guarantees a valid range.
        unsafe { libc::memset(dest.cast(), i32::from(value), len).cast() }
    }
}
