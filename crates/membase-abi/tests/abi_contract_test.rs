//! Integration tests for the exported `membase_*` surface.

use std::ffi::c_void;
use std::ptr;

use membase_abi::active_backend_name;
use membase_abi::atomics_abi::{
    membase_atomic_cas_ptr, membase_atomic_fetch_add_u32, membase_atomic_fetch_sub_u32,
    membase_atomic_load_ptr, membase_atomic_load_u32, membase_atomic_store_ptr,
    membase_atomic_store_u32, membase_atomics_supported, membase_fence_acquire,
    membase_fence_release,
};
use membase_abi::malloc_abi::{membase_free, membase_malloc, membase_realloc};
use membase_abi::string_abi::{membase_memcpy, membase_memmove, membase_memset};

#[test]
fn backend_matches_build_features() {
    let expected = if cfg!(feature = "heap-backend") {
        "heap"
    } else {
        "system"
    };
    assert_eq!(active_backend_name(), expected);
}

#[test]
fn malloc_realloc_free_round_trip() {
    // SAFETY: every pointer comes from membase_malloc/realloc and is used
    // within its size.
    unsafe {
        let zero_a = membase_malloc(0);
        let zero_b = membase_malloc(0);
        assert!(!zero_a.is_null() && !zero_b.is_null());
        assert_ne!(zero_a, zero_b);
        membase_free(zero_a);
        membase_free(zero_b);
        membase_free(ptr::null_mut());

        let p = membase_malloc(32).cast::<u8>();
        assert!(!p.is_null());
        for i in 0..32 {
            *p.add(i) = i as u8;
        }
        let q = membase_realloc(p.cast(), 4096).cast::<u8>();
        assert!(!q.is_null());
        assert!((0..32).all(|i| *q.add(i) == i as u8));

        let fresh = membase_realloc(ptr::null_mut(), 16);
        assert!(!fresh.is_null());
        membase_free(fresh);
        membase_free(q.cast());
    }
}

#[test]
fn malloc_holds_a_size_t_array() {
    let count: libc::size_t = 6;
    let bytes = count * std::mem::size_of::<libc::size_t>();
    // SAFETY: the block holds `count` aligned `size_t` values.
    unsafe {
        let block = membase_malloc(bytes).cast::<libc::size_t>();
        assert!(!block.is_null());
        assert_eq!(block as usize % std::mem::align_of::<libc::size_t>(), 0);
        for i in 0..count {
            block.add(i).write(i * i);
        }
        let grown = membase_realloc(block.cast(), bytes * 2).cast::<libc::size_t>();
        assert!((0..count).all(|i| grown.add(i).read() == i * i));
        membase_free(grown.cast());
    }
}

#[test]
fn bulk_memory_exports() {
    let mut src = [0u8; 16];
    let mut dst = [0u8; 16];
    // SAFETY: stack buffers of 16 bytes.
    unsafe {
        let s = src.as_mut_ptr().cast::<c_void>();
        let d = dst.as_mut_ptr().cast::<c_void>();
        assert_eq!(membase_memset(s, 0x1_41, 16), s);
        assert_eq!(src, [0x41; 16]);
        assert_eq!(membase_memcpy(d, s, 8), d);
        assert_eq!(&dst[..8], &[0x41; 8]);
        assert_eq!(&dst[8..], &[0; 8]);
        // Zero-length calls touch nothing.
        assert_eq!(membase_memcpy(d, ptr::null(), 0), d);
        assert_eq!(membase_memset(d, 0, 0), d);
    }
    let mut buf: [u8; 8] = [1, 2, 3, 4, 5, 6, 7, 8];
    let base = buf.as_mut_ptr();
    // SAFETY: both ranges lie inside `buf`.
    unsafe {
        membase_memmove(base.add(2).cast(), base.cast(), 6);
    }
    assert_eq!(buf, [1, 2, 1, 2, 3, 4, 5, 6]);
}

#[test]
fn atomic_exports() {
    let mut counter = 10u32;
    let mut slot: *mut c_void = ptr::null_mut();
    let mut marker = 0u8;
    let target = ptr::from_mut(&mut marker).cast::<c_void>();
    // SAFETY: locals are aligned and live for every call.
    unsafe {
        assert_eq!(membase_atomics_supported(), 1);
        membase_fence_release();
        assert_eq!(membase_atomic_fetch_add_u32(&mut counter, 5), 10);
        assert_eq!(membase_atomic_fetch_sub_u32(&mut counter, 16), 15);
        assert_eq!(membase_atomic_load_u32(&mut counter), u32::MAX);
        membase_atomic_store_u32(&mut counter, 3);
        membase_fence_acquire();
        assert_eq!(membase_atomic_load_u32(&mut counter), 3);

        assert_eq!(membase_atomic_cas_ptr(&mut slot, ptr::null_mut(), target), 1);
        assert_eq!(membase_atomic_cas_ptr(&mut slot, ptr::null_mut(), target), 0);
        assert_eq!(membase_atomic_load_ptr(&mut slot), target);
        membase_atomic_store_ptr(&mut slot, ptr::null_mut());
        assert!(membase_atomic_load_ptr(&mut slot).is_null());
    }
    assert_eq!(counter, 3);
}
