//! Atomics backend: fences, 32-bit and pointer atomics behind one capability
//! flag.
//!
//! Three strategies implement [`Atomics`]:
//!
//! - [`IntrinsicAtomics`]: compiler intrinsics with acquire/release ordering.
//! - [`FencedAtomics`]: relaxed primitives bracketed by explicit fences, for
//!   targets whose atomic instructions carry no ordering of their own.
//! - [`UnsyncAtomics`]: the degraded fallback. Every operation is its plain
//!   non-atomic counterpart (read-modify-write is a separate load and store)
//!   and [`Atomics::atomics_supported`] reports `false`. Callers that need
//!   real atomicity must check the flag and fall back to a lock.
//!
//! The allocator engine does not use these; they are part of the backend
//! contract for its consumers.

use std::sync::atomic::{AtomicPtr, AtomicU32};

mod fenced;
mod intrinsic;
mod unsync;

pub use fenced::FencedAtomics;
pub use intrinsic::IntrinsicAtomics;
pub use unsync::UnsyncAtomics;

/// Atomic primitive set shared by every backend.
///
/// Loads pair with stores (and fences) under acquire/release semantics when
/// supported. `fetch_add_u32`/`fetch_sub_u32` wrap and return the previous
/// value. `compare_and_swap_ptr` stores `new` only if the target holds
/// `expected`, and reports whether it did.
pub trait Atomics {
    fn atomics_supported(&self) -> bool;
    fn fence_acquire(&self);
    fn fence_release(&self);
    fn load_u32(&self, target: &AtomicU32) -> u32;
    fn store_u32(&self, target: &AtomicU32, value: u32);
    fn fetch_add_u32(&self, target: &AtomicU32, value: u32) -> u32;
    fn fetch_sub_u32(&self, target: &AtomicU32, value: u32) -> u32;
    fn load_ptr(&self, target: &AtomicPtr<u8>) -> *mut u8;
    fn store_ptr(&self, target: &AtomicPtr<u8>, value: *mut u8);
    fn compare_and_swap_ptr(&self, target: &AtomicPtr<u8>, expected: *mut u8, new: *mut u8)
    -> bool;
}

/// Strategy selected for the build target.
#[cfg(all(target_has_atomic = "32", target_has_atomic = "ptr"))]
pub type DefaultAtomics = IntrinsicAtomics;

/// Strategy selected for the build target.
#[cfg(not(all(target_has_atomic = "32", target_has_atomic = "ptr")))]
pub type DefaultAtomics = UnsyncAtomics;
