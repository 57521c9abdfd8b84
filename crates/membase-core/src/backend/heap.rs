use parking_lot::{Mutex, MutexGuard};

use super::Backend;
use crate::abort::fatal_abort_with;
use crate::atomics::{Atomics, DefaultAtomics};
use crate::heap::{
    AllocError, Heap, HeapConfig, HeapError, HeapLogRecord, HeapStats, HostError, RegionMemory,
};

/// Backend running the allocator engine over a page-aligned region reserved
/// from the system once.
///
/// The engine itself is unsynchronized; a mutex around it is the caller-side
/// lock. Out-of-memory comes back as null, heap violations abort.
pub struct HeapBackend<A = DefaultAtomics> {
    heap: Mutex<Heap<RegionMemory>>,
    atomics: A,
}

impl<A: Atomics + Default> HeapBackend<A> {
    /// Reserves `max_pages` pages for the engine.
    pub fn with_region(max_pages: usize, config: HeapConfig) -> Result<Self, HostError> {
        Self::with_atomics(max_pages, config, A::default())
    }

    /// Capacity and heap settings from the process environment.
    pub fn from_env() -> Result<Self, HostError> {
        Self::with_region(crate::config::max_pages(), HeapConfig::from_env())
    }
}

impl<A> HeapBackend<A> {
    pub fn with_atomics(
        max_pages: usize,
        config: HeapConfig,
        atomics: A,
    ) -> Result<Self, HostError> {
        let region = RegionMemory::reserve(max_pages)?;
        Ok(Self {
            heap: Mutex::new(Heap::new(region, config)),
            atomics,
        })
    }

    #[must_use]
    pub fn stats(&self) -> HeapStats {
        self.heap.lock().stats()
    }

    pub fn check_invariants(&self) -> Result<(), HeapError> {
        self.heap.lock().check_invariants()
    }

    pub fn drain_lifecycle_logs(&self) -> Vec<HeapLogRecord> {
        self.heap.lock().drain_lifecycle_logs()
    }

    /// Usable bytes behind `ptr`, or `None` if it is not a live heap object.
    #[must_use]
    pub fn usable_size(&self, ptr: *const u8) -> Option<usize> {
        let mut heap = self.heap.lock();
        let offset = heap.memory().offset_of(ptr)?;
        heap.usable_size(offset).ok()
    }
}

fn region_offset(heap: &Heap<RegionMemory>, ptr: *const u8) -> Result<usize, HeapError> {
    heap.memory()
        .offset_of(ptr)
        .ok_or(HeapError::ForeignPointer { ptr: ptr as usize })
}

/// Maps an engine result to the contract: addresses to pointers, exhaustion
/// to null, violations to a fatal abort.
fn settle(
    heap: MutexGuard<'_, Heap<RegionMemory>>,
    result: Result<usize, AllocError>,
) -> *mut u8 {
    match result {
        Ok(offset) => heap.memory().ptr_at(offset),
        Err(AllocError::Invalid(err)) => {
            drop(heap);
            fatal_abort_with(&err)
        }
        Err(_) => std::ptr::null_mut(),
    }
}

delegate_atomics!(HeapBackend);

impl<A: Atomics + Send + Sync> Backend for HeapBackend<A> {
    fn name(&self) -> &'static str {
        "heap"
    }

    fn allocate(&self, size: usize) -> *mut u8 {
        let mut heap = self.heap.lock();
        let result = heap.allocate(size);
        settle(heap, result)
    }

    unsafe fn reallocate(&self, ptr: *mut u8, new_size: usize) -> *mut u8 {
        if ptr.is_null() {
            return self.allocate(new_size);
        }
        let mut heap = self.heap.lock();
        let result = region_offset(&heap, ptr)
            .map_err(AllocError::from)
            .and_then(|offset| heap.reallocate(offset, new_size));
        settle(heap, result)
    }

    unsafe fn release(&self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }
        let mut heap = self.heap.lock();
        let result = region_offset(&heap, ptr).and_then(|offset| heap.release(offset));
        if let Err(err) = result {
            drop(heap);
            fatal_abort_with(&err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::layout::PAGE_SIZE;

    #[test]
    fn allocations_are_real_and_disjoint() {
        let backend: HeapBackend =
            HeapBackend::with_region(8, HeapConfig::default()).expect("region");
        let a = backend.allocate(100);
        let b = backend.allocate(100);
        assert!(!a.is_null() && !b.is_null());
        assert_ne!(a, b);
        // SAFETY: both blocks are live and at least 100 bytes.
        unsafe {
            backend.fill(a, 0x11, 100);
            backend.fill(b, 0x22, 100);
            assert_eq!(*a.add(99), 0x11);
            assert_eq!(*b, 0x22);
            backend.release(a);
            backend.release(b);
        }
        backend.check_invariants().expect("invariants");
    }

    #[test]
    fn exhaustion_returns_null() {
        let backend: HeapBackend =
            HeapBackend::with_region(2, HeapConfig::default()).expect("region");
        assert!(backend.allocate(4 * PAGE_SIZE).is_null());
        assert!(!backend.allocate(64).is_null());
    }

    #[test]
    fn reallocate_keeps_prefix_and_original_on_failure() {
        let backend: HeapBackend =
            HeapBackend::with_region(2, HeapConfig::default()).expect("region");
        let p = backend.allocate(16);
        // SAFETY: `p` is live for 16 bytes; later pointers come from the backend.
        unsafe {
            for i in 0..16 {
                *p.add(i) = i as u8;
            }
            let q = backend.reallocate(p, 2000);
            assert!(!q.is_null());
            assert_eq!(*q.add(15), 15);
            assert!(backend.reallocate(q, 8 * PAGE_SIZE).is_null());
            assert_eq!(*q.add(15), 15);
            assert_eq!(backend.reallocate(q, 100), q);
            backend.release(q);
        }
    }

    #[test]
    fn usable_size_of_foreign_pointer_is_none() {
        let backend: HeapBackend =
            HeapBackend::with_region(2, HeapConfig::default()).expect("region");
        let local = 0u8;
        assert_eq!(backend.usable_size(&local), None);
        let p = backend.allocate(40);
        assert_eq!(backend.usable_size(p), Some(40));
    }
}
