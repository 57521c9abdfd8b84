//! Page-aligned memory reservation for running the engine over real memory.
//!
//! The whole capacity is reserved once, zeroed, from the system allocator;
//! `grow` only moves the committed boundary. Addresses handed out therefore
//! never move, and an offset maps to a real pointer with [`RegionMemory::ptr_at`].
//!
//! Accesses go through raw pointers rather than slices over the region: live
//! allocations are written by their owners concurrently with engine
//! bookkeeping elsewhere in the region.

use std::alloc::{self, Layout};
use std::ptr::{self, NonNull};

use super::error::HostError;
use super::layout::{PAGE_SIZE, WORD_SIZE};
use super::memory::HostMemory;

/// A fixed reservation of `max_pages` pages, aligned to the page size.
#[derive(Debug)]
pub struct RegionMemory {
    base: NonNull<u8>,
    layout: Layout,
    committed_pages: usize,
    max_pages: usize,
}

// The region is uniquely owned; the raw pointer is never shared outside the
// accessors below.
unsafe impl Send for RegionMemory {}

impl RegionMemory {
    /// Reserves `max_pages` pages. Nothing is committed until the engine
    /// grows.
    pub fn reserve(max_pages: usize) -> Result<Self, HostError> {
        let invalid = HostError::InvalidReservation {
            initial_pages: 0,
            max_pages,
        };
        if max_pages == 0 {
            return Err(invalid);
        }
        let size = max_pages.checked_mul(PAGE_SIZE).ok_or(invalid)?;
        let layout = Layout::from_size_align(size, PAGE_SIZE).map_err(|_| invalid)?;
        // SAFETY: `layout` has non-zero size.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let base = NonNull::new(raw).ok_or(HostError::Exhausted {
            requested_pages: max_pages,
            available_pages: 0,
        })?;
        Ok(Self {
            base,
            layout,
            committed_pages: 0,
            max_pages,
        })
    }

    /// Committed page count.
    #[must_use]
    pub fn pages(&self) -> usize {
        self.committed_pages
    }

    /// Reservation capacity in pages.
    #[must_use]
    pub fn max_pages(&self) -> usize {
        self.max_pages
    }

    /// Real address of `offset`.
    #[must_use]
    pub fn ptr_at(&self, offset: usize) -> *mut u8 {
        assert!(offset < self.layout.size(), "offset {offset:#x} outside region");
        self.base.as_ptr().wrapping_add(offset)
    }

    /// Offset of `ptr` if it lies inside the committed part of the region.
    #[must_use]
    pub fn offset_of(&self, ptr: *const u8) -> Option<usize> {
        let addr = ptr as usize;
        let start = self.base.as_ptr() as usize;
        let offset = addr.checked_sub(start)?;
        (offset < self.reserved_size()).then_some(offset)
    }

    fn check(&self, addr: usize, len: usize) {
        let end = addr.checked_add(len);
        assert!(
            end.is_some_and(|end| end <= self.reserved_size()),
            "access of {len} bytes at {addr:#x} outside committed region"
        );
    }
}

impl HostMemory for RegionMemory {
    fn heap_base(&self) -> usize {
        0
    }

    fn reserved_size(&self) -> usize {
        self.committed_pages * PAGE_SIZE
    }

    fn grow(&mut self, pages: usize) -> Result<usize, HostError> {
        let total = self
            .committed_pages
            .checked_add(pages)
            .ok_or(HostError::RequestOverflow)?;
        if total > self.max_pages {
            return Err(HostError::Exhausted {
                requested_pages: pages,
                available_pages: self.max_pages - self.committed_pages,
            });
        }
        self.committed_pages = total;
        Ok(total)
    }

    fn read_u8(&self, addr: usize) -> u8 {
        self.check(addr, 1);
        // SAFETY: bounds checked against the committed part of the allocation.
        unsafe { self.base.as_ptr().add(addr).read() }
    }

    fn write_u8(&mut self, addr: usize, value: u8) {
        self.check(addr, 1);
        // SAFETY: bounds checked against the committed part of the allocation.
        unsafe { self.base.as_ptr().add(addr).write(value) }
    }

    fn read_word(&self, addr: usize) -> usize {
        self.check(addr, WORD_SIZE);
        // SAFETY: bounds checked; unaligned read of plain bytes.
        let raw = unsafe {
            self.base
                .as_ptr()
                .add(addr)
                .cast::<[u8; WORD_SIZE]>()
                .read_unaligned()
        };
        u64::from_le_bytes(raw) as usize
    }

    fn write_word(&mut self, addr: usize, value: usize) {
        self.check(addr, WORD_SIZE);
        // SAFETY: bounds checked; unaligned write of plain bytes.
        unsafe {
            self.base
                .as_ptr()
                .add(addr)
                .cast::<[u8; WORD_SIZE]>()
                .write_unaligned((value as u64).to_le_bytes());
        }
    }

    fn copy_within(&mut self, src: usize, dst: usize, len: usize) {
        self.check(src, len);
        self.check(dst, len);
        let base = self.base.as_ptr();
        // SAFETY: both ranges checked; `ptr::copy` permits overlap.
        unsafe { ptr::copy(base.add(src), base.add(dst), len) }
    }

    fn fill(&mut self, addr: usize, value: u8, len: usize) {
        self.check(addr, len);
        // SAFETY: range checked.
        unsafe { ptr::write_bytes(self.base.as_ptr().add(addr), value, len) }
    }
}

impl Drop for RegionMemory {
    fn drop(&mut self) {
        // SAFETY: `base` came from `alloc_zeroed` with this exact layout.
        unsafe { alloc::dealloc(self.base.as_ptr(), self.layout) }
    }
}
