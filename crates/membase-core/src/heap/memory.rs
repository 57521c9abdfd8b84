//! Host memory: the grow-only linear space the engine carves pages from.
//!
//! The engine never holds references into host memory. Every access goes
//! through [`HostMemory`] by offset, so in-band freelist links and headers
//! are read and written as explicit little-endian words.

use super::error::HostError;
use super::layout::{PAGE_SIZE, WORD_SIZE};
use crate::bulk;

/// A linear memory that can only grow, one whole page at a time.
///
/// Offsets are byte addresses from the start of the space. Accessors panic on
/// out-of-range offsets, the same way an out-of-bounds slice index does.
pub trait HostMemory {
    /// Lowest address the engine may use. Everything below belongs to the
    /// embedder (static data, stack). The engine starts at the next page.
    fn heap_base(&self) -> usize;

    /// Bytes currently reserved (committed) by the host.
    fn reserved_size(&self) -> usize;

    /// Extends the space by `pages` whole pages and returns the new total
    /// page count. On failure nothing changes.
    fn grow(&mut self, pages: usize) -> Result<usize, HostError>;

    fn read_u8(&self, addr: usize) -> u8;

    fn write_u8(&mut self, addr: usize, value: u8);

    /// Reads a link or size word.
    fn read_word(&self, addr: usize) -> usize;

    /// Writes a link or size word.
    fn write_word(&mut self, addr: usize, value: usize);

    /// Copies `len` bytes from `src` to `dst`; the ranges may overlap.
    fn copy_within(&mut self, src: usize, dst: usize, len: usize);

    /// Sets `len` bytes at `addr` to `value`.
    fn fill(&mut self, addr: usize, value: u8, len: usize);
}

/// Default first address available to the engine in a [`LinearMemory`],
/// leaving room below for an embedder's static data.
pub const DEFAULT_HEAP_BASE: usize = 1024;

/// Safe in-process host memory backed by a `Vec<u8>`.
///
/// `initial_pages` models memory the host committed before the engine took
/// over; `max_pages` is the growth ceiling, beyond which `grow` reports
/// [`HostError::Exhausted`].
#[derive(Debug, Clone)]
pub struct LinearMemory {
    bytes: Vec<u8>,
    heap_base: usize,
    max_pages: usize,
    grow_calls: usize,
}

impl LinearMemory {
    /// Creates a memory of `initial_pages` zeroed pages that can grow to
    /// `max_pages`, with the heap base at [`DEFAULT_HEAP_BASE`].
    pub fn new(initial_pages: usize, max_pages: usize) -> Result<Self, HostError> {
        Self::with_heap_base(initial_pages, max_pages, DEFAULT_HEAP_BASE)
    }

    /// Like [`LinearMemory::new`] with an explicit heap base, which must lie
    /// inside the initial pages.
    pub fn with_heap_base(
        initial_pages: usize,
        max_pages: usize,
        heap_base: usize,
    ) -> Result<Self, HostError> {
        let invalid = HostError::InvalidReservation {
            initial_pages,
            max_pages,
        };
        if initial_pages > max_pages {
            return Err(invalid);
        }
        let initial_len = initial_pages.checked_mul(PAGE_SIZE).ok_or(invalid)?;
        max_pages.checked_mul(PAGE_SIZE).ok_or(invalid)?;
        if heap_base > initial_len {
            return Err(invalid);
        }
        Ok(Self {
            bytes: vec![0; initial_len],
            heap_base,
            max_pages,
            grow_calls: 0,
        })
    }

    /// The whole committed space.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The whole committed space, mutably.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Committed page count.
    #[must_use]
    pub fn pages(&self) -> usize {
        self.bytes.len() / PAGE_SIZE
    }

    /// Growth ceiling in pages.
    #[must_use]
    pub fn max_pages(&self) -> usize {
        self.max_pages
    }

    /// Number of `grow` calls made, successful or not.
    #[must_use]
    pub fn grow_calls(&self) -> usize {
        self.grow_calls
    }
}

impl HostMemory for LinearMemory {
    fn heap_base(&self) -> usize {
        self.heap_base
    }

    fn reserved_size(&self) -> usize {
        self.bytes.len()
    }

    fn grow(&mut self, pages: usize) -> Result<usize, HostError> {
        self.grow_calls += 1;
        let current = self.pages();
        let total = current
            .checked_add(pages)
            .ok_or(HostError::RequestOverflow)?;
        if total > self.max_pages {
            return Err(HostError::Exhausted {
                requested_pages: pages,
                available_pages: self.max_pages - current,
            });
        }
        self.bytes.resize(total * PAGE_SIZE, 0);
        Ok(total)
    }

    fn read_u8(&self, addr: usize) -> u8 {
        self.bytes[addr]
    }

    fn write_u8(&mut self, addr: usize, value: u8) {
        self.bytes[addr] = value;
    }

    fn read_word(&self, addr: usize) -> usize {
        let mut word = [0u8; WORD_SIZE];
        let read = bulk::copy(&mut word, &self.bytes[addr..], WORD_SIZE);
        assert_eq!(read, WORD_SIZE, "word access at {addr:#x} leaves linear memory");
        u64::from_le_bytes(word) as usize
    }

    fn write_word(&mut self, addr: usize, value: usize) {
        let raw = (value as u64).to_le_bytes();
        let written = bulk::copy(&mut self.bytes[addr..], &raw, WORD_SIZE);
        assert_eq!(written, WORD_SIZE, "word access at {addr:#x} leaves linear memory");
    }

    fn copy_within(&mut self, src: usize, dst: usize, len: usize) {
        let moved = bulk::move_within(&mut self.bytes, src, dst, len);
        assert_eq!(moved, len, "copy of {len} bytes leaves linear memory");
    }

    fn fill(&mut self, addr: usize, value: u8, len: usize) {
        let end = addr + len;
        bulk::fill(&mut self.bytes[addr..end], value, len);
    }
}
