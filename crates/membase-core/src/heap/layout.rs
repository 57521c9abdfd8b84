//! Page, chunk and granule geometry.
//!
//! A page is 64 KiB and aligned to its own size. Its first chunk is the page
//! header: one kind byte per chunk in the page. Every address inside the heap
//! maps back to its page by masking, and to its chunk by dividing the page
//! offset by the chunk size.

/// Size of a host page (bytes).
pub const PAGE_SIZE: usize = 64 * 1024;
/// Mask selecting the offset within a page.
pub const PAGE_MASK: usize = PAGE_SIZE - 1;

/// Size of a chunk, the smallest unit whose kind is tracked (bytes).
pub const CHUNK_SIZE: usize = 256;
/// Mask selecting the offset within a chunk.
pub const CHUNK_MASK: usize = CHUNK_SIZE - 1;

/// Chunks per page, including the header chunk.
pub const CHUNKS_PER_PAGE: usize = PAGE_SIZE / CHUNK_SIZE;

/// Granule: the unit small-object size classes are expressed in (bytes).
pub const GRANULE_SIZE: usize = 8;

/// Width of an in-band link or size word (bytes).
pub const WORD_SIZE: usize = 8;

/// Index of the first chunk that can hold objects; chunk 0 is the header.
pub const FIRST_ALLOCATABLE_CHUNK: usize = 1;

/// Bytes of each page reserved for the chunk-kind array.
pub const PAGE_HEADER_SIZE: usize = FIRST_ALLOCATABLE_CHUNK * CHUNK_SIZE;

/// In-band large-object header: `next` link followed by payload size.
pub const LARGE_OBJECT_HEADER_SIZE: usize = 2 * WORD_SIZE;

/// Requests above this many bytes are served as large objects.
pub const LARGE_OBJECT_THRESHOLD: usize = CHUNK_SIZE;

const _: () = assert!(CHUNKS_PER_PAGE * CHUNK_SIZE == PAGE_SIZE);
const _: () = assert!(CHUNKS_PER_PAGE <= PAGE_HEADER_SIZE);
const _: () = assert!(GRANULE_SIZE >= WORD_SIZE);

/// Base address of the page containing `addr`.
#[inline]
#[must_use]
pub const fn page_of(addr: usize) -> usize {
    addr & !PAGE_MASK
}

/// Index of the chunk containing `addr` within its page.
#[inline]
#[must_use]
pub const fn chunk_index(addr: usize) -> usize {
    (addr & PAGE_MASK) / CHUNK_SIZE
}

/// Base address of the chunk containing `addr`.
#[inline]
#[must_use]
pub const fn chunk_base(addr: usize) -> usize {
    addr & !CHUNK_MASK
}

/// Address of the kind byte describing the chunk that contains `addr`.
#[inline]
#[must_use]
pub const fn kind_byte_addr(addr: usize) -> usize {
    page_of(addr) + chunk_index(addr)
}

/// Rounds `value` up to a multiple of `align` (a power of two).
///
/// Returns `None` on overflow.
#[inline]
#[must_use]
pub const fn align_up(value: usize, align: usize) -> Option<usize> {
    match value.checked_add(align - 1) {
        Some(v) => Some(v & !(align - 1)),
        None => None,
    }
}

/// Returns true if `value` is a multiple of `align` (a power of two).
#[inline]
#[must_use]
pub const fn is_aligned(value: usize, align: usize) -> bool {
    value & (align - 1) == 0
}
