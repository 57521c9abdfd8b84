//! Error types for the allocator engine and its host memory.

use thiserror::Error;

/// Failures reported by a [`super::HostMemory`] provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HostError {
    /// The host refused to grow: its reservation is used up.
    #[error("host memory exhausted: requested {requested_pages} pages, {available_pages} available")]
    Exhausted {
        requested_pages: usize,
        available_pages: usize,
    },
    /// The requested growth does not fit in the address space.
    #[error("host memory growth request overflows the address space")]
    RequestOverflow,
    /// The provider was constructed with an unusable reservation.
    #[error("invalid reservation: {initial_pages} initial pages, {max_pages} max pages")]
    InvalidReservation {
        initial_pages: usize,
        max_pages: usize,
    },
}

/// Heap-structure violations detected while releasing memory or walking the
/// heap.
///
/// Addresses are offsets into the host memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HeapError {
    /// The address lies outside the heap's managed pages.
    #[error("pointer {ptr:#x} is not inside the heap")]
    ForeignPointer { ptr: usize },
    /// The address is inside the heap but not at a slot or payload start.
    #[error("pointer {ptr:#x} is not aligned to an object start")]
    MisalignedPointer { ptr: usize },
    /// A chunk-kind byte holds a value no chunk kind uses.
    #[error("chunk containing {ptr:#x} has corrupt kind byte {kind:#04x}")]
    CorruptChunkKind { ptr: usize, kind: u8 },
    /// The object is already on a freelist.
    #[error("double free of {ptr:#x}")]
    DoubleFree { ptr: usize },
    /// The address is in a chunk that holds no live object (for example a
    /// page header or the interior of a large object).
    #[error("pointer {ptr:#x} does not refer to an allocated object")]
    NotAllocated { ptr: usize },
    /// A freelist walk revisited a node or ran past its bound.
    #[error("freelist {list} is cyclic or unbounded near {addr:#x}")]
    FreelistCycle { list: &'static str, addr: usize },
    /// A chunk marked free-large is missing from the large-object freelist.
    #[error("free large object {addr:#x} is not on the large-object freelist")]
    StaleFreeLargeObject { addr: usize },
}

/// Allocation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
    /// The host could not supply more pages.
    #[error("out of memory: {0}")]
    OutOfMemory(#[from] HostError),
    /// The request size cannot be represented once headers and rounding are
    /// added.
    #[error("allocation size {size} overflows")]
    SizeOverflow { size: usize },
    /// The heap was found corrupt while serving the request.
    #[error("heap corrupt: {0}")]
    Invalid(#[from] HeapError),
}

impl AllocError {
    /// Returns true for plain out-of-memory conditions, which callers report
    /// as a null pointer rather than aborting.
    #[must_use]
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, AllocError::OutOfMemory(_) | AllocError::SizeOverflow { .. })
    }
}
