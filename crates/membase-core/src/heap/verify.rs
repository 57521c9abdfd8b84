//! Pointer classification and heap invariant checks.

use super::allocator::Heap;
use super::error::HeapError;
use super::kind::ChunkKind;
use super::layout::{
    CHUNK_MASK, CHUNK_SIZE, FIRST_ALLOCATABLE_CHUNK, LARGE_OBJECT_HEADER_SIZE, chunk_base,
    chunk_index, is_aligned, kind_byte_addr,
};
use super::memory::HostMemory;
use super::size_class::SizeClass;

impl<M: HostMemory> Heap<M> {
    /// Decodes the chunk kind governing `ptr`.
    ///
    /// Under strict validation the pointer must also be inside the heap,
    /// outside any page header, and at a slot or payload start. Interior
    /// chunks of large objects are not tracked, so a pointer into one is only
    /// caught when the stale byte there happens not to fit.
    pub(super) fn classify(&self, ptr: usize) -> Result<ChunkKind, HeapError> {
        if !self.config.validation.enabled() {
            return ChunkKind::decode(self.memory.read_u8(kind_byte_addr(ptr)), ptr);
        }
        if !self.in_heap(ptr) {
            return Err(HeapError::ForeignPointer { ptr });
        }
        if chunk_index(ptr) < FIRST_ALLOCATABLE_CHUNK {
            return Err(HeapError::NotAllocated { ptr });
        }
        let kind = ChunkKind::decode(self.memory.read_u8(kind_byte_addr(ptr)), ptr)?;
        match kind {
            ChunkKind::LargeObject | ChunkKind::FreeLargeObject => {
                if ptr & CHUNK_MASK != LARGE_OBJECT_HEADER_SIZE {
                    return Err(HeapError::MisalignedPointer { ptr });
                }
            }
            ChunkKind::Small(class) => {
                let from_end = chunk_base(ptr) + CHUNK_SIZE - ptr;
                let span = class.slots_per_chunk() * class.slot_size();
                if from_end % class.slot_size() != 0 || from_end > span {
                    return Err(HeapError::MisalignedPointer { ptr });
                }
            }
        }
        Ok(kind)
    }

    /// Walks every freelist and checks it against the chunk-kind bytes.
    ///
    /// Each small free slot must sit at a slot boundary of a chunk tagged with
    /// its class. Each large free object must be chunk-aligned, tagged free,
    /// and lie within the heap. Walks are bounded by the chunk count, so a
    /// cycle is reported instead of looping.
    pub fn check_invariants(&self) -> Result<(), HeapError> {
        let chunk_bound = self.walk_bound();
        for class in SizeClass::all() {
            let bound = chunk_bound * class.slots_per_chunk();
            let mut node = self.small_freelists[class.index()];
            let mut steps = 0;
            while node != 0 {
                steps += 1;
                if steps > bound {
                    return Err(HeapError::FreelistCycle {
                        list: "small",
                        addr: node,
                    });
                }
                match self.chunk_kind(node)? {
                    ChunkKind::Small(found) if found == class => {}
                    other => {
                        return Err(HeapError::CorruptChunkKind {
                            ptr: node,
                            kind: other.to_byte(),
                        });
                    }
                }
                if chunk_index(node) < FIRST_ALLOCATABLE_CHUNK {
                    return Err(HeapError::NotAllocated { ptr: node });
                }
                let from_end = chunk_base(node) + CHUNK_SIZE - node;
                if from_end % class.slot_size() != 0 {
                    return Err(HeapError::MisalignedPointer { ptr: node });
                }
                node = self.memory.read_word(node);
            }
        }

        let mut node = self.large_objects;
        let mut steps = 0;
        while node != 0 {
            steps += 1;
            if steps > chunk_bound {
                return Err(HeapError::FreelistCycle {
                    list: "large",
                    addr: node,
                });
            }
            if !is_aligned(node, CHUNK_SIZE) {
                return Err(HeapError::MisalignedPointer { ptr: node });
            }
            if self.chunk_kind(node)? != ChunkKind::FreeLargeObject {
                return Err(HeapError::StaleFreeLargeObject { addr: node });
            }
            let end = node + LARGE_OBJECT_HEADER_SIZE + self.object_size(node);
            if !is_aligned(end, CHUNK_SIZE) || end > self.memory.reserved_size() {
                return Err(HeapError::ForeignPointer { ptr: end });
            }
            node = self.memory.read_word(node);
        }
        Ok(())
    }
}
