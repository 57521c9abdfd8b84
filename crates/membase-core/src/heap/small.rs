//! Small-object paths: per-class freelists carved from whole chunks.

use super::allocator::Heap;
use super::error::AllocError;
use super::kind::ChunkKind;
use super::layout::CHUNK_SIZE;
use super::log::HeapLogLevel;
use super::memory::HostMemory;
use super::size_class::SizeClass;

impl<M: HostMemory> Heap<M> {
    pub(super) fn allocate_small(&mut self, class: SizeClass) -> Result<usize, AllocError> {
        let idx = class.index();
        let path = if self.small_freelists[idx] == 0 {
            self.small_freelists[idx] = self.obtain_small_objects(class)?;
            "path=fresh_chunk"
        } else {
            "path=class_freelist"
        };
        let slot = self.small_freelists[idx];
        self.small_freelists[idx] = self.memory.read_word(slot);
        self.stats.small_allocs += 1;
        self.record_lifecycle(
            HeapLogLevel::Trace,
            "allocate",
            "alloc",
            Some(slot),
            Some(class.slot_size()),
            Some(ChunkKind::Small(class)),
            "success",
            path,
        );
        Ok(slot)
    }

    /// Takes one whole chunk, retags it as `class`, and threads its slots
    /// into a list. Returns the list head (the lowest slot).
    ///
    /// Slots are laid out from the chunk end downwards, so a remainder that
    /// does not fill a slot sits unused at the chunk start.
    fn obtain_small_objects(&mut self, class: SizeClass) -> Result<usize, AllocError> {
        let whole = SizeClass::WHOLE_CHUNK.index();
        let chunk = match self.small_freelists[whole] {
            0 => self.allocate_large_object(0)?,
            chunk => {
                self.small_freelists[whole] = self.memory.read_word(chunk);
                chunk
            }
        };
        self.set_kind(chunk, ChunkKind::Small(class));

        let end = chunk + CHUNK_SIZE;
        let slot_size = class.slot_size();
        let mut next = 0;
        for i in (slot_size..=CHUNK_SIZE).step_by(slot_size) {
            let head = end - i;
            self.memory.write_word(head, next);
            next = head;
        }
        self.record_lifecycle(
            HeapLogLevel::Debug,
            "allocate",
            "carve_chunk",
            Some(chunk),
            Some(slot_size),
            Some(ChunkKind::Small(class)),
            "success",
            format!("slots={}", class.slots_per_chunk()),
        );
        Ok(next)
    }

    pub(super) fn release_small(&mut self, ptr: usize, class: SizeClass) {
        let idx = class.index();
        self.memory.write_word(ptr, self.small_freelists[idx]);
        self.small_freelists[idx] = ptr;
        self.record_lifecycle(
            HeapLogLevel::Trace,
            "release",
            "free",
            Some(ptr),
            Some(class.slot_size()),
            Some(ChunkKind::Small(class)),
            "success",
            "path=class_freelist",
        );
    }
}
