//! Large objects: best-fit search, lazy coalescing and splitting.
//!
//! A large object is a run of whole chunks starting with a two-word header
//! (`next`, payload `size`). Free ones form a single unordered list headed by
//! `Heap::large_objects`. Only the head chunk's kind byte describes the
//! object.
//!
//! An object that crosses a page boundary always ends on a page boundary:
//! fresh pages end there, merges never cross into a page header, and splits
//! keep the parent's end.

use super::allocator::Heap;
use super::error::{AllocError, HeapError};
use super::kind::{ChunkKind, FREE_LARGE_OBJECT};
use super::layout::{
    CHUNK_MASK, CHUNK_SIZE, FIRST_ALLOCATABLE_CHUNK, LARGE_OBJECT_HEADER_SIZE, PAGE_HEADER_SIZE,
    PAGE_MASK, PAGE_SIZE, WORD_SIZE, align_up, chunk_index, kind_byte_addr, page_of,
};
use super::log::HeapLogLevel;
use super::memory::HostMemory;
use super::size_class::SizeClass;

/// A slot holding a large-freelist link: the list head or a node's `next`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    Head,
    Next(usize),
}

impl<M: HostMemory> Heap<M> {
    fn link_target(&self, link: Link) -> usize {
        match link {
            Link::Head => self.large_objects,
            Link::Next(node) => self.memory.read_word(node),
        }
    }

    fn set_link(&mut self, link: Link, target: usize) {
        match link {
            Link::Head => self.large_objects = target,
            Link::Next(node) => self.memory.write_word(node, target),
        }
    }

    pub(super) fn object_size(&self, obj: usize) -> usize {
        self.memory.read_word(obj + WORD_SIZE)
    }

    fn set_object_size(&mut self, obj: usize, size: usize) {
        self.memory.write_word(obj + WORD_SIZE, size);
    }

    fn push_free_large(&mut self, obj: usize) {
        self.memory.write_word(obj, self.large_objects);
        self.large_objects = obj;
    }

    /// Upper bound on any freelist walk: the number of chunks in memory.
    pub(super) fn walk_bound(&self) -> usize {
        self.memory.reserved_size() / CHUNK_SIZE + 1
    }

    pub(super) fn allocate_large(&mut self, size: usize) -> Result<usize, AllocError> {
        let obj = self.allocate_large_object(size)?;
        let ptr = obj + LARGE_OBJECT_HEADER_SIZE;
        self.stats.large_allocs += 1;
        self.record_lifecycle(
            HeapLogLevel::Trace,
            "allocate",
            "alloc",
            Some(ptr),
            Some(size),
            Some(ChunkKind::LargeObject),
            "success",
            "path=large_object",
        );
        Ok(ptr)
    }

    /// Finds or makes a large object with at least `size` payload bytes,
    /// marks it in use, and returns its header address.
    pub(super) fn allocate_large_object(&mut self, size: usize) -> Result<usize, AllocError> {
        if size
            .checked_add(LARGE_OBJECT_HEADER_SIZE + PAGE_HEADER_SIZE + PAGE_SIZE)
            .is_none()
        {
            return Err(AllocError::SizeOverflow { size });
        }
        self.maybe_compact_free_large_objects()?;

        // Payload size that would leave no fragment at all.
        let exact = align_up(size + LARGE_OBJECT_HEADER_SIZE, CHUNK_SIZE)
            .ok_or(AllocError::SizeOverflow { size })?
            - LARGE_OBJECT_HEADER_SIZE;
        let mut best: Option<(usize, Link)> = None;
        let mut best_size = usize::MAX;
        let mut prev = Link::Head;
        let bound = self.walk_bound();
        let mut steps = 0;
        loop {
            let walk = self.link_target(prev);
            if walk == 0 {
                break;
            }
            steps += 1;
            if steps > bound {
                return Err(HeapError::FreelistCycle {
                    list: "large",
                    addr: walk,
                }
                .into());
            }
            let walk_size = self.object_size(walk);
            if walk_size >= size && walk_size < best_size {
                best_size = walk_size;
                best = Some((walk, prev));
                if best_size == exact {
                    break;
                }
            }
            prev = Link::Next(walk);
        }

        let mut best = match best {
            Some((obj, prev)) => {
                let next = self.memory.read_word(obj);
                self.set_link(prev, next);
                obj
            }
            None => {
                let (page, pages) = self.allocate_pages(size + LARGE_OBJECT_HEADER_SIZE)?;
                let obj = page + PAGE_HEADER_SIZE;
                best_size = pages * PAGE_SIZE - PAGE_HEADER_SIZE - LARGE_OBJECT_HEADER_SIZE;
                self.set_object_size(obj, best_size);
                obj
            }
        };
        self.set_kind(best, ChunkKind::LargeObject);

        let mut size = size;
        let mut tail_size = (best_size - size) & !CHUNK_MASK;
        if tail_size == 0 {
            return Ok(best);
        }

        let start_page = page_of(best);
        let start = best + LARGE_OBJECT_HEADER_SIZE;
        let end = start + best_size;
        if start_page == page_of(end - tail_size - 1) {
            // Placement stays inside its first page.
        } else if size < PAGE_SIZE - LARGE_OBJECT_HEADER_SIZE - CHUNK_SIZE {
            // Sub-page request straddling a page boundary: free the part in
            // the first page and start over at the next page.
            let first_page_size = PAGE_SIZE - (start & PAGE_MASK);
            let head = best;
            self.set_kind(head, ChunkKind::FreeLargeObject);
            self.set_object_size(head, first_page_size);
            self.push_free_large(head);
            self.stats.splits += 1;
            self.maybe_repurpose_single_chunk_large_objects_head();

            best = start_page + PAGE_SIZE + PAGE_HEADER_SIZE;
            self.set_kind(best, ChunkKind::LargeObject);
            best_size = best_size - first_page_size - PAGE_HEADER_SIZE - LARGE_OBJECT_HEADER_SIZE;
            tail_size = (best_size - size) & !CHUNK_MASK;
        } else {
            // Multi-page placement owns all of its tail pages: round up to the
            // end of the page it finishes in.
            let first_page_size = PAGE_SIZE - (start & PAGE_MASK);
            let tail_pages_size = align_up(size - first_page_size, PAGE_SIZE)
                .ok_or(AllocError::SizeOverflow { size })?;
            size = first_page_size + tail_pages_size;
            tail_size = best_size.saturating_sub(size);
        }
        self.set_object_size(best, best_size - tail_size);

        // Never start the tail inside a page header.
        let mut tail_idx = chunk_index(end - tail_size);
        while tail_idx < FIRST_ALLOCATABLE_CHUNK && tail_size > 0 {
            tail_size -= CHUNK_SIZE;
            tail_idx += 1;
        }
        if tail_size > 0 {
            let tail = end - tail_size;
            self.set_kind(tail, ChunkKind::FreeLargeObject);
            self.set_object_size(tail, tail_size - LARGE_OBJECT_HEADER_SIZE);
            self.push_free_large(tail);
            self.stats.splits += 1;
            self.record_lifecycle(
                HeapLogLevel::Debug,
                "allocate",
                "split",
                Some(tail),
                Some(tail_size),
                Some(ChunkKind::FreeLargeObject),
                "success",
                format!("placed={best:#x}"),
            );
            self.maybe_repurpose_single_chunk_large_objects_head();
        }
        Ok(best)
    }

    /// Turns a single-chunk free large object at the list head into a whole
    /// free chunk for the small-object pools.
    fn maybe_repurpose_single_chunk_large_objects_head(&mut self) {
        let head = self.large_objects;
        if head == 0 || self.object_size(head) >= CHUNK_SIZE {
            return;
        }
        self.large_objects = self.memory.read_word(head);
        self.set_kind(head, ChunkKind::Small(SizeClass::WHOLE_CHUNK));
        let whole = SizeClass::WHOLE_CHUNK.index();
        self.memory.write_word(head, self.small_freelists[whole]);
        self.small_freelists[whole] = head;
        self.stats.repurposed_chunks += 1;
        self.record_lifecycle(
            HeapLogLevel::Debug,
            "allocate",
            "repurpose_chunk",
            Some(head),
            Some(CHUNK_SIZE),
            Some(ChunkKind::Small(SizeClass::WHOLE_CHUNK)),
            "success",
            "single_chunk_leftover",
        );
    }

    /// Merges every free large object with the free objects that directly
    /// follow it, if any release happened since the last pass.
    fn maybe_compact_free_large_objects(&mut self) -> Result<(), HeapError> {
        if !self.pending_compaction {
            return Ok(());
        }
        self.pending_compaction = false;
        self.stats.compactions += 1;
        let merges_before = self.stats.merges;

        let bound = self.walk_bound();
        let mut prev = Link::Head;
        let mut steps = 0;
        while self.link_target(prev) != 0 {
            steps += 1;
            if steps > bound {
                return Err(HeapError::FreelistCycle {
                    list: "large",
                    addr: self.link_target(prev),
                });
            }
            prev = self.maybe_merge_free_large_object(prev)?;
            prev = Link::Next(self.link_target(prev));
        }

        let merged = self.stats.merges - merges_before;
        self.record_lifecycle(
            HeapLogLevel::Debug,
            "allocate",
            "compact",
            None,
            None,
            None,
            "success",
            format!("merged={merged}"),
        );
        Ok(())
    }

    /// Absorbs free neighbours that start where the object behind `prev`
    /// ends. Returns the link that refers to the object afterwards.
    fn maybe_merge_free_large_object(&mut self, mut prev: Link) -> Result<Link, HeapError> {
        let obj = self.link_target(prev);
        let bound = self.walk_bound();
        loop {
            let end = obj + LARGE_OBJECT_HEADER_SIZE + self.object_size(obj);
            // A page header stops merging; this also covers the heap end.
            if chunk_index(end) < FIRST_ALLOCATABLE_CHUNK {
                return Ok(prev);
            }
            if self.memory.read_u8(kind_byte_addr(end)) != FREE_LARGE_OBJECT {
                return Ok(prev);
            }
            let neighbour = end;

            let mut walk_prev = Link::Head;
            let mut steps = 0;
            loop {
                let walk = self.link_target(walk_prev);
                if walk == 0 {
                    return Err(HeapError::StaleFreeLargeObject { addr: neighbour });
                }
                if walk == neighbour {
                    let merged = self.object_size(obj)
                        + LARGE_OBJECT_HEADER_SIZE
                        + self.object_size(neighbour);
                    self.set_object_size(obj, merged);
                    let after = self.memory.read_word(neighbour);
                    self.set_link(walk_prev, after);
                    if prev == Link::Next(neighbour) {
                        prev = walk_prev;
                    }
                    self.stats.merges += 1;
                    break;
                }
                walk_prev = Link::Next(walk);
                steps += 1;
                if steps > bound {
                    return Err(HeapError::FreelistCycle {
                        list: "large",
                        addr: walk,
                    });
                }
            }
        }
    }

    pub(super) fn release_large(&mut self, ptr: usize) {
        let obj = ptr - LARGE_OBJECT_HEADER_SIZE;
        self.push_free_large(obj);
        self.set_kind(obj, ChunkKind::FreeLargeObject);
        self.pending_compaction = true;
        self.record_lifecycle(
            HeapLogLevel::Trace,
            "release",
            "free",
            Some(ptr),
            Some(self.object_size(obj)),
            Some(ChunkKind::LargeObject),
            "success",
            "path=large_freelist",
        );
    }
}
