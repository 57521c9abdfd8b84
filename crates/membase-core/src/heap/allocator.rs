//! Engine state and public allocation API.
//!
//! All engine state lives in one [`Heap`] value owned by the embedder. Nothing
//! in here is synchronized: callers that share a heap across threads must lock
//! around it (the heap backend does).

use super::config::HeapConfig;
use super::error::{AllocError, HeapError};
use super::kind::ChunkKind;
use super::layout::{
    LARGE_OBJECT_HEADER_SIZE, PAGE_HEADER_SIZE, PAGE_SIZE, WORD_SIZE, align_up, kind_byte_addr,
};
use super::log::{HeapLogLevel, HeapLogRecord};
use super::memory::HostMemory;
use super::size_class::{self, NUM_SIZE_CLASSES};

/// Engine counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    /// Bytes of host memory owned by the engine.
    pub heap_size: usize,
    /// Successful host `grow` calls.
    pub grow_calls: u64,
    /// Pages obtained through `grow`.
    pub pages_grown: u64,
    /// Host `grow` calls that failed.
    pub host_failures: u64,
    /// Allocations served from a size-class freelist.
    pub small_allocs: u64,
    /// Allocations served as large objects.
    pub large_allocs: u64,
    /// Successful non-null releases.
    pub releases: u64,
    /// Compaction passes over the large-object freelist.
    pub compactions: u64,
    /// Adjacent free large objects merged.
    pub merges: u64,
    /// Free fragments split off large objects.
    pub splits: u64,
    /// Single-chunk leftovers turned into whole-chunk small slots.
    pub repurposed_chunks: u64,
}

/// The allocator engine over a host memory `M`.
///
/// Addresses are offsets into `M`. Zero is never returned by a successful
/// allocation and is accepted as a no-op by [`Heap::release`].
pub struct Heap<M: HostMemory> {
    pub(super) memory: M,
    pub(super) config: HeapConfig,
    /// Per-class freelist heads (0 = empty), linked through the first word of
    /// each free slot.
    pub(super) small_freelists: [usize; NUM_SIZE_CLASSES],
    /// Head of the large-object freelist (0 = empty), unordered.
    pub(super) large_objects: usize,
    /// Set by every large release, cleared by the next compaction.
    pub(super) pending_compaction: bool,
    /// First page the engine owns; meaningful once `stats.heap_size > 0`.
    pub(super) heap_start: usize,
    pub(super) stats: HeapStats,
    lifecycle_logs: Vec<HeapLogRecord>,
    next_decision_id: u64,
}

impl<M: HostMemory> Heap<M> {
    /// Creates an engine over `memory`. No pages are taken until the first
    /// allocation.
    pub fn new(memory: M, config: HeapConfig) -> Self {
        Self {
            memory,
            config,
            small_freelists: [0; NUM_SIZE_CLASSES],
            large_objects: 0,
            pending_compaction: false,
            heap_start: 0,
            stats: HeapStats::default(),
            lifecycle_logs: Vec::new(),
            next_decision_id: 1,
        }
    }

    #[must_use]
    pub fn memory(&self) -> &M {
        &self.memory
    }

    /// Mutable access to the host memory, for reading and writing object
    /// contents. Writing outside live objects corrupts the heap.
    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.memory
    }

    #[must_use]
    pub fn config(&self) -> HeapConfig {
        self.config
    }

    #[must_use]
    pub fn stats(&self) -> HeapStats {
        self.stats
    }

    /// Returns the currently retained lifecycle records.
    #[must_use]
    pub fn lifecycle_logs(&self) -> &[HeapLogRecord] {
        &self.lifecycle_logs
    }

    /// Drains and returns the currently retained lifecycle records.
    pub fn drain_lifecycle_logs(&mut self) -> Vec<HeapLogRecord> {
        std::mem::take(&mut self.lifecycle_logs)
    }

    /// Allocates at least `size` bytes. The contents are unspecified.
    ///
    /// A zero-byte request still receives a one-granule slot.
    pub fn allocate(&mut self, size: usize) -> Result<usize, AllocError> {
        match size_class::size_to_class(size) {
            Some(class) => self.allocate_small(class),
            None => self.allocate_large(size),
        }
    }

    /// Allocates `count * size` zeroed bytes.
    pub fn allocate_zeroed(&mut self, count: usize, size: usize) -> Result<usize, AllocError> {
        let Some(total) = count.checked_mul(size) else {
            self.record_lifecycle(
                HeapLogLevel::Warn,
                "allocate_zeroed",
                "alloc",
                None,
                Some(size),
                None,
                "overflow",
                format!("count={count}"),
            );
            return Err(AllocError::SizeOverflow { size });
        };
        let ptr = self.allocate(total)?;
        self.memory.fill(ptr, 0, total);
        Ok(ptr)
    }

    /// Returns `ptr` to the heap. Releasing 0 is a no-op.
    ///
    /// Small objects go back on their class freelist. Large objects go on the
    /// large-object freelist and are merged with free neighbours before the
    /// next large allocation.
    pub fn release(&mut self, ptr: usize) -> Result<(), HeapError> {
        if ptr == 0 {
            self.record_lifecycle(
                HeapLogLevel::Trace,
                "release",
                "free_null",
                None,
                None,
                None,
                "noop",
                "null_pointer",
            );
            return Ok(());
        }
        let kind = self
            .classify(ptr)
            .map_err(|err| self.reject("release", ptr, err))?;
        match kind {
            ChunkKind::Small(class) => {
                if self.config.validation.enabled() && self.small_freelists[class.index()] == ptr {
                    return Err(self.reject("release", ptr, HeapError::DoubleFree { ptr }));
                }
                self.release_small(ptr, class);
            }
            ChunkKind::LargeObject => self.release_large(ptr),
            ChunkKind::FreeLargeObject => {
                return Err(self.reject("release", ptr, HeapError::DoubleFree { ptr }));
            }
        }
        self.stats.releases += 1;
        Ok(())
    }

    /// Resizes the object at `ptr` to at least `new_size` bytes.
    ///
    /// If `new_size` fits in the current usable size, `ptr` is returned
    /// unchanged and nothing moves. Otherwise a new object is allocated, the
    /// old contents copied, and the old object released. On failure the
    /// original object is untouched and still owned by the caller.
    /// `ptr == 0` behaves as [`Heap::allocate`].
    pub fn reallocate(&mut self, ptr: usize, new_size: usize) -> Result<usize, AllocError> {
        if ptr == 0 {
            return self.allocate(new_size);
        }
        let usable = self.usable_size(ptr)?;
        if new_size <= usable {
            self.record_lifecycle(
                HeapLogLevel::Trace,
                "reallocate",
                "realloc",
                Some(ptr),
                Some(new_size),
                None,
                "in_place",
                "fits_usable_size",
            );
            return Ok(ptr);
        }
        let fresh = match self.allocate(new_size) {
            Ok(fresh) => fresh,
            Err(err) => {
                self.record_lifecycle(
                    HeapLogLevel::Warn,
                    "reallocate",
                    "realloc",
                    Some(ptr),
                    Some(new_size),
                    None,
                    "failed",
                    "original_preserved",
                );
                return Err(err);
            }
        };
        self.memory.copy_within(ptr, fresh, usable);
        self.release(ptr)?;
        self.record_lifecycle(
            HeapLogLevel::Trace,
            "reallocate",
            "realloc",
            Some(fresh),
            Some(new_size),
            None,
            "moved",
            "copied_usable_size",
        );
        Ok(fresh)
    }

    /// Bytes usable at `ptr`: the slot size for small objects, the payload
    /// size for large ones.
    pub fn usable_size(&mut self, ptr: usize) -> Result<usize, HeapError> {
        let kind = self
            .classify(ptr)
            .map_err(|err| self.reject("usable_size", ptr, err))?;
        match kind {
            ChunkKind::Small(class) => Ok(class.slot_size()),
            ChunkKind::LargeObject => Ok(self
                .memory
                .read_word(ptr - LARGE_OBJECT_HEADER_SIZE + WORD_SIZE)),
            ChunkKind::FreeLargeObject => {
                Err(self.reject("usable_size", ptr, HeapError::NotAllocated { ptr }))
            }
        }
    }

    /// Kind of the chunk containing `ptr`.
    pub fn chunk_kind(&self, ptr: usize) -> Result<ChunkKind, HeapError> {
        if !self.in_heap(ptr) {
            return Err(HeapError::ForeignPointer { ptr });
        }
        ChunkKind::decode(self.memory.read_u8(kind_byte_addr(ptr)), ptr)
    }

    /// Returns true if `addr` lies inside pages the engine owns.
    #[must_use]
    pub fn in_heap(&self, addr: usize) -> bool {
        self.stats.heap_size > 0 && addr >= self.heap_start && addr < self.memory.reserved_size()
    }

    pub(super) fn set_kind(&mut self, addr: usize, kind: ChunkKind) {
        self.memory.write_u8(kind_byte_addr(addr), kind.to_byte());
    }

    /// Obtains whole pages able to hold `payload_size` bytes plus a page
    /// header. Returns the first page and the page count.
    ///
    /// On the first growth, host memory already committed above the heap base
    /// is consumed before asking the host for more. Later growth asks for at
    /// least half the current heap size. Nothing is committed to the engine's
    /// accounting unless the host call succeeds.
    pub(super) fn allocate_pages(&mut self, payload_size: usize) -> Result<(usize, usize), AllocError> {
        let overflow = AllocError::SizeOverflow { size: payload_size };
        let needed = payload_size
            .checked_add(PAGE_HEADER_SIZE)
            .ok_or(overflow)?;
        let reserved = self.memory.reserved_size();
        let first_growth = self.stats.heap_size == 0;
        let preallocated = if first_growth {
            let heap_start = align_up(self.memory.heap_base(), PAGE_SIZE).ok_or(overflow)?;
            reserved.saturating_sub(heap_start)
        } else {
            0
        };
        let base = reserved - preallocated;

        let mut grown = 0;
        if preallocated < needed {
            let floor = (self.stats.heap_size + preallocated) / 2;
            grown = align_up(floor.max(needed - preallocated), PAGE_SIZE).ok_or(overflow)?;
            if let Err(err) = self.memory.grow(grown / PAGE_SIZE) {
                self.stats.host_failures += 1;
                self.record_lifecycle(
                    HeapLogLevel::Warn,
                    "allocate",
                    "host_grow",
                    None,
                    Some(grown),
                    None,
                    "exhausted",
                    err.to_string(),
                );
                return Err(err.into());
            }
            self.stats.grow_calls += 1;
            self.stats.pages_grown += (grown / PAGE_SIZE) as u64;
        }

        if first_growth {
            self.heap_start = base;
        }
        let size = preallocated + grown;
        self.stats.heap_size += size;
        self.record_lifecycle(
            HeapLogLevel::Info,
            "allocate",
            "host_grow",
            Some(base),
            Some(size),
            None,
            "success",
            format!("preallocated={preallocated};grown={grown}"),
        );
        Ok((base, size / PAGE_SIZE))
    }

    /// Logs a rejected pointer and hands the error back.
    pub(super) fn reject(&mut self, symbol: &'static str, ptr: usize, err: HeapError) -> HeapError {
        self.record_lifecycle(
            HeapLogLevel::Error,
            symbol,
            "invalid_pointer",
            Some(ptr),
            None,
            None,
            "rejected",
            err.to_string(),
        );
        err
    }

    #[allow(clippy::too_many_arguments)]
    pub(super) fn record_lifecycle(
        &mut self,
        level: HeapLogLevel,
        symbol: &'static str,
        event: &'static str,
        ptr: Option<usize>,
        size: Option<usize>,
        kind: Option<ChunkKind>,
        outcome: &'static str,
        details: impl Into<String>,
    ) {
        if !self.config.logs(level) {
            return;
        }
        let decision_id = self.next_decision_id;
        self.next_decision_id = self.next_decision_id.wrapping_add(1);
        let trace_id = format!("core::heap::{symbol}::{decision_id:016x}");
        self.lifecycle_logs.push(HeapLogRecord {
            decision_id,
            trace_id,
            level,
            symbol,
            event,
            ptr,
            size,
            kind,
            outcome,
            details: details.into(),
            stats: self.stats,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::layout::{CHUNK_SIZE, FIRST_ALLOCATABLE_CHUNK, chunk_index};
    use crate::heap::memory::LinearMemory;
    use crate::heap::size_class::SizeClass;

    fn heap(initial_pages: usize, max_pages: usize) -> Heap<LinearMemory> {
        let memory = LinearMemory::new(initial_pages, max_pages).expect("memory");
        Heap::new(memory, HeapConfig::default().with_log_level(HeapLogLevel::Trace))
    }

    #[test]
    fn test_first_allocation_grows_one_page() {
        let mut h = heap(1, 8);
        let ptr = h.allocate(16).expect("alloc");
        assert_ne!(ptr, 0);
        assert_eq!(h.memory().grow_calls(), 1);
        assert_eq!(h.stats().heap_size, PAGE_SIZE);
        assert!(h.in_heap(ptr));
        assert!(chunk_index(ptr) >= FIRST_ALLOCATABLE_CHUNK);
    }

    #[test]
    fn test_preallocated_pages_are_consumed_first() {
        let mut h = heap(3, 8);
        let ptr = h.allocate(1000).expect("alloc");
        assert_eq!(h.memory().grow_calls(), 0);
        assert_eq!(h.stats().heap_size, 2 * PAGE_SIZE);
        assert_eq!(ptr, PAGE_SIZE + PAGE_HEADER_SIZE + LARGE_OBJECT_HEADER_SIZE);
    }

    #[test]
    fn test_growth_is_at_least_half_the_heap() {
        let mut h = heap(1, 64);
        // Fill four fresh pages exactly, then force another growth.
        let first = h.allocate(4 * PAGE_SIZE - PAGE_HEADER_SIZE - LARGE_OBJECT_HEADER_SIZE);
        assert!(first.is_ok());
        assert_eq!(h.stats().heap_size, 4 * PAGE_SIZE);
        h.allocate(300).expect("alloc");
        assert_eq!(h.stats().grow_calls, 2);
        assert_eq!(h.stats().heap_size, 6 * PAGE_SIZE);
    }

    #[test]
    fn test_failed_first_growth_keeps_preallocated_accounting() {
        let mut h = heap(2, 2);
        let err = h.allocate(3 * PAGE_SIZE).expect_err("too big");
        assert!(err.is_out_of_memory());
        assert_eq!(h.stats().heap_size, 0);
        assert_eq!(h.stats().host_failures, 1);
        // The preallocated page is still there for a request that fits.
        h.allocate(1000).expect("alloc");
        assert_eq!(h.stats().heap_size, PAGE_SIZE);
    }

    #[test]
    fn test_release_null_is_noop() {
        let mut h = heap(1, 2);
        assert_eq!(h.release(0), Ok(()));
        assert_eq!(h.stats().releases, 0);
    }

    #[test]
    fn test_allocate_zeroed_clears_recycled_memory() {
        let mut h = heap(1, 4);
        let p = h.allocate(64).expect("alloc");
        h.memory_mut().fill(p, 0xEE, 64);
        h.release(p).expect("release");
        let q = h.allocate_zeroed(8, 8).expect("calloc");
        assert_eq!(q, p);
        assert!(h.memory().bytes()[q..q + 64].iter().all(|&b| b == 0));
        assert_eq!(
            h.allocate_zeroed(usize::MAX, 2),
            Err(AllocError::SizeOverflow { size: 2 })
        );
    }

    #[test]
    fn test_reallocate_grows_and_preserves_content() {
        let mut h = heap(1, 8);
        let p = h.allocate(24).expect("alloc");
        for i in 0..24 {
            h.memory_mut().write_u8(p + i, i as u8);
        }
        let q = h.reallocate(p, 600).expect("realloc");
        assert_ne!(q, p);
        for i in 0..24 {
            assert_eq!(h.memory().read_u8(q + i), i as u8);
        }
        assert_eq!(h.chunk_kind(q), Ok(ChunkKind::LargeObject));
        assert!(h.usable_size(q).expect("usable") >= 600);
    }

    #[test]
    fn test_reallocate_null_allocates() {
        let mut h = heap(1, 4);
        let p = h.reallocate(0, 40).expect("realloc");
        let class = size_class::size_to_class(40).expect("small");
        assert_eq!(h.chunk_kind(p), Ok(ChunkKind::Small(class)));
    }

    #[test]
    fn test_reallocate_failure_keeps_original() {
        let mut h = heap(1, 2);
        let p = h.allocate(100).expect("alloc");
        h.memory_mut().fill(p, 0x42, 100);
        let err = h.reallocate(p, 4 * PAGE_SIZE).expect_err("exhausted");
        assert!(err.is_out_of_memory());
        assert!(h.memory().bytes()[p..p + 100].iter().all(|&b| b == 0x42));
        h.release(p).expect("original still live");
    }

    #[test]
    fn test_usable_size() {
        let mut h = heap(1, 4);
        let small = h.allocate(33).expect("alloc");
        assert_eq!(h.usable_size(small), Ok(40));
        let large = h.allocate(1000).expect("alloc");
        assert_eq!(h.usable_size(large), Ok(1008));
        h.release(large).expect("release");
        assert_eq!(h.usable_size(large), Err(HeapError::NotAllocated { ptr: large }));
    }

    #[test]
    fn test_whole_chunk_class_on_fresh_heap() {
        let mut h = heap(1, 4);
        let p = h.allocate(CHUNK_SIZE).expect("alloc");
        assert_eq!(p % CHUNK_SIZE, 0);
        assert_eq!(h.chunk_kind(p), Ok(ChunkKind::Small(SizeClass::WHOLE_CHUNK)));
    }

    #[test]
    fn test_logs_are_gated_and_drainable() {
        let mut h = heap(1, 4);
        h.allocate(8).expect("alloc");
        let logs = h.drain_lifecycle_logs();
        assert!(logs.iter().any(|r| r.event == "host_grow" && r.level == HeapLogLevel::Info));
        assert!(logs.iter().any(|r| r.event == "alloc" && r.outcome == "success"));
        assert!(logs.iter().all(|r| r.trace_id.starts_with("core::heap::")));
        assert!(h.lifecycle_logs().is_empty());

        let memory = LinearMemory::new(1, 4).expect("memory");
        let mut quiet = Heap::new(memory, HeapConfig::default());
        quiet.allocate(8).expect("alloc");
        assert!(quiet.lifecycle_logs().is_empty());
    }

    #[test]
    fn test_decision_ids_are_monotonic() {
        let mut h = heap(1, 4);
        for size in [8, 16, 300, 24] {
            h.allocate(size).expect("alloc");
        }
        let ids: Vec<u64> = h.lifecycle_logs().iter().map(|r| r.decision_id).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }
}
