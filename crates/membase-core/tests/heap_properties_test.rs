//! End-to-end properties of the allocator engine over a `LinearMemory` host.

use membase_core::heap::layout::{
    CHUNK_SIZE, LARGE_OBJECT_HEADER_SIZE, PAGE_HEADER_SIZE, PAGE_SIZE, page_of,
};
use membase_core::heap::size_class::size_to_class;
use membase_core::{
    AllocError, ChunkKind, Heap, HeapConfig, HostError, LinearMemory, SizeClass,
};

fn heap(max_pages: usize) -> Heap<LinearMemory> {
    let memory = LinearMemory::new(1, max_pages).expect("memory");
    Heap::new(memory, HeapConfig::default().without_logs())
}

struct XorShift64(u64);

impl XorShift64 {
    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn below(&mut self, bound: usize) -> usize {
        (self.next() % bound as u64) as usize
    }
}

#[test]
fn every_small_size_lands_in_its_class() {
    let mut h = heap(16);
    for size in 0..=CHUNK_SIZE {
        let p = h.allocate(size).expect("alloc");
        let class = size_to_class(size).expect("small size");
        assert_eq!(h.chunk_kind(p), Ok(ChunkKind::Small(class)), "size {size}");
        assert!(class.slot_size() >= size.max(1));
        assert_eq!(h.usable_size(p), Ok(class.slot_size()));
    }
    for size in [CHUNK_SIZE + 1, 1000, PAGE_SIZE, 3 * PAGE_SIZE] {
        let p = h.allocate(size).expect("alloc");
        assert_eq!(h.chunk_kind(p), Ok(ChunkKind::LargeObject), "size {size}");
        assert_eq!(p % CHUNK_SIZE, LARGE_OBJECT_HEADER_SIZE);
        assert!(h.usable_size(p).expect("usable") >= size);
    }
    h.check_invariants().expect("invariants");
}

#[test]
fn small_slots_are_reused_lifo() {
    let mut h = heap(4);
    let a = h.allocate(40).expect("alloc");
    let b = h.allocate(40).expect("alloc");
    h.release(a).expect("release");
    h.release(b).expect("release");
    assert_eq!(h.allocate(40), Ok(b));
    assert_eq!(h.allocate(40), Ok(a));
}

#[test]
fn reverse_release_then_reallocate_reuses_the_same_slots() {
    let mut h = heap(4);
    let first: Vec<usize> = (0..10).map(|_| h.allocate(16).expect("alloc")).collect();
    let grows = h.memory().grow_calls();
    for ptr in first.iter().rev() {
        h.release(*ptr).expect("release");
    }
    let mut second: Vec<usize> = (0..10).map(|_| h.allocate(16).expect("alloc")).collect();
    let mut expected = first.clone();
    expected.sort_unstable();
    second.sort_unstable();
    assert_eq!(second, expected);
    assert_eq!(h.memory().grow_calls(), grows);
}

#[test]
fn freed_neighbours_coalesce_without_growth() {
    let mut h = heap(2);
    let a = h.allocate(1000).expect("alloc");
    let b = h.allocate(1000).expect("alloc");
    // Exactly fills the rest of the page.
    let c = h.allocate(63_216).expect("alloc");
    assert_eq!(page_of(a), page_of(c));
    assert_eq!(h.usable_size(c), Ok(63_216));
    h.release(a).expect("release");
    h.release(b).expect("release");

    let grows = h.memory().grow_calls();
    assert_eq!(h.allocate(1900), Ok(a));
    assert_eq!(h.memory().grow_calls(), grows);
    assert_eq!(h.stats().merges, 1);
    h.check_invariants().expect("invariants");
}

#[test]
fn one_chunk_slack_becomes_a_whole_chunk_slot() {
    let mut h = heap(2);
    let p = h.allocate(65_008).expect("alloc");
    let page = page_of(p);
    assert_eq!(p, page + PAGE_HEADER_SIZE + LARGE_OBJECT_HEADER_SIZE);
    let leftover = page + PAGE_SIZE - CHUNK_SIZE;
    assert_eq!(
        h.chunk_kind(leftover),
        Ok(ChunkKind::Small(SizeClass::WHOLE_CHUNK))
    );
    assert_eq!(h.stats().repurposed_chunks, 1);
    assert_eq!(h.allocate(CHUNK_SIZE), Ok(leftover));
}

#[test]
fn released_megabyte_serves_half_megabyte_in_place() {
    let mut h = heap(64);
    let big = h.allocate(1 << 20).expect("alloc");
    h.release(big).expect("release");
    let grows = h.memory().grow_calls();
    let half = h.allocate(1 << 19).expect("alloc");
    assert_eq!(half, big);
    assert_eq!(h.memory().grow_calls(), grows);
    let usable = h.usable_size(half).expect("usable");
    assert!(usable >= 1 << 19);
    assert_eq!((half + usable) % PAGE_SIZE, 0);
    h.check_invariants().expect("invariants");
}

#[test]
fn shrinking_reallocation_is_idempotent() {
    let mut h = heap(16);
    for size in [24, 1000, 3 * PAGE_SIZE] {
        let p = h.allocate(size).expect("alloc");
        let usable = h.usable_size(p).expect("usable");
        assert_eq!(h.reallocate(p, size / 2), Ok(p));
        assert_eq!(h.reallocate(p, usable), Ok(p));
        assert_eq!(h.usable_size(p), Ok(usable));
        h.release(p).expect("release");
    }
}

#[test]
fn growing_reallocation_keeps_contents() {
    let mut h = heap(8);
    let p = h.allocate(100).expect("alloc");
    for (i, byte) in h.memory_mut().bytes_mut()[p..p + 100].iter_mut().enumerate() {
        *byte = i as u8;
    }
    let q = h.reallocate(p, 5000).expect("realloc");
    assert_ne!(q, p);
    let copied: Vec<u8> = h.memory().bytes()[q..q + 100].to_vec();
    assert_eq!(copied, (0..100).map(|i| i as u8).collect::<Vec<_>>());
}

#[test]
fn host_exhaustion_is_an_error_not_an_abort() {
    let mut h = heap(2);
    let err = h.allocate(3 * PAGE_SIZE).expect_err("must exhaust");
    assert!(err.is_out_of_memory());
    assert!(matches!(
        err,
        AllocError::OutOfMemory(HostError::Exhausted { .. })
    ));
    assert_eq!(h.stats().host_failures, 1);
    // The heap is still usable afterwards.
    let p = h.allocate(64).expect("alloc");
    h.release(p).expect("release");
    h.check_invariants().expect("invariants");
}

#[test]
fn preallocated_memory_is_used_before_growing() {
    let memory = LinearMemory::new(3, 8).expect("memory");
    let mut h = Heap::new(memory, HeapConfig::default().without_logs());
    let p = h.allocate(50_000).expect("alloc");
    assert_eq!(p, PAGE_SIZE + PAGE_HEADER_SIZE + LARGE_OBJECT_HEADER_SIZE);
    assert_eq!(h.memory().grow_calls(), 0);
    assert_eq!(h.stats().heap_size, 2 * PAGE_SIZE);
}

#[test]
fn random_churn_keeps_contents_and_invariants() {
    let mut h = heap(512);
    let mut rng = XorShift64(0x9e37_79b9_7f4a_7c15);
    let mut live: Vec<(usize, usize, u8)> = Vec::new();
    for step in 0..4000u32 {
        let roll = rng.below(10);
        if roll < 4 || live.is_empty() {
            let size = match rng.below(4) {
                0 => rng.below(CHUNK_SIZE + 1),
                1 => rng.below(4096),
                2 => rng.below(PAGE_SIZE),
                _ => rng.below(3 * PAGE_SIZE),
            };
            match h.allocate(size) {
                Ok(p) => {
                    let tag = (step % 251) as u8;
                    h.memory_mut().bytes_mut()[p..p + size].fill(tag);
                    live.push((p, size, tag));
                }
                Err(err) => assert!(err.is_out_of_memory(), "step {step}: {err}"),
            }
        } else if roll < 8 {
            let (p, size, tag) = live.swap_remove(rng.below(live.len()));
            assert!(
                h.memory().bytes()[p..p + size].iter().all(|b| *b == tag),
                "step {step}: block {p:#x} was overwritten"
            );
            h.release(p).expect("release");
        } else {
            let idx = rng.below(live.len());
            let (p, size, tag) = live[idx];
            let new_size = rng.below(2 * PAGE_SIZE);
            if let Ok(q) = h.reallocate(p, new_size) {
                let kept = size.min(new_size);
                assert!(h.memory().bytes()[q..q + kept].iter().all(|b| *b == tag));
                h.memory_mut().bytes_mut()[q..q + new_size].fill(tag);
                live[idx] = (q, new_size, tag);
            }
        }
        if step % 250 == 0 {
            h.check_invariants().expect("invariants");
        }
    }
    for (p, size, tag) in live.drain(..) {
        assert!(h.memory().bytes()[p..p + size].iter().all(|b| *b == tag));
        h.release(p).expect("release");
    }
    h.check_invariants().expect("invariants");
}
