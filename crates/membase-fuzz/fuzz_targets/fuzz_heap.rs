#![no_main]
use libfuzzer_sys::fuzz_target;
use membase_core::{Heap, HeapConfig, LinearMemory};

// Each 4-byte record is one operation: opcode, 16-bit size, slot selector.
fuzz_target!(|data: &[u8]| {
    let Ok(memory) = LinearMemory::new(1, 64) else {
        return;
    };
    let mut heap = Heap::new(memory, HeapConfig::default());
    let mut live: Vec<(usize, usize, u8)> = Vec::new();

    for (step, chunk) in data.chunks_exact(4).enumerate() {
        let scale = 1 + usize::from(chunk[0] >> 6);
        let size = usize::from(u16::from_le_bytes([chunk[1], chunk[2]])) * scale;
        let tag = chunk[3] | 1;
        match chunk[0] % 3 {
            0 => {
                if let Ok(ptr) = heap.allocate(size) {
                    heap.memory_mut().bytes_mut()[ptr..ptr + size].fill(tag);
                    live.push((ptr, size, tag));
                }
            }
            1 => {
                if live.is_empty() {
                    continue;
                }
                let (ptr, size, tag) = live.swap_remove(usize::from(chunk[3]) % live.len());
                assert!(heap.memory().bytes()[ptr..ptr + size].iter().all(|b| *b == tag));
                heap.release(ptr).expect("release of a live block");
            }
            _ => {
                if live.is_empty() {
                    continue;
                }
                let idx = usize::from(chunk[3]) % live.len();
                let (ptr, old_size, old_tag) = live[idx];
                if let Ok(moved) = heap.reallocate(ptr, size) {
                    let kept = old_size.min(size);
                    let bytes = &heap.memory().bytes()[moved..moved + kept];
                    assert!(bytes.iter().all(|b| *b == old_tag));
                    heap.memory_mut().bytes_mut()[moved..moved + size].fill(tag);
                    live[idx] = (moved, size, tag);
                }
            }
        }
        if step % 32 == 0 {
            heap.check_invariants().expect("invariants");
        }
    }

    for (ptr, _, _) in live {
        heap.release(ptr).expect("release of a live block");
    }
    heap.check_invariants().expect("invariants");
});
