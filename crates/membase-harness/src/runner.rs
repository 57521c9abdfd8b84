//! Storm execution engine.

use membase_core::{
    AllocError, Heap, HeapConfig, HeapError, HeapLogLevel, HeapLogRecord, HostError, LinearMemory,
    ValidationLevel,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::structured_log::CounterSnapshot;
use crate::workload::{self, Op, StormType};

/// Parameters of one storm run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunConfig {
    pub storm: StormType,
    pub seed: u64,
    pub ops: usize,
    /// Pages the host has committed before the engine starts.
    pub initial_pages: usize,
    /// Growth ceiling; requests beyond it count as out-of-memory.
    pub max_pages: usize,
    pub validation: ValidationLevel,
    pub log_level: Option<HeapLogLevel>,
    /// Run `check_invariants` every this many ops (0 = only at the end).
    pub check_every: usize,
}

impl RunConfig {
    #[must_use]
    pub fn new(storm: StormType, seed: u64, ops: usize) -> Self {
        Self {
            storm,
            seed,
            ops,
            initial_pages: 1,
            max_pages: 1024,
            validation: ValidationLevel::Strict,
            log_level: None,
            check_every: 64,
        }
    }

    fn validate(&self) -> Result<(), RunError> {
        if self.initial_pages == 0 {
            return Err(RunError::InvalidConfig(
                "initial_pages must be at least 1".to_string(),
            ));
        }
        if self.max_pages < self.initial_pages {
            return Err(RunError::InvalidConfig(format!(
                "max_pages ({}) is below initial_pages ({})",
                self.max_pages, self.initial_pages
            )));
        }
        Ok(())
    }
}

/// Storm run failure.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid run configuration: {0}")]
    InvalidConfig(String),
    #[error("host memory setup failed: {0}")]
    Host(#[from] HostError),
    #[error("step {step}: {source}")]
    Heap {
        step: usize,
        #[source]
        source: HeapError,
    },
    #[error("step {step}: allocation failed: {source}")]
    Alloc {
        step: usize,
        #[source]
        source: AllocError,
    },
    #[error("step {step}: block {ptr:#x} ({size} bytes) lost its contents")]
    Corrupted { step: usize, ptr: usize, size: usize },
}

/// Machine-readable summary of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub storm: StormType,
    pub seed: u64,
    pub ops: usize,
    pub allocations: u64,
    pub releases: u64,
    pub reallocations: u64,
    /// Reallocations that returned the same block.
    pub in_place_reallocations: u64,
    /// Requests refused because the host could not grow.
    pub out_of_memory: u64,
    pub peak_live_blocks: usize,
    pub peak_live_bytes: usize,
    pub invariant_checks: u64,
    /// SHA-256 over every address the engine handed out, in order. Equal
    /// digests mean identical placement decisions.
    pub placement_digest: String,
    /// Engine counters after every remaining block was released.
    pub counters: CounterSnapshot,
}

/// Report plus the engine lifecycle records collected during the run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub report: RunReport,
    pub records: Vec<HeapLogRecord>,
}

#[derive(Debug, Clone, Copy)]
struct Block {
    ptr: usize,
    size: usize,
    tag: u8,
}

/// Runs storms against a fresh engine over [`LinearMemory`].
pub struct StormRunner {
    config: RunConfig,
}

impl StormRunner {
    #[must_use]
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Generates the configured storm and runs it.
    pub fn run(&self) -> Result<RunOutput, RunError> {
        let ops = workload::generate(self.config.storm, self.config.seed, self.config.ops);
        self.run_ops(&ops)
    }

    /// Runs an explicit op list.
    ///
    /// Every live block is stamped with a per-block byte and re-checked when
    /// it is released, resized, or drained at the end.
    pub fn run_ops(&self, ops: &[Op]) -> Result<RunOutput, RunError> {
        self.config.validate()?;
        let memory = LinearMemory::new(self.config.initial_pages, self.config.max_pages)?;
        let heap_config = HeapConfig {
            log_level: self.config.log_level,
            validation: self.config.validation,
        };
        let mut heap = Heap::new(memory, heap_config);
        let mut live: Vec<Block> = Vec::new();
        let mut live_bytes = 0usize;
        let mut report = RunReport {
            storm: self.config.storm,
            seed: self.config.seed,
            ops: ops.len(),
            allocations: 0,
            releases: 0,
            reallocations: 0,
            in_place_reallocations: 0,
            out_of_memory: 0,
            peak_live_blocks: 0,
            peak_live_bytes: 0,
            invariant_checks: 0,
            placement_digest: String::new(),
            counters: CounterSnapshot::default(),
        };
        let mut placements = Sha256::new();

        for (step, op) in ops.iter().enumerate() {
            let tag = stamp_tag(step);
            match *op {
                Op::Allocate { size } => match heap.allocate(size) {
                    Ok(ptr) => {
                        record_placement(&mut placements, step, Some(ptr));
                        stamp(&mut heap, ptr, size, tag);
                        live.push(Block { ptr, size, tag });
                        live_bytes += size;
                        report.allocations += 1;
                    }
                    Err(err) if err.is_out_of_memory() => {
                        record_placement(&mut placements, step, None);
                        report.out_of_memory += 1;
                    }
                    Err(source) => return Err(RunError::Alloc { step, source }),
                },
                Op::Release { slot } => {
                    if live.is_empty() {
                        continue;
                    }
                    let block = live.swap_remove(slot % live.len());
                    verify(&heap, step, block.ptr, block.size, block.tag)?;
                    heap.release(block.ptr)
                        .map_err(|source| RunError::Heap { step, source })?;
                    live_bytes -= block.size;
                    report.releases += 1;
                }
                Op::Reallocate { slot, size } => {
                    if live.is_empty() {
                        continue;
                    }
                    let idx = slot % live.len();
                    let block = live[idx];
                    verify(&heap, step, block.ptr, block.size, block.tag)?;
                    match heap.reallocate(block.ptr, size) {
                        Ok(ptr) => {
                            record_placement(&mut placements, step, Some(ptr));
                            let kept = block.size.min(size);
                            verify(&heap, step, ptr, kept, block.tag)?;
                            stamp(&mut heap, ptr, size, tag);
                            live[idx] = Block { ptr, size, tag };
                            live_bytes = live_bytes - block.size + size;
                            report.reallocations += 1;
                            if ptr == block.ptr {
                                report.in_place_reallocations += 1;
                            }
                        }
                        Err(err) if err.is_out_of_memory() => {
                            record_placement(&mut placements, step, None);
                            report.out_of_memory += 1;
                            verify(&heap, step, block.ptr, block.size, block.tag)?;
                        }
                        Err(source) => return Err(RunError::Alloc { step, source }),
                    }
                }
            }
            report.peak_live_blocks = report.peak_live_blocks.max(live.len());
            report.peak_live_bytes = report.peak_live_bytes.max(live_bytes);
            if self.config.check_every > 0 && (step + 1) % self.config.check_every == 0 {
                heap.check_invariants()
                    .map_err(|source| RunError::Heap { step, source })?;
                report.invariant_checks += 1;
            }
        }

        let step = ops.len();
        for block in live.drain(..) {
            verify(&heap, step, block.ptr, block.size, block.tag)?;
            heap.release(block.ptr)
                .map_err(|source| RunError::Heap { step, source })?;
        }
        heap.check_invariants()
            .map_err(|source| RunError::Heap { step, source })?;
        report.invariant_checks += 1;
        report.counters = heap.stats().into();
        report.placement_digest = hex_lower(&placements.finalize());

        Ok(RunOutput {
            report,
            records: heap.drain_lifecycle_logs(),
        })
    }
}

fn record_placement(placements: &mut Sha256, step: usize, ptr: Option<usize>) {
    placements.update((step as u64).to_le_bytes());
    placements.update(ptr.map_or(u64::MAX, |p| p as u64).to_le_bytes());
}

fn hex_lower(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(&mut out, "{b:02x}");
    }
    out
}

// Never zero, so a stamped block differs from fresh memory.
fn stamp_tag(step: usize) -> u8 {
    (step % 255) as u8 + 1
}

fn stamp(heap: &mut Heap<LinearMemory>, ptr: usize, size: usize, tag: u8) {
    heap.memory_mut().bytes_mut()[ptr..ptr + size].fill(tag);
}

fn verify(
    heap: &Heap<LinearMemory>,
    step: usize,
    ptr: usize,
    size: usize,
    tag: u8,
) -> Result<(), RunError> {
    if heap.memory().bytes()[ptr..ptr + size].iter().all(|b| *b == tag) {
        Ok(())
    } else {
        Err(RunError::Corrupted { step, ptr, size })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_storm_completes_cleanly() {
        for storm in StormType::ALL {
            let output = StormRunner::new(RunConfig::new(storm, 0x5EED, 600))
                .run()
                .unwrap_or_else(|err| panic!("{storm}: {err}"));
            let report = output.report;
            assert_eq!(report.ops, 600);
            assert!(report.allocations > 0, "{storm}");
            assert!(report.invariant_checks >= 600 / 64, "{storm}");
            assert!(output.records.is_empty());
        }
    }

    #[test]
    fn runs_are_reproducible() {
        let config = RunConfig::new(StormType::Mixed, 42, 800);
        let a = StormRunner::new(config).run().expect("run").report;
        let b = StormRunner::new(config).run().expect("run").report;
        assert_eq!(a, b);
        assert_eq!(a.placement_digest.len(), 64);
        let other = StormRunner::new(RunConfig::new(StormType::Mixed, 43, 800))
            .run()
            .expect("run")
            .report;
        assert_ne!(a.placement_digest, other.placement_digest);
    }

    #[test]
    fn exhaustion_is_counted_not_fatal() {
        let mut config = RunConfig::new(StormType::LargeChurn, 9, 400);
        config.max_pages = 4;
        let report = StormRunner::new(config).run().expect("run").report;
        assert!(report.out_of_memory > 0);
    }

    #[test]
    fn realloc_ladder_grows_then_reuses() {
        let report = StormRunner::new(RunConfig::new(StormType::ReallocLadder, 0, 60))
            .run()
            .expect("run")
            .report;
        assert_eq!(report.allocations, 1);
        assert_eq!(report.reallocations, 59);
        assert!(report.in_place_reallocations > 0);
    }

    #[test]
    fn fragmentation_storm_coalesces() {
        let report = StormRunner::new(RunConfig::new(StormType::Fragmentation, 3, 900))
            .run()
            .expect("run")
            .report;
        assert!(report.counters.compactions > 0);
    }

    #[test]
    fn records_follow_log_level() {
        let mut config = RunConfig::new(StormType::SmallChurn, 1, 100);
        config.log_level = Some(HeapLogLevel::Info);
        let output = StormRunner::new(config).run().expect("run");
        assert!(!output.records.is_empty());
        assert!(output.records.iter().all(|r| r.level >= HeapLogLevel::Info));
        assert!(output.records.iter().any(|r| r.event == "host_grow"));
    }

    #[test]
    fn bad_configuration_is_rejected() {
        let mut config = RunConfig::new(StormType::Mixed, 1, 10);
        config.max_pages = 0;
        assert!(matches!(
            StormRunner::new(config).run(),
            Err(RunError::InvalidConfig(_))
        ));
    }
}
