//! Deterministic allocation storms.
//!
//! A storm is a flat list of [`Op`]s generated from a seed. Operations name
//! live blocks by position, taken modulo the live count when the op runs, so
//! the same list replays identically against any engine configuration.

use std::fmt;
use std::str::FromStr;

use membase_core::heap::layout::{CHUNK_SIZE, PAGE_SIZE};
use serde::{Deserialize, Serialize};

/// Shape of a generated workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum StormType {
    /// Small objects only, allocated and freed in roughly equal measure.
    SmallChurn,
    /// Large objects from just over a chunk to a few pages.
    LargeChurn,
    /// Both size ranges interleaved, with occasional reallocation.
    Mixed,
    /// One block reallocated upward and back down repeatedly.
    ReallocLadder,
    /// Many mid-size blocks, every other one freed, then larger requests
    /// that only fit once neighbours coalesce.
    Fragmentation,
}

impl StormType {
    pub const ALL: [StormType; 5] = [
        StormType::SmallChurn,
        StormType::LargeChurn,
        StormType::Mixed,
        StormType::ReallocLadder,
        StormType::Fragmentation,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            StormType::SmallChurn => "small_churn",
            StormType::LargeChurn => "large_churn",
            StormType::Mixed => "mixed",
            StormType::ReallocLadder => "realloc_ladder",
            StormType::Fragmentation => "fragmentation",
        }
    }
}

impl fmt::Display for StormType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StormType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        StormType::ALL
            .into_iter()
            .find(|storm| storm.as_str() == wanted)
            .ok_or_else(|| format!("unknown storm type: '{s}'"))
    }
}

/// One step of a storm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    Allocate { size: usize },
    /// Free the live block at `slot % live`.
    Release { slot: usize },
    /// Resize the live block at `slot % live`.
    Reallocate { slot: usize, size: usize },
}

/// XorShift64 generator. A zero seed is replaced by a fixed constant.
#[derive(Debug, Clone)]
pub struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { 0x9E37_79B9_7F4A_7C15 } else { seed },
        }
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Uniform-ish value in `0..bound`; `bound` must be non-zero.
    pub fn below(&mut self, bound: usize) -> usize {
        (self.next_u64() % bound as u64) as usize
    }

    /// Value in `lo..=hi`.
    pub fn between(&mut self, lo: usize, hi: usize) -> usize {
        lo + self.below(hi - lo + 1)
    }

    pub fn chance(&mut self, percent: usize) -> bool {
        self.below(100) < percent
    }
}

/// Generates `ops` operations of the given storm type.
#[must_use]
pub fn generate(storm: StormType, seed: u64, ops: usize) -> Vec<Op> {
    let mut rng = XorShift64::new(seed);
    let mut out = Vec::with_capacity(ops);
    let slot = |rng: &mut XorShift64| rng.next_u64() as usize;
    match storm {
        StormType::SmallChurn => {
            for _ in 0..ops {
                if rng.chance(55) {
                    out.push(Op::Allocate {
                        size: rng.between(0, CHUNK_SIZE),
                    });
                } else {
                    out.push(Op::Release { slot: slot(&mut rng) });
                }
            }
        }
        StormType::LargeChurn => {
            for _ in 0..ops {
                if rng.chance(55) {
                    out.push(Op::Allocate {
                        size: rng.between(CHUNK_SIZE + 1, 4 * PAGE_SIZE),
                    });
                } else {
                    out.push(Op::Release { slot: slot(&mut rng) });
                }
            }
        }
        StormType::Mixed => {
            for _ in 0..ops {
                let roll = rng.below(100);
                let op = if roll < 45 {
                    let size = if rng.chance(70) {
                        rng.between(0, CHUNK_SIZE)
                    } else {
                        rng.between(CHUNK_SIZE + 1, 2 * PAGE_SIZE)
                    };
                    Op::Allocate { size }
                } else if roll < 85 {
                    Op::Release { slot: slot(&mut rng) }
                } else {
                    Op::Reallocate {
                        slot: slot(&mut rng),
                        size: rng.between(0, PAGE_SIZE),
                    }
                };
                out.push(op);
            }
        }
        StormType::ReallocLadder => {
            if ops > 0 {
                out.push(Op::Allocate { size: 1 });
            }
            let mut size = 1usize;
            let mut growing = true;
            for _ in 1..ops {
                if growing {
                    size = size.saturating_mul(2).min(8 * PAGE_SIZE);
                    growing = size < 8 * PAGE_SIZE;
                } else {
                    size = (size / 2).max(1);
                    growing = size == 1;
                }
                out.push(Op::Reallocate { slot: 0, size });
            }
        }
        StormType::Fragmentation => {
            let wave = (ops / 3).max(1);
            for _ in 0..wave.min(ops) {
                out.push(Op::Allocate {
                    size: rng.between(CHUNK_SIZE + 1, 4 * CHUNK_SIZE),
                });
            }
            // Freeing slot i leaves the block formerly at i+1 in its place,
            // so stepping by one frees every other original block.
            let mut i = 0;
            while out.len() < ops && i < wave / 2 {
                out.push(Op::Release { slot: i });
                i += 1;
            }
            while out.len() < ops {
                out.push(Op::Allocate {
                    size: rng.between(4 * CHUNK_SIZE, 12 * CHUNK_SIZE),
                });
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_is_deterministic() {
        for storm in StormType::ALL {
            let a = generate(storm, 0xDEAD_BEEF, 500);
            let b = generate(storm, 0xDEAD_BEEF, 500);
            assert_eq!(a, b, "{storm}");
            assert_eq!(a.len(), 500, "{storm}");
        }
        assert_ne!(
            generate(StormType::Mixed, 1, 200),
            generate(StormType::Mixed, 2, 200)
        );
    }

    #[test]
    fn small_churn_stays_small() {
        for op in generate(StormType::SmallChurn, 7, 1000) {
            if let Op::Allocate { size } = op {
                assert!(size <= CHUNK_SIZE);
            }
        }
    }

    #[test]
    fn large_churn_stays_large() {
        for op in generate(StormType::LargeChurn, 7, 1000) {
            if let Op::Allocate { size } = op {
                assert!(size > CHUNK_SIZE);
            }
        }
    }

    #[test]
    fn ladder_climbs_and_descends() {
        let ops = generate(StormType::ReallocLadder, 0, 40);
        assert_eq!(ops[0], Op::Allocate { size: 1 });
        let sizes: Vec<usize> = ops[1..]
            .iter()
            .map(|op| match op {
                Op::Reallocate { size, .. } => *size,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(sizes[0], 2);
        assert!(sizes.contains(&(8 * PAGE_SIZE)));
        let peak = sizes.iter().position(|s| *s == 8 * PAGE_SIZE).expect("peak");
        assert!(sizes[peak + 1] < sizes[peak]);
    }

    #[test]
    fn storm_names_round_trip() {
        for storm in StormType::ALL {
            assert_eq!(storm.as_str().parse::<StormType>(), Ok(storm));
        }
        assert_eq!("Small-Churn".parse::<StormType>(), Ok(StormType::SmallChurn));
        assert!("tornado".parse::<StormType>().is_err());
    }

    #[test]
    fn xorshift_zero_seed_is_usable() {
        let mut rng = XorShift64::new(0);
        assert_ne!(rng.next_u64(), 0);
        for _ in 0..100 {
            let v = rng.between(3, 5);
            assert!((3..=5).contains(&v));
        }
    }
}
