//! # membase-core
//!
//! Low-level memory substrate: a pluggable backend contract for raw
//! allocation, bulk-memory operations, fatal abort and atomics, plus a
//! general-purpose allocator engine for hosts that only expose a grow-only
//! linear memory ("grow by N pages").
//!
//! Unsafe code is denied at the crate level. The only modules allowed to
//! touch raw pointers are the backend implementations and the page-aligned
//! region handed to the heap backend; the engine itself works on offsets
//! through the [`heap::HostMemory`] view.

#![deny(unsafe_code)]

pub mod abort;
pub mod atomics;
#[allow(unsafe_code)]
pub mod backend;
pub mod bulk;
pub mod config;
pub mod heap;

pub use abort::{fatal_abort, fatal_abort_with, register_abort_hook};
pub use atomics::{Atomics, DefaultAtomics, FencedAtomics, IntrinsicAtomics, UnsyncAtomics};
pub use backend::{Backend, HeapBackend, SystemBackend};
pub use config::ValidationLevel;
pub use heap::{
    AllocError, ChunkKind, Heap, HeapConfig, HeapError, HeapLogLevel, HeapLogRecord, HeapStats,
    HostError, HostMemory, LinearMemory, RegionMemory, SizeClass,
};
