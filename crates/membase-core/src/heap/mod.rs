//! General-purpose allocator engine for grow-only linear memory.
//!
//! Memory is taken from a [`HostMemory`] in 64 KiB pages. Each page starts
//! with a header chunk holding one kind byte per 256-byte chunk; the kind byte
//! decides how any address in that chunk is sized and freed.
//!
//! - Requests up to 256 bytes are rounded to one of ten granule classes and
//!   served from per-class LIFO freelists threaded through free slots.
//! - Larger requests are served best-fit from one freelist of large objects,
//!   each a chunk-aligned run with an in-band header. Releases only push;
//!   adjacent free objects are merged lazily before the next large search.
//!   Oversized picks are split, and single-chunk leftovers feed the
//!   whole-chunk pool used to carve small-object chunks.
//! - When nothing fits, the host is asked for more pages: first any memory it
//!   already committed above the heap base, then at least half the current
//!   heap size.

mod allocator;
mod config;
mod error;
mod kind;
mod large;
pub mod layout;
mod log;
mod memory;
#[allow(unsafe_code)]
mod region;
pub mod size_class;
mod small;
mod verify;

pub use allocator::{Heap, HeapStats};
pub use config::{HeapConfig, ValidationLevel};
pub use error::{AllocError, HeapError, HostError};
pub use kind::ChunkKind;
pub use log::{HeapLogLevel, HeapLogRecord};
pub use memory::{DEFAULT_HEAP_BASE, HostMemory, LinearMemory};
pub use region::RegionMemory;
pub use size_class::SizeClass;
