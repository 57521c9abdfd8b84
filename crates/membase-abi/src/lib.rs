// Every export takes raw pointers from C callers and forwards them to the
// active backend, whose contract is the safety documentation.
#![allow(clippy::missing_safety_doc)]
//! # membase-abi
//!
//! `extern "C"` boundary for the membase backend contract. The `cdylib`
//! exports `membase_*` symbols for raw allocation, bulk memory, fatal abort
//! and atomics, all routed through one backend chosen at build time:
//!
//! ```text
//! C caller -> membase_* entry (this crate) -> active backend -> return
//! ```
//!
//! - `system-backend` (default): the host C library allocator.
//! - `heap-backend`: the allocator engine over a page region reserved on first
//!   use, sized by `MEMBASE_MAX_PAGES`.

#[macro_use]
mod macros;

pub mod abort_abi;
pub mod atomics_abi;
pub mod backend_state;
pub mod malloc_abi;
pub mod string_abi;

pub use backend_state::{active_backend, active_backend_name};
