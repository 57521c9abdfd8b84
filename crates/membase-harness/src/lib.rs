//! Workload and evidence tooling for the membase allocator engine.
//!
//! This crate provides:
//! - Workloads: deterministic allocation storms generated from a seed
//! - Runner: executes a storm against an engine over `LinearMemory`, stamping
//!   and re-checking block contents and heap invariants as it goes
//! - Structured logs: JSONL emission of engine lifecycle records and a schema
//!   validator for log files
//! - Layout: a machine-readable dump of page, chunk and size-class geometry

#![forbid(unsafe_code)]

pub mod layout;
pub mod runner;
pub mod structured_log;
pub mod workload;

pub use layout::LayoutReport;
pub use runner::{RunConfig, RunError, RunOutput, RunReport, StormRunner};
pub use structured_log::{LogEmitter, LogEntry, LogLevel};
pub use workload::{Op, StormType, XorShift64};
