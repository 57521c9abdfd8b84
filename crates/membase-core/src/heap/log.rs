//! Structured lifecycle records emitted by the engine.

use super::allocator::HeapStats;
use super::kind::ChunkKind;

/// Lifecycle record severity, ordered from chattiest to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HeapLogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl HeapLogLevel {
    /// Lowercase name used in JSONL output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            HeapLogLevel::Trace => "trace",
            HeapLogLevel::Debug => "debug",
            HeapLogLevel::Info => "info",
            HeapLogLevel::Warn => "warn",
            HeapLogLevel::Error => "error",
        }
    }
}

/// Structured engine lifecycle record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapLogRecord {
    /// Monotonic decision/event id.
    pub decision_id: u64,
    /// Correlation id for this record.
    pub trace_id: String,
    /// Severity level.
    pub level: HeapLogLevel,
    /// API symbol (`allocate`, `release`, `reallocate`, ...).
    pub symbol: &'static str,
    /// Event kind (`alloc`, `free`, `host_grow`, ...).
    pub event: &'static str,
    /// Address involved in the event.
    pub ptr: Option<usize>,
    /// Size involved in the event.
    pub size: Option<usize>,
    /// Chunk kind involved in the event.
    pub kind: Option<ChunkKind>,
    /// Machine-readable outcome label.
    pub outcome: &'static str,
    /// Free-form details for debugging.
    pub details: String,
    /// Counter snapshot taken when the record was made.
    pub stats: HeapStats,
}
