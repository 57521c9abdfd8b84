//! Structured JSONL logs for allocation storms.
//!
//! Provides:
//! - [`LogEntry`]: canonical JSONL record with required + optional fields.
//! - [`LogEmitter`]: writes JSONL lines to any writer.
//! - [`validate_log_line`]: validates a single JSONL line against the schema.
//! - [`validate_log_file`]: validates an entire JSONL file.
//!
//! Engine lifecycle records ([`HeapLogRecord`]) convert directly into
//! entries, keeping their `core::heap::<symbol>::<id>` trace ids.

use std::io::Write;
use std::path::Path;

use membase_core::heap::size_class::granules_to_class;
use membase_core::{HeapLogLevel, HeapLogRecord, HeapStats};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Log entry
// ---------------------------------------------------------------------------

/// Severity level for log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<HeapLogLevel> for LogLevel {
    fn from(level: HeapLogLevel) -> Self {
        match level {
            HeapLogLevel::Trace => LogLevel::Trace,
            HeapLogLevel::Debug => LogLevel::Debug,
            HeapLogLevel::Info => LogLevel::Info,
            HeapLogLevel::Warn => LogLevel::Warn,
            HeapLogLevel::Error => LogLevel::Error,
        }
    }
}

/// Engine counters as they appear in log lines and run reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub heap_size: usize,
    pub grow_calls: u64,
    pub pages_grown: u64,
    pub host_failures: u64,
    pub small_allocs: u64,
    pub large_allocs: u64,
    pub releases: u64,
    pub compactions: u64,
    pub merges: u64,
    pub splits: u64,
    pub repurposed_chunks: u64,
}

impl From<HeapStats> for CounterSnapshot {
    fn from(stats: HeapStats) -> Self {
        Self {
            heap_size: stats.heap_size,
            grow_calls: stats.grow_calls,
            pages_grown: stats.pages_grown,
            host_failures: stats.host_failures,
            small_allocs: stats.small_allocs,
            large_allocs: stats.large_allocs,
            releases: stats.releases,
            compactions: stats.compactions,
            merges: stats.merges,
            splits: stats.splits,
            repurposed_chunks: stats.repurposed_chunks,
        }
    }
}

/// Canonical structured log entry.
///
/// Required fields: `timestamp`, `trace_id`, `level`, `event`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    // Required
    pub timestamp: String,
    pub trace_id: String,
    pub level: LogLevel,
    pub event: String,

    // Optional
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision_id: Option<u64>,
    /// API symbol (`allocate`, `release`, `reallocate`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ptr: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    /// Chunk kind label (`small:G<n>`, `large`, `free_large`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counters: Option<CounterSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl LogEntry {
    /// Create a new log entry with required fields only.
    #[must_use]
    pub fn new(trace_id: impl Into<String>, level: LogLevel, event: impl Into<String>) -> Self {
        Self {
            timestamp: now_utc(),
            trace_id: trace_id.into(),
            level,
            event: event.into(),
            run_id: None,
            decision_id: None,
            symbol: None,
            ptr: None,
            size: None,
            kind: None,
            outcome: None,
            counters: None,
            details: None,
        }
    }

    #[must_use]
    pub fn with_run(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    #[must_use]
    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    #[must_use]
    pub fn with_outcome(mut self, outcome: impl Into<String>) -> Self {
        self.outcome = Some(outcome.into());
        self
    }

    #[must_use]
    pub fn with_counters(mut self, counters: CounterSnapshot) -> Self {
        self.counters = Some(counters);
        self
    }

    /// Set free-form details.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Serialize to a single JSONL line (no trailing newline).
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<&HeapLogRecord> for LogEntry {
    fn from(record: &HeapLogRecord) -> Self {
        let mut entry = LogEntry::new(&record.trace_id, record.level.into(), record.event)
            .with_symbol(record.symbol)
            .with_outcome(record.outcome)
            .with_counters(record.stats.into());
        entry.decision_id = Some(record.decision_id);
        entry.ptr = record.ptr;
        entry.size = record.size;
        entry.kind = record.kind.map(|kind| kind.to_string());
        if !record.details.is_empty() {
            entry.details = Some(serde_json::Value::String(record.details.clone()));
        }
        entry
    }
}

// ---------------------------------------------------------------------------
// Log emitter
// ---------------------------------------------------------------------------

/// Writes structured JSONL log entries.
pub struct LogEmitter<W: Write> {
    writer: W,
    seq: u64,
    run_id: String,
}

impl LogEmitter<std::io::BufWriter<std::fs::File>> {
    /// Create an emitter that writes to a file.
    pub fn to_file(path: &Path, run_id: &str) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(std::io::BufWriter::new(file), run_id))
    }
}

impl<W: Write> LogEmitter<W> {
    #[must_use]
    pub fn new(writer: W, run_id: &str) -> Self {
        Self {
            writer,
            seq: 0,
            run_id: run_id.to_string(),
        }
    }

    /// Generate the next harness trace ID.
    fn next_trace_id(&mut self) -> String {
        self.seq += 1;
        format!("harness::{}::{:03}", self.run_id, self.seq)
    }

    /// Emit a log entry with auto-generated trace_id and run_id.
    pub fn emit(&mut self, level: LogLevel, event: &str) -> std::io::Result<LogEntry> {
        let trace_id = self.next_trace_id();
        let entry = LogEntry::new(trace_id, level, event).with_run(&self.run_id);
        self.write_line(&entry)?;
        Ok(entry)
    }

    /// Emit a fully-populated log entry.
    pub fn emit_entry(&mut self, mut entry: LogEntry) -> std::io::Result<()> {
        if entry.trace_id.is_empty() {
            entry.trace_id = self.next_trace_id();
        }
        if entry.run_id.is_none() {
            entry.run_id = Some(self.run_id.clone());
        }
        self.write_line(&entry)
    }

    /// Emit every engine record in order.
    pub fn emit_heap_records(&mut self, records: &[HeapLogRecord]) -> std::io::Result<()> {
        for record in records {
            self.emit_entry(LogEntry::from(record))?;
        }
        Ok(())
    }

    fn write_line(&mut self, entry: &LogEntry) -> std::io::Result<()> {
        let line = serde_json::to_string(entry).map_err(std::io::Error::other)?;
        writeln!(self.writer, "{line}")
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(mut self) -> std::io::Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validation error for a log line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line_number}: field '{field}': {message}")]
pub struct LogValidationError {
    pub line_number: usize,
    pub field: String,
    pub message: String,
}

impl LogValidationError {
    fn new(line_number: usize, field: &str, message: impl Into<String>) -> Self {
        Self {
            line_number,
            field: field.to_string(),
            message: message.into(),
        }
    }
}

fn valid_kind_label(kind: &str) -> bool {
    match kind.strip_prefix("small:G") {
        Some(granules) => granules.parse::<usize>().is_ok_and(|g| {
            granules_to_class(g).is_some_and(|class| class.granules() == g)
        }),
        None => matches!(kind, "large" | "free_large"),
    }
}

/// Validate a single JSONL line against the schema.
///
/// Returns the parsed entry if valid, or every problem found.
pub fn validate_log_line(
    line: &str,
    line_number: usize,
) -> Result<LogEntry, Vec<LogValidationError>> {
    let value: serde_json::Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            return Err(vec![LogValidationError::new(
                line_number,
                "<json>",
                format!("invalid JSON: {e}"),
            )]);
        }
    };
    let Some(obj) = value.as_object() else {
        return Err(vec![LogValidationError::new(
            line_number,
            "<root>",
            "expected JSON object",
        )]);
    };

    let mut errors = Vec::new();
    for field in ["timestamp", "trace_id", "level", "event"] {
        if !obj.contains_key(field) {
            errors.push(LogValidationError::new(
                line_number,
                field,
                "required field missing",
            ));
        }
    }

    if let Some(level) = obj.get("level").and_then(|v| v.as_str())
        && !["trace", "debug", "info", "warn", "error"].contains(&level)
    {
        errors.push(LogValidationError::new(
            line_number,
            "level",
            format!("invalid level: '{level}'"),
        ));
    }

    if let Some(trace_id) = obj.get("trace_id").and_then(|v| v.as_str())
        && !trace_id.contains("::")
    {
        errors.push(LogValidationError::new(
            line_number,
            "trace_id",
            format!("trace_id should follow <scope>::<area>::<seq> format, got: '{trace_id}'"),
        ));
    }

    if let Some(event) = obj.get("event").and_then(|v| v.as_str())
        && event.trim().is_empty()
    {
        errors.push(LogValidationError::new(line_number, "event", "event is empty"));
    }

    if let Some(kind) = obj.get("kind").and_then(|v| v.as_str())
        && !valid_kind_label(kind)
    {
        errors.push(LogValidationError::new(
            line_number,
            "kind",
            format!("invalid chunk kind: '{kind}'"),
        ));
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    serde_json::from_value::<LogEntry>(value).map_err(|e| {
        vec![LogValidationError::new(
            line_number,
            "<deserialization>",
            format!("failed to deserialize: {e}"),
        )]
    })
}

/// Validate an entire JSONL file.
///
/// Returns the non-empty line count and any validation errors found.
pub fn validate_log_file(path: &Path) -> Result<(usize, Vec<LogValidationError>), std::io::Error> {
    let content = std::fs::read_to_string(path)?;
    Ok(validate_log_text(&content))
}

/// Validates JSONL text already in memory.
#[must_use]
pub fn validate_log_text(content: &str) -> (usize, Vec<LogValidationError>) {
    let mut all_errors = Vec::new();
    let mut line_count = 0;
    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        line_count += 1;
        if let Err(errs) = validate_log_line(line, i + 1) {
            all_errors.extend(errs);
        }
    }
    (line_count, all_errors)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Current UTC time as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
#[must_use]
pub fn now_utc() -> String {
    let duration = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    format_utc(duration.as_secs(), duration.subsec_millis())
}

fn format_utc(secs: u64, millis: u32) -> String {
    let days = (secs / 86_400) as i64;
    let (year, month, day) = civil_from_days(days);
    format!(
        "{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}.{millis:03}Z",
        (secs % 86_400) / 3600,
        (secs % 3600) / 60,
        secs % 60,
    )
}

// Days since 1970-01-01 to a proleptic Gregorian date.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use membase_core::{ChunkKind, SizeClass};

    fn record() -> HeapLogRecord {
        HeapLogRecord {
            decision_id: 7,
            trace_id: "core::heap::allocate::0000000000000007".to_string(),
            level: HeapLogLevel::Info,
            symbol: "allocate",
            event: "host_grow",
            ptr: Some(0x10000),
            size: Some(65536),
            kind: Some(ChunkKind::Small(SizeClass::WHOLE_CHUNK)),
            outcome: "success",
            details: "preallocated=0;grown=65536".to_string(),
            stats: HeapStats {
                heap_size: 65536,
                grow_calls: 1,
                ..HeapStats::default()
            },
        }
    }

    #[test]
    fn log_entry_serializes_required_fields() {
        let entry = LogEntry::new("harness::run-1::001", LogLevel::Info, "run_start");
        let json = entry.to_jsonl().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(parsed["timestamp"].is_string());
        assert_eq!(parsed["trace_id"], "harness::run-1::001");
        assert_eq!(parsed["level"], "info");
        assert_eq!(parsed["event"], "run_start");
        assert!(parsed.get("run_id").is_none());
        assert!(parsed.get("counters").is_none());
    }

    #[test]
    fn heap_record_converts_to_valid_line() {
        let entry = LogEntry::from(&record());
        let json = entry.to_jsonl().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["trace_id"], "core::heap::allocate::0000000000000007");
        assert_eq!(parsed["decision_id"], 7);
        assert_eq!(parsed["symbol"], "allocate");
        assert_eq!(parsed["kind"], "small:G32");
        assert_eq!(parsed["counters"]["grow_calls"], 1);
        assert_eq!(parsed["details"], "preallocated=0;grown=65536");
        assert!(validate_log_line(&json, 1).is_ok());
    }

    #[test]
    fn validate_missing_required_field() {
        let json = r#"{"timestamp":"2026-01-01T00:00:00Z","level":"info","event":"test"}"#;
        let errors = validate_log_line(json, 1).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "trace_id"));
    }

    #[test]
    fn validate_invalid_level_and_kind() {
        let json = r#"{"timestamp":"2026-01-01T00:00:00Z","trace_id":"a::b::c","level":"fatal","event":"x","kind":"small:G7"}"#;
        let errors = validate_log_line(json, 3).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "level"));
        assert!(errors.iter().any(|e| e.field == "kind"));
        assert!(errors.iter().all(|e| e.line_number == 3));
    }

    #[test]
    fn validate_invalid_json_and_trace_id() {
        let errors = validate_log_line("not json at all", 1).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "<json>"));
        let json = r#"{"timestamp":"2026-01-01T00:00:00Z","trace_id":"flat","level":"info","event":"x"}"#;
        let errors = validate_log_line(json, 1).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "trace_id"));
    }

    #[test]
    fn emitter_generates_sequential_trace_ids() {
        let mut emitter = LogEmitter::new(Vec::new(), "run-42");
        let e1 = emitter.emit(LogLevel::Info, "start").unwrap();
        let e2 = emitter.emit(LogLevel::Info, "end").unwrap();
        assert_eq!(e1.trace_id, "harness::run-42::001");
        assert_eq!(e2.trace_id, "harness::run-42::002");
        emitter.emit_heap_records(&[record()]).unwrap();
        let text = String::from_utf8(emitter.into_inner().unwrap()).unwrap();
        let (lines, errors) = validate_log_text(&text);
        assert_eq!(lines, 3);
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn utc_formatting_is_exact() {
        assert_eq!(format_utc(0, 0), "1970-01-01T00:00:00.000Z");
        // 2024-02-29 12:34:56 UTC
        assert_eq!(format_utc(1_709_210_096, 789), "2024-02-29T12:34:56.789Z");
    }
}
