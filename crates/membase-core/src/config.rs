//! Process-level runtime configuration.
//!
//! Read from environment variables on first use and cached thereafter:
//! - `MEMBASE_VALIDATE`: `strict` (default) checks every released pointer
//!   against the chunk-kind byte and slot geometry; `off` skips the checks
//!   (benchmark baseline).
//! - `MEMBASE_LOG`: minimum level of engine lifecycle records
//!   (`off` default, `error`, `warn`, `info`, `debug`, `trace`).
//! - `MEMBASE_MAX_PAGES`: page capacity reserved for the heap backend.
//!
//! The caches are non-blocking state machines rather than `OnceLock`: the
//! heap backend may be entered from inside `std::env::var` when it is
//! installed as the process allocator, and a reentrant call must see the
//! default instead of waiting on itself.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use crate::heap::HeapLogLevel;

/// How much checking the engine performs on released pointers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationLevel {
    /// Validate pointers against chunk kinds, slot alignment and the
    /// obvious double frees.
    #[default]
    Strict,
    /// No validation.
    Off,
}

impl ValidationLevel {
    /// Parse from string (case-insensitive). Unknown values are `Strict`.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "off" | "none" | "disabled" => Self::Off,
            _ => Self::Strict,
        }
    }

    /// Returns true if validation is active.
    #[must_use]
    pub const fn enabled(self) -> bool {
        matches!(self, Self::Strict)
    }
}

/// Default page capacity for the heap backend (256 MiB).
pub const DEFAULT_MAX_PAGES: usize = 4096;

const UNRESOLVED: u8 = 0;
const RESOLVING: u8 = 255;

// 1=Strict, 2=Off.
static CACHED_VALIDATION: AtomicU8 = AtomicU8::new(UNRESOLVED);
// 1=off, 2..=6 = Error..=Trace.
static CACHED_LOG: AtomicU8 = AtomicU8::new(UNRESOLVED);
// 0=unresolved, 1=resolving, otherwise the page count.
static CACHED_MAX_PAGES: AtomicUsize = AtomicUsize::new(0);

const VALIDATION_STRICT: u8 = 1;
const VALIDATION_OFF: u8 = 2;
const LOG_OFF: u8 = 1;

fn validation_to_u8(level: ValidationLevel) -> u8 {
    match level {
        ValidationLevel::Strict => VALIDATION_STRICT,
        ValidationLevel::Off => VALIDATION_OFF,
    }
}

fn u8_to_validation(v: u8) -> ValidationLevel {
    match v {
        VALIDATION_OFF => ValidationLevel::Off,
        _ => ValidationLevel::Strict,
    }
}

fn log_to_u8(level: Option<HeapLogLevel>) -> u8 {
    match level {
        None => LOG_OFF,
        Some(HeapLogLevel::Error) => 2,
        Some(HeapLogLevel::Warn) => 3,
        Some(HeapLogLevel::Info) => 4,
        Some(HeapLogLevel::Debug) => 5,
        Some(HeapLogLevel::Trace) => 6,
    }
}

fn u8_to_log(v: u8) -> Option<HeapLogLevel> {
    match v {
        2 => Some(HeapLogLevel::Error),
        3 => Some(HeapLogLevel::Warn),
        4 => Some(HeapLogLevel::Info),
        5 => Some(HeapLogLevel::Debug),
        6 => Some(HeapLogLevel::Trace),
        _ => None,
    }
}

fn parse_log_env(raw: &str) -> Option<HeapLogLevel> {
    match raw.to_ascii_lowercase().as_str() {
        "error" => Some(HeapLogLevel::Error),
        "warn" | "warning" => Some(HeapLogLevel::Warn),
        "info" => Some(HeapLogLevel::Info),
        "debug" => Some(HeapLogLevel::Debug),
        "trace" | "all" => Some(HeapLogLevel::Trace),
        _ => None,
    }
}

fn parse_max_pages_env(raw: &str) -> usize {
    match raw.trim().parse::<usize>() {
        Ok(pages) if pages > 0 => pages,
        _ => DEFAULT_MAX_PAGES,
    }
}

/// Resolves a byte-encoded setting through `cell`, reading `var` at most once.
/// Concurrent or reentrant callers get `fallback` until resolution finishes.
fn resolve_cached(
    cell: &AtomicU8,
    var: &str,
    parse: impl FnOnce(Option<&str>) -> u8,
    fallback: u8,
) -> u8 {
    let cached = cell.load(Ordering::Relaxed);
    if cached != UNRESOLVED && cached != RESOLVING {
        return cached;
    }
    if cached == RESOLVING {
        return fallback;
    }
    if cell
        .compare_exchange(UNRESOLVED, RESOLVING, Ordering::SeqCst, Ordering::Relaxed)
        .is_err()
    {
        let v = cell.load(Ordering::Relaxed);
        return if v != UNRESOLVED && v != RESOLVING { v } else { fallback };
    }
    let raw = std::env::var(var).ok();
    let resolved = parse(raw.as_deref());
    cell.store(resolved, Ordering::Release);
    resolved
}

/// Configured validation level (`MEMBASE_VALIDATE`).
#[must_use]
pub fn validation_level() -> ValidationLevel {
    let v = resolve_cached(
        &CACHED_VALIDATION,
        "MEMBASE_VALIDATE",
        |raw| validation_to_u8(raw.map(ValidationLevel::from_str_loose).unwrap_or_default()),
        VALIDATION_STRICT,
    );
    u8_to_validation(v)
}

/// Configured minimum lifecycle log level (`MEMBASE_LOG`); `None` is off.
#[must_use]
pub fn log_level() -> Option<HeapLogLevel> {
    let v = resolve_cached(
        &CACHED_LOG,
        "MEMBASE_LOG",
        |raw| log_to_u8(raw.and_then(parse_log_env)),
        LOG_OFF,
    );
    u8_to_log(v)
}

/// Configured heap-backend capacity in pages (`MEMBASE_MAX_PAGES`).
#[must_use]
pub fn max_pages() -> usize {
    let cached = CACHED_MAX_PAGES.load(Ordering::Relaxed);
    if cached > 1 {
        return cached;
    }
    if cached == 1
        || CACHED_MAX_PAGES
            .compare_exchange(0, 1, Ordering::SeqCst, Ordering::Relaxed)
            .is_err()
    {
        let v = CACHED_MAX_PAGES.load(Ordering::Relaxed);
        return if v > 1 { v } else { DEFAULT_MAX_PAGES };
    }
    let pages = std::env::var("MEMBASE_MAX_PAGES")
        .map(|v| parse_max_pages_env(&v))
        .unwrap_or(DEFAULT_MAX_PAGES)
        .max(2);
    CACHED_MAX_PAGES.store(pages, Ordering::Release);
    pages
}
