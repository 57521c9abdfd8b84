//! Per-heap configuration.

pub use crate::config::ValidationLevel;

use super::log::HeapLogLevel;

/// Settings for one [`super::Heap`] instance.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeapConfig {
    /// Minimum level of lifecycle records kept; `None` keeps nothing.
    pub log_level: Option<HeapLogLevel>,
    /// Checking applied to released pointers.
    pub validation: ValidationLevel,
}

impl HeapConfig {
    /// Configuration from the process environment (`MEMBASE_LOG`,
    /// `MEMBASE_VALIDATE`).
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            log_level: crate::config::log_level(),
            validation: crate::config::validation_level(),
        }
    }

    #[must_use]
    pub fn with_log_level(mut self, level: HeapLogLevel) -> Self {
        self.log_level = Some(level);
        self
    }

    #[must_use]
    pub fn without_logs(mut self) -> Self {
        self.log_level = None;
        self
    }

    #[must_use]
    pub fn with_validation(mut self, validation: ValidationLevel) -> Self {
        self.validation = validation;
        self
    }

    /// Returns true if a record at `level` would be kept.
    #[must_use]
    pub fn logs(&self, level: HeapLogLevel) -> bool {
        self.log_level.is_some_and(|min| level >= min)
    }
}
