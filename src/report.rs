// src/report.rs

use std::fmt;
use tracing::warn;

/// Category of a non-fatal decision taken while loading a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningKind {
    /// Source directory absent.
    MissingInput,
    /// A file was empty, unreadable or failed to parse.
    SkippedFile,
    /// Requested sheet absent, first sheet used instead.
    SheetFallback,
    /// A configured column was not present in the table.
    ColumnMissing,
    /// A column could not be converted and kept its previous values.
    ConversionFailed,
    /// A DDL statement against the store failed.
    PersistenceFailed,
    /// Nothing to write.
    EmptyTable,
}

/// A single non-fatal event, scoped to a file, column or table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub kind: WarningKind,
    pub subject: String,
    pub message: String,
}

impl Warning {
    /// Build a warning and emit it on the `warn` level at the same time.
    pub fn new(kind: WarningKind, subject: impl Into<String>, message: impl Into<String>) -> Self {
        let w = Self {
            kind,
            subject: subject.into(),
            message: message.into(),
        };
        warn!(kind = ?w.kind, subject = %w.subject, "{}", w.message);
        w
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}: {}", self.kind, self.subject, self.message)
    }
}

/// A value produced by a best-effort step, plus everything it chose to skip.
#[derive(Debug)]
pub struct Outcome<T> {
    pub value: T,
    pub warnings: Vec<Warning>,
}

impl<T> Outcome<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(value: T, warnings: Vec<Warning>) -> Self {
        Self { value, warnings }
    }

    /// Move this outcome's warnings into `sink` and return the bare value.
    pub fn drain_into(self, sink: &mut Vec<Warning>) -> T {
        sink.extend(self.warnings);
        self.value
    }

    #[cfg(test)]
    pub fn has(&self, kind: WarningKind) -> bool {
        self.warnings.iter().any(|w| w.kind == kind)
    }
}
