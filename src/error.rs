//! Error types for the record builder, the entry-point gate and the script harness.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building a record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("invalid category '{value}': expected one of {allowed}")]
    InvalidCategory { value: String, allowed: String },
}

/// Errors raised by the entry-point gate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    /// The builder ran and rejected its input. Passed through untouched.
    #[error(transparent)]
    Record(#[from] RecordError),

    #[error("entry-point gate has already been evaluated")]
    AlreadyEvaluated,
}

/// Errors raised while setting up the script harness.
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("script not found: {}", path.display())]
    ScriptNotFound { path: PathBuf },

    #[error("failed to load definitions from {}: {reason}", path.display())]
    LoadError { path: PathBuf, reason: String },

    /// Diagnostic only. Never aborts a harness setup.
    #[error("structural analysis failed: {reason}")]
    AnalysisError { reason: String },
}
