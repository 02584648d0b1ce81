//! Import-blocking error conditions.

use thiserror::Error;

/// Errors that stop an import before (or instead of) row processing.
///
/// Per-row validation problems are not represented here; they are carried on
/// each record so the review stage can show them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ImportError {
    /// The file could not be read or is not valid UTF-8 text.
    #[error("file could not be read as text: {0}")]
    Unreadable(String),

    /// No header row was found (empty file or comments only).
    #[error("file contains no header row")]
    NoHeader,

    /// The header lacks one or more required columns.
    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    /// Upload was requested with no error-free records.
    #[error("no valid records to upload")]
    NothingToUpload,
}
