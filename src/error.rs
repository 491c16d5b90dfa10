//! Typed errors for configuration and job-level failures.
//!
//! Anything that can be detected before the first row is grouped surfaces as a
//! [`ConfigError`]. Row-level problems are not errors: short rows simply yield
//! absent cells. Callback and predicate failures travel as `anyhow::Error`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("At least one level mapping is required")]
    NoLevels,

    #[error("Level {level} does not map any fields")]
    EmptyLevel { level: usize },

    #[error("Expected {expected} group key(s) for {levels} level(s), found {found}")]
    GroupKeyCount {
        expected: usize,
        levels: usize,
        found: usize,
    },

    #[error("{context} references column {column} but rows only have {width} column(s)")]
    ColumnOutOfRange {
        context: String,
        column: usize,
        width: usize,
    },

    #[error("Column '{0}' not found in header row")]
    UnknownColumn(String),

    #[error("Column '{0}' is referenced by name but the input has no header row")]
    NamedColumnWithoutHeaders(String),

    #[error("Field name '{field}' on level {level} is reserved")]
    ReservedField { level: usize, field: String },

    #[error("Field name '{field}' appears more than once on level {level}")]
    DuplicateField { level: usize, field: String },

    #[error("Invalid reject rule '{rule}': {reason}")]
    InvalidRejectRule { rule: String, reason: String },

    #[error("Invalid delimiter '{0}'")]
    InvalidDelimiter(String),
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Required file not found: {0:?}")]
    MissingRequiredFile(PathBuf),
}
