//! Error types for Gorilla trajectory parsing

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a parse run.
///
/// Tolerated data-quality defects (rows with the wrong number of fields,
/// skipped samples, missing per-trial files) are not errors; they are
/// counted in [`crate::types::Diagnostics`] instead.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("File or folder not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Unsupported extension for {}: expected one of {expected}", .path.display())]
    UnsupportedExtension { path: PathBuf, expected: String },

    #[error("Missing column: '{column}' does not appear in the header")]
    MissingColumn { column: String },

    #[error("Missing configuration value: {0}")]
    MissingSetting(&'static str),

    #[error("Could not detect a delimiter in {}", .0.display())]
    DelimiterUndetected(PathBuf),

    #[error("Delimiter must be a single ASCII character, got {0:?}")]
    InvalidDelimiter(char),

    #[error("Malformed coordinate sample '{value}' in trial {trial} of participant {participant}")]
    MalformedSample {
        participant: String,
        trial: usize,
        value: String,
    },

    #[error(
        "Identity mismatch in {file}: index lists participant '{index_id}', file reports '{file_id}'"
    )]
    IdentityMismatch {
        file: String,
        index_id: String,
        file_id: String,
    },

    #[error("Non-numeric {field} value '{value}' in trial {trial} of participant {participant}")]
    NumericParse {
        participant: String,
        trial: usize,
        field: &'static str,
        value: String,
    },

    #[error("Per-trial file {} has no data rows", .0.display())]
    EmptyTrialFile(PathBuf),

    #[error("Spreadsheet error in {}: {message}", .path.display())]
    Spreadsheet { path: PathBuf, message: String },

    #[error("Invalid CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
