use std::path::PathBuf;
use thiserror::Error;

use crate::layout::FieldKind;

/// Fatal errors produced while turning a report into tables.
///
/// Everything here aborts the run. Per-record problems found by the
/// normalizer are [`NormalizationError`]s instead and never escape it.
#[derive(Error, Debug)]
pub enum ReportError {
    /// The input was empty or held nothing but boilerplate.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// A record line could not be split into the layout's columns.
    #[error("Cannot tokenize line {line_number} ({reason}): {line:?}")]
    Tokenization {
        line_number: usize,
        line: String,
        reason: String,
    },

    /// A report file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An output directory, table or archived report could not be written.
    #[error("Failed to write {path}: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A layout or pipeline configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A JSON configuration document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Pass-through for write failures on the export destination.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ReportError {
    /// Name of the error category, as printed by the command line tool.
    pub fn kind(&self) -> &'static str {
        match self {
            ReportError::MalformedInput(_) => "MalformedInputError",
            ReportError::Tokenization { .. } => "TokenizationError",
            ReportError::FileRead { .. } | ReportError::FileWrite { .. } | ReportError::Io(_) => {
                "IOError"
            }
            ReportError::Config(_) | ReportError::JsonParse(_) => "ConfigError",
        }
    }

    /// Pipeline stage that raised the error.
    pub fn stage(&self) -> &'static str {
        match self {
            ReportError::MalformedInput(_) | ReportError::FileRead { .. } => "reader",
            ReportError::Tokenization { .. } => "tokenizer",
            ReportError::FileWrite { .. } | ReportError::Io(_) => "exporter",
            ReportError::Config(_) | ReportError::JsonParse(_) => "config",
        }
    }
}

/// Convenience alias used throughout the enrollment crates.
pub type Result<T> = std::result::Result<T, ReportError>;

/// Why a record was dropped by the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    NonNumericCount,
    NegativeCount,
    MalformedTermCode,
    MissingValue,
    InvalidCreditHours,
}

impl DropReason {
    pub fn label(self) -> &'static str {
        match self {
            DropReason::NonNumericCount => "non-numeric count",
            DropReason::NegativeCount => "negative count",
            DropReason::MalformedTermCode => "malformed term code",
            DropReason::MissingValue => "missing required value",
            DropReason::InvalidCreditHours => "invalid credit hours",
        }
    }
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A single record that violated a field's type constraint.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("line {line_number}: {field} {value:?} rejected ({reason})")]
pub struct NormalizationError {
    pub line_number: usize,
    pub field: FieldKind,
    pub value: String,
    pub reason: DropReason,
}
