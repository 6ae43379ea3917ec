//! Errors raised when an import violates its input contract.
//!
//! Parsing itself never fails (see [`crate::parser`]); these are the checks
//! the import pipeline runs around the parser.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImportError {
    #[error("Unsupported file type '{extension}' (expected .csv or .json)")]
    UnsupportedExtension { extension: String },

    #[error("File is {size} bytes, exceeding the {limit} byte import limit")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("File contains {rows} rows, exceeding the {limit} row import limit")]
    TooManyRows { rows: usize, limit: usize },

    #[error("No rows could be read from '{source_name}'")]
    NoRows { source_name: String },

    #[error("No column is mapped to the required 'name' field")]
    MissingNameMapping,

    #[error("Unknown mapping target '{0}'")]
    UnknownTarget(String),

    #[error("Column '{column}' is mapped to unknown attribute '{attribute}'")]
    UnknownAttribute { column: String, attribute: String },
}
