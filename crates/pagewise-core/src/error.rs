//! Error types for Pagewise.

use thiserror::Error;

/// Core error type for Pagewise domain checks.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Record for {file_name} has {actual} {field}, expected {expected}")]
    LengthMismatch {
        file_name: String,
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Document {0} has no pages")]
    EmptyDocument(String),
}

/// Result type alias using Pagewise's Error.
pub type Result<T> = std::result::Result<T, Error>;

