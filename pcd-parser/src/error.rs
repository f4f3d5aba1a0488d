use std::path::PathBuf;

use pcd_core::PcdError;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("LAS error: {0}")]
    Las(#[from] las::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Core(#[from] PcdError),

    #[error("unsupported file extension: {}", .0.display())]
    UnsupportedExtension(PathBuf),

    #[error("delimiter must be a single-byte character, got {0:?}")]
    InvalidDelimiter(char),

    #[error("required field '{0}' is missing in CSV header")]
    MissingField(&'static str),

    #[error("row {row}: failed to parse '{column}' from {value:?}")]
    InvalidValue {
        row: usize,
        column: &'static str,
        value: String,
    },
}
