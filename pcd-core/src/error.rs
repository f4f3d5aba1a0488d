#[derive(Debug, thiserror::Error)]
pub enum PcdError {
    #[error("invalid scale for axis {axis}: {scale} (must be a finite value greater than zero)")]
    InvalidScale { axis: char, scale: f64 },

    #[error("invalid offset for axis {axis}: {offset}")]
    InvalidOffset { axis: char, offset: f64 },

    #[error("coordinate {value} cannot be stored with scale {scale} and offset {offset}")]
    CoordinateOutOfRange { value: f64, scale: f64, offset: f64 },

    #[error("required attribute '{0}' is missing from the schema")]
    MissingAttribute(&'static str),

    #[error("record has {actual} extra attributes but the schema defines {expected}")]
    SchemaMismatch { expected: usize, actual: usize },

    #[error("column '{0}' not found in response header")]
    MissingColumn(String),

    #[error("response has {actual} rows but {expected} points were sent")]
    Alignment { expected: usize, actual: usize },

    #[error("delimiter must be a single-byte character, got {0:?}")]
    InvalidDelimiter(char),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
