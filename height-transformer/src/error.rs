use pcd_core::PcdError;

#[derive(Debug, thiserror::Error)]
pub enum HeightError {
    #[error("unknown conversion type '{0}' (expected batch, CGG2013a or HT2_0_CGG2013a)")]
    UnknownConversionType(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("service responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("{rows} rows exceed the service limit of {limit} rows per request")]
    InputTooLarge { rows: usize, limit: usize },

    #[error("response row {row}: invalid height {value:?}")]
    InvalidHeight { row: usize, value: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] PcdError),
}
