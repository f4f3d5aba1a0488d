use pcd_core::PcdError;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("LAS error: {0}")]
    Las(#[from] las::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Core(#[from] PcdError),

    #[error("invalid LAS version {0:?}, expected \"major.minor\"")]
    InvalidVersion(String),

    #[error("header must be set before pushing points")]
    MissingHeader,
}
