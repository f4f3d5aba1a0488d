pub mod csv;
pub mod error;
pub mod las;

pub use error::ExportError;
