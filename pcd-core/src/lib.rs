pub mod error;
pub mod pointcloud;
pub mod table;

pub use error::PcdError;
