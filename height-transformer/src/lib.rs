mod error;
pub mod merge;
pub mod service;

pub use error::HeightError;
pub use merge::{extract_heights, merge_heights};
pub use service::{
    ConversionType, GeodeticService, GpshClient, Projection, ServiceConfig, SinglePointOverrides,
};
