use std::{ffi::OsStr, path::Path};

use pcd_core::pointcloud::point::{FileInfo, PointSet};

use crate::error::ParseError;

pub mod csv;
pub mod las;

pub trait ParserProvider {
    fn get_parser(&self) -> Box<dyn Parser>;
}

pub trait Parser {
    fn parse(&self) -> Result<(FileInfo, PointSet), ParseError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extension {
    Las,
    Laz,
    Csv,
    Txt,
}

pub fn get_extension(path: &Path) -> Result<Extension, ParseError> {
    let extension = path
        .extension()
        .and_then(OsStr::to_str)
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("las") => Ok(Extension::Las),
        Some("laz") => Ok(Extension::Laz),
        Some("csv") => Ok(Extension::Csv),
        Some("txt") => Ok(Extension::Txt),
        _ => Err(ParseError::UnsupportedExtension(path.to_path_buf())),
    }
}
