use std::path::PathBuf;

use las::{
    point::{Format, ScanDirection},
    Reader,
};

use pcd_core::pointcloud::{
    point::{AttributeSchema, FileInfo, PointRecord, PointSet},
    transform::ScaleOffset,
};

use super::{Parser, ParserProvider};
use crate::error::ParseError;

pub struct LasParserProvider {
    pub filename: PathBuf,
}

impl ParserProvider for LasParserProvider {
    fn get_parser(&self) -> Box<dyn Parser> {
        Box::new(LasParser {
            filename: self.filename.clone(),
        })
    }
}

pub struct LasParser {
    pub filename: PathBuf,
}

impl LasParser {
    pub fn new(filename: impl Into<PathBuf>) -> Self {
        Self {
            filename: filename.into(),
        }
    }
}

impl Parser for LasParser {
    fn parse(&self) -> Result<(FileInfo, PointSet), ParseError> {
        let start = std::time::Instant::now();
        let mut reader = Reader::from_path(&self.filename)?;

        let header = reader.header();
        let t = header.transforms();
        let transforms = ScaleOffset::new(
            [t.x.scale, t.y.scale, t.z.scale],
            [t.x.offset, t.y.offset, t.z.offset],
        )?;
        let format = header.point_format().clone();
        let point_count = header.number_of_points();
        let schema = AttributeSchema::new(attribute_names(&format))?;

        log::debug!(
            "{}: {} points, format {}, scale {:?}, offset {:?}",
            self.filename.display(),
            point_count,
            format,
            transforms.scale(),
            transforms.offset()
        );

        let mut points = PointSet::with_capacity(schema.clone(), point_count as usize);
        for las_point in reader.points() {
            let las_point = las_point?;
            let [x, y, z] = transforms.encode([las_point.x, las_point.y, las_point.z])?;
            let record = PointRecord {
                x,
                y,
                z,
                extra: extra_values(&las_point, &format),
            };
            points.push(record)?;
        }
        log::info!(
            "read {} points from {} in {:?}",
            points.len(),
            self.filename.display(),
            start.elapsed()
        );

        let info = FileInfo {
            point_count,
            transforms,
            schema,
        };

        Ok((info, points))
    }
}

/// Field names of a LAS point format, in record order.
pub fn attribute_names(format: &Format) -> Vec<&'static str> {
    let mut names = vec!["X", "Y", "Z", "intensity", "return_number", "number_of_returns"];
    if format.is_extended {
        names.push("scanner_channel");
    }
    names.extend([
        "scan_direction",
        "edge_of_flight_line",
        "classification",
        "synthetic",
        "key_point",
        "withheld",
    ]);
    if format.is_extended {
        names.push("overlap");
    }
    names.extend(["scan_angle", "user_data", "point_source_id"]);
    if format.has_gps_time {
        names.push("gps_time");
    }
    if format.has_color {
        names.extend(["red", "green", "blue"]);
    }
    if format.has_nir {
        names.push("nir");
    }
    names
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

fn extra_values(las_point: &las::Point, format: &Format) -> Vec<f64> {
    let mut values = vec![
        las_point.intensity as f64,
        las_point.return_number as f64,
        las_point.number_of_returns as f64,
    ];
    if format.is_extended {
        values.push(las_point.scanner_channel as f64);
    }
    values.extend([
        flag(matches!(las_point.scan_direction, ScanDirection::LeftToRight)),
        flag(las_point.is_edge_of_flight_line),
        u8::from(las_point.classification) as f64,
        flag(las_point.is_synthetic),
        flag(las_point.is_key_point),
        flag(las_point.is_withheld),
    ]);
    if format.is_extended {
        values.push(flag(las_point.is_overlap));
    }
    values.extend([
        las_point.scan_angle as f64,
        las_point.user_data as f64,
        las_point.point_source_id as f64,
    ]);
    if format.has_gps_time {
        values.push(las_point.gps_time.unwrap_or(0.0));
    }
    if format.has_color {
        values.push(las_point.color.map(|c| c.red).unwrap_or(0) as f64);
        values.push(las_point.color.map(|c| c.green).unwrap_or(0) as f64);
        values.push(las_point.color.map(|c| c.blue).unwrap_or(0) as f64);
    }
    if format.has_nir {
        values.push(las_point.nir.unwrap_or(0) as f64);
    }
    values
}
