use std::path::{Path, PathBuf};

use ::las::{point::Format, Builder, Reader, Transform, Vector, Writer};
use chrono::NaiveDate;

use pcd_core::{
    pointcloud::{
        point::{BoundingVolume, FileInfo, PointSet},
        transform::{AxisTransform, ScaleOffset},
    },
    PcdError,
};

use crate::error::ExportError;

/// Width of the LAS system identifier and generating software fields.
pub const IDENTIFIER_LEN: usize = 32;

/// Header metadata as supplied by the caller.
#[derive(Debug, Clone)]
pub struct LasHeaderInfo {
    pub date: NaiveDate,
    pub min: [f64; 3],
    pub max: [f64; 3],
    pub version: String,
    pub transforms: ScaleOffset,
    pub software_id: String,
    pub system_id: String,
}

/// Validated header metadata handed to a [`PointSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct SinkHeader {
    pub date: NaiveDate,
    pub bounds: BoundingVolume,
    pub version: (u8, u8),
    pub transforms: ScaleOffset,
    pub generating_software: String,
    pub system_identifier: String,
}

impl TryFrom<LasHeaderInfo> for SinkHeader {
    type Error = ExportError;

    fn try_from(info: LasHeaderInfo) -> Result<Self, Self::Error> {
        Ok(Self {
            date: info.date,
            bounds: BoundingVolume {
                min: info.min,
                max: info.max,
            },
            version: parse_version(&info.version)?,
            transforms: info.transforms,
            generating_software: pad_identifier(&info.software_id),
            system_identifier: pad_identifier(&info.system_id),
        })
    }
}

pub fn parse_version(version: &str) -> Result<(u8, u8), ExportError> {
    let invalid = || ExportError::InvalidVersion(version.to_string());
    let (major, minor) = version.trim().split_once('.').ok_or_else(invalid)?;
    let major = major.parse().map_err(|_| invalid())?;
    let minor = minor.parse().map_err(|_| invalid())?;
    Ok((major, minor))
}

/// Truncates or right-pads with spaces to exactly [`IDENTIFIER_LEN`] characters.
pub fn pad_identifier(id: &str) -> String {
    let truncated: String = id.chars().take(IDENTIFIER_LEN).collect();
    format!("{:<width$}", truncated, width = IDENTIFIER_LEN)
}

/// Real-world coordinates, one vector per axis.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointColumns {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
}

impl PointColumns {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn bounds(&self) -> BoundingVolume {
        let mut bounds = BoundingVolume::empty();
        for ((x, y), z) in self.x.iter().zip(&self.y).zip(&self.z) {
            bounds.extend([*x, *y, *z]);
        }
        bounds
    }
}

pub trait PointSink {
    fn commit(&mut self, header: SinkHeader, columns: PointColumns) -> Result<(), ExportError>;
}

/// Staging area for CSV→LAS assembly. The whole point set is held in memory until [`push`].
///
/// [`push`]: PointStore::push
#[derive(Debug, Default)]
pub struct PointStore {
    header: Option<SinkHeader>,
    columns: PointColumns,
}

impl PointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            header: None,
            columns: PointColumns {
                x: Vec::with_capacity(capacity),
                y: Vec::with_capacity(capacity),
                z: Vec::with_capacity(capacity),
            },
        }
    }

    pub fn add_point(&mut self, x: f64, y: f64, z: f64) {
        self.columns.x.push(x);
        self.columns.y.push(y);
        self.columns.z.push(z);
    }

    pub fn set_header(&mut self, info: LasHeaderInfo) -> Result<(), ExportError> {
        self.header = Some(SinkHeader::try_from(info)?);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn bounds(&self) -> BoundingVolume {
        self.columns.bounds()
    }

    /// Hands all buffered points to `sink` in a single commit.
    pub fn push<S: PointSink + ?Sized>(self, sink: &mut S) -> Result<usize, ExportError> {
        let header = self.header.ok_or(ExportError::MissingHeader)?;
        let count = self.columns.len();
        sink.commit(header, self.columns)?;
        Ok(count)
    }
}

/// Writes points to a LAS file through the `las` writer.
pub struct LasSink {
    pub filename: PathBuf,
    pub point_format: u8,
}

impl LasSink {
    pub fn new(filename: impl Into<PathBuf>) -> Self {
        Self {
            filename: filename.into(),
            point_format: 0,
        }
    }
}

impl PointSink for LasSink {
    fn commit(&mut self, header: SinkHeader, columns: PointColumns) -> Result<(), ExportError> {
        let start = std::time::Instant::now();

        let mut builder = Builder::from(header.version);
        builder.date = Some(header.date);
        builder.point_format = Format::new(self.point_format)?;
        builder.transforms = to_las_transforms(&header.transforms);
        builder.generating_software = header.generating_software;
        builder.system_identifier = header.system_identifier;
        let las_header = builder.into_header()?;

        let actual = columns.bounds();
        if !columns.is_empty() && actual != header.bounds {
            log::debug!(
                "configured bounds {:?} differ from point bounds {:?}; the writer uses the point bounds",
                header.bounds,
                actual
            );
        }

        let mut writer = Writer::from_path(&self.filename, las_header)?;
        for ((x, y), z) in columns.x.into_iter().zip(columns.y).zip(columns.z) {
            writer.write_point(::las::Point {
                x,
                y,
                z,
                ..Default::default()
            })?;
        }
        writer.close()?;

        log::info!(
            "wrote {} in {:?}",
            self.filename.display(),
            start.elapsed()
        );
        Ok(())
    }
}

fn to_las_transforms(transforms: &ScaleOffset) -> Vector<Transform> {
    let axis = |t: &AxisTransform| Transform {
        scale: t.scale(),
        offset: t.offset(),
    };
    Vector {
        x: axis(&transforms.x),
        y: axis(&transforms.y),
        z: axis(&transforms.z),
    }
}

/// Copies `source` to `dest`, replacing every point's Z with the corresponding record of `points`.
/// All other attributes and the header configuration are kept. `dest` is left untouched on error.
pub fn rewrite_with_heights(
    source: &Path,
    dest: &Path,
    info: &FileInfo,
    points: &PointSet,
) -> Result<usize, ExportError> {
    let start = std::time::Instant::now();
    let mut reader = Reader::from_path(source)?;
    let header = reader.header().clone();

    let expected = header.number_of_points() as usize;
    if expected != points.len() {
        return Err(PcdError::Alignment {
            expected,
            actual: points.len(),
        }
        .into());
    }

    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let staged = tempfile::Builder::new()
        .prefix(".lascsv")
        .suffix(".las")
        .tempfile_in(dir)?;

    let mut writer = Writer::from_path(staged.path(), header)?;
    let mut written = 0;
    for (las_point, record) in reader.points().zip(points.iter()) {
        let mut las_point = las_point?;
        las_point.z = info.transforms.z.decode(record.z);
        writer.write_point(las_point)?;
        written += 1;
    }
    writer.close()?;
    drop(writer);

    // only a complete file replaces dest
    staged.persist(dest).map_err(|e| e.error)?;

    log::info!(
        "wrote {} corrected points to {} in {:?}",
        written,
        dest.display(),
        start.elapsed()
    );
    Ok(written)
}
