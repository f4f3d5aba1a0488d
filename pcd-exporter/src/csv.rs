use std::{fs::File, io::Write, path::Path};

use ::csv::WriterBuilder;

use pcd_core::pointcloud::{
    point::{PointRecord, PointSet, Slot},
    transform::ScaleOffset,
};

use crate::error::ExportError;

/// Header of the outbound extract sent to the height conversion service.
pub const EXTRACT_HEADER: [&str; 4] = ["utm_e", "utm_n", "height", "utm_z"];

const PROGRESS_INTERVAL: usize = 1000;

/// Writes one table per writer: a header line and one line per point.
pub struct CsvTableWriter<W: Write> {
    writer: ::csv::Writer<W>,
}

impl CsvTableWriter<File> {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ExportError> {
        let writer = WriterBuilder::new().has_headers(false).from_path(path)?;
        Ok(Self { writer })
    }
}

impl<W: Write> CsvTableWriter<W> {
    pub fn from_writer(wtr: W) -> Self {
        let writer = WriterBuilder::new().has_headers(false).from_writer(wtr);
        Self { writer }
    }

    /// Writes every attribute in schema order, with X/Y/Z converted to real-world coordinates.
    /// Returns the number of data rows.
    pub fn write_point_set(
        mut self,
        transforms: &ScaleOffset,
        points: &PointSet,
    ) -> Result<usize, ExportError> {
        let schema = points.schema();
        self.writer.write_record(schema.names())?;

        let total = points.len();
        let mut fields = Vec::with_capacity(schema.names().len());
        for (index, record) in points.iter().enumerate() {
            fields.clear();
            fields.extend(
                schema
                    .slots()
                    .iter()
                    .map(|slot| slot_value(*slot, record, transforms).to_string()),
            );
            self.writer.write_record(&fields)?;
            report_progress(index + 1, total);
        }

        self.writer.flush()?;
        Ok(total)
    }

    /// Writes the real-world X/Y/Z of every point followed by the projection zone tag.
    pub fn write_height_extract(
        mut self,
        transforms: &ScaleOffset,
        points: &PointSet,
        zone: &str,
    ) -> Result<usize, ExportError> {
        self.writer.write_record(EXTRACT_HEADER)?;

        let total = points.len();
        for (index, record) in points.iter().enumerate() {
            let [x, y, z] = transforms.decode(record.raw_xyz());
            self.writer
                .write_record([x.to_string(), y.to_string(), z.to_string(), zone.to_string()])?;
            report_progress(index + 1, total);
        }

        self.writer.flush()?;
        Ok(total)
    }
}

fn slot_value(slot: Slot, record: &PointRecord, transforms: &ScaleOffset) -> f64 {
    match slot {
        Slot::X => transforms.x.decode(record.x),
        Slot::Y => transforms.y.decode(record.y),
        Slot::Z => transforms.z.decode(record.z),
        Slot::Extra(index) => record.extra[index],
    }
}

fn report_progress(written: usize, total: usize) {
    if written % PROGRESS_INTERVAL == 0 {
        log::info!("{} / {}", written, total);
    }
}
