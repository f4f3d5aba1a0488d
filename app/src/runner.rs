use std::{
    fs,
    path::{Path, PathBuf},
    time::Instant,
};

use chrono::NaiveDate;

use crate::config::ConfigError;

use height_transformer::{merge_heights, GeodeticService, HeightError, SinglePointOverrides};
use pcd_core::{
    pointcloud::{
        point::{FileInfo, PointSet},
        transform::ScaleOffset,
    },
    PcdError,
};
use pcd_exporter::{
    csv::CsvTableWriter,
    las::{rewrite_with_heights, LasHeaderInfo, LasSink, PointStore},
    ExportError,
};
use pcd_parser::{
    parsers::{
        csv::CsvPointLoader, get_extension, las::LasParserProvider, Extension, Parser as _,
        ParserProvider as _,
    },
    ParseError,
};

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Height(#[from] HeightError),

    #[error(transparent)]
    Core(#[from] PcdError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{} contains no points", .0.display())]
    NoPoints(PathBuf),

    #[error("{} is not a LAS file", .0.display())]
    NotLas(PathBuf),
}

fn parse_las(input: &Path) -> Result<(FileInfo, PointSet), RunError> {
    match get_extension(input)? {
        Extension::Las | Extension::Laz => {}
        _ => return Err(RunError::NotLas(input.to_path_buf())),
    }
    let provider = LasParserProvider {
        filename: input.to_path_buf(),
    };
    Ok(provider.get_parser().parse()?)
}

/// Writes every attribute of a LAS file as CSV.
pub fn las_to_csv(input: &Path, output: &Path) -> Result<usize, RunError> {
    let start = Instant::now();
    log::info!("converting {} to {}", input.display(), output.display());

    let (info, points) = parse_las(input)?;
    let rows = CsvTableWriter::from_path(output)?.write_point_set(&info.transforms, &points)?;

    log::info!("wrote {} rows in {:?}", rows, start.elapsed());
    Ok(rows)
}

/// Writes the real-world X/Y/Z of a LAS file and the zone tag in the layout the height
/// conversion service expects.
pub fn las_to_extract(input: &Path, output: &Path, zone: &str) -> Result<usize, RunError> {
    let start = Instant::now();
    log::info!("extracting {} to {}", input.display(), output.display());

    let (info, points) = parse_las(input)?;
    let rows = CsvTableWriter::from_path(output)?.write_height_extract(
        &info.transforms,
        &points,
        zone,
    )?;

    log::info!("wrote {} rows in {:?}", rows, start.elapsed());
    Ok(rows)
}

#[derive(Debug, Clone)]
pub struct CsvToLasOptions {
    pub delimiter: char,
    pub scale: [f64; 3],
    /// Defaults to the minimum of the point bounds.
    pub offset: Option<[f64; 3]>,
    pub version: String,
    pub date: NaiveDate,
    pub software_id: String,
    pub system_id: String,
}

/// Builds a LAS file from the X/Y/Z columns of a delimited text file.
pub fn csv_to_las(
    input: &Path,
    output: &Path,
    options: &CsvToLasOptions,
) -> Result<usize, RunError> {
    let start = Instant::now();
    log::info!("converting {} to {}", input.display(), output.display());

    let coordinates = CsvPointLoader::from_path(input, options.delimiter)?.load()?;
    if coordinates.is_empty() {
        return Err(RunError::NoPoints(input.to_path_buf()));
    }

    let mut store = PointStore::with_capacity(coordinates.len());
    for [x, y, z] in coordinates {
        store.add_point(x, y, z);
    }

    let bounds = store.bounds();
    let offset = options.offset.unwrap_or(bounds.min);
    store.set_header(LasHeaderInfo {
        date: options.date,
        min: bounds.min,
        max: bounds.max,
        version: options.version.clone(),
        transforms: ScaleOffset::new(options.scale, offset)?,
        software_id: options.software_id.clone(),
        system_id: options.system_id.clone(),
    })?;

    let count = store.push(&mut LasSink::new(output))?;
    log::info!("wrote {} points in {:?}", count, start.elapsed());
    Ok(count)
}

#[derive(Debug, Clone)]
pub struct CorrectionOptions {
    /// Response column holding the corrected heights, e.g. `H2013`.
    pub height_code: String,
    /// Projection zone tag written to every extract row, e.g. `ON-9`.
    pub zone: String,
    /// Where to keep a copy of the uploaded extract.
    pub keep_extract: Option<PathBuf>,
}

/// Replaces the heights of a LAS file with the ones returned by a bulk conversion call.
///
/// `output` is only written once every height has been merged.
pub fn correct_heights<S: GeodeticService + ?Sized>(
    input: &Path,
    output: &Path,
    service: &S,
    options: &CorrectionOptions,
) -> Result<usize, RunError> {
    let start = Instant::now();
    log::info!("correcting heights of {}", input.display());

    let (info, mut points) = parse_las(input)?;

    let extract = tempfile::Builder::new()
        .prefix("prewb")
        .suffix(".csv")
        .tempfile()?;
    let rows = CsvTableWriter::from_path(extract.path())?.write_height_extract(
        &info.transforms,
        &points,
        &options.zone,
    )?;
    if let Some(keep) = &options.keep_extract {
        fs::copy(extract.path(), keep)?;
    }
    log::info!("wrote extract of {} rows", rows);

    let table = service.batch_call(extract.path())?;
    log::info!(
        "response has {} rows ({} dropped)",
        table.len(),
        table.dropped_rows()
    );

    let merged = merge_heights(
        &mut points,
        &table,
        &options.height_code,
        &info.transforms.z,
    )?;
    rewrite_with_heights(input, output, &info, &points)?;

    log::info!(
        "corrected {} points into {} in {:?}",
        merged,
        output.display(),
        start.elapsed()
    );
    Ok(merged)
}

/// Converts a single coordinate and returns the service's XML response untouched.
pub fn single_point<S: GeodeticService + ?Sized>(
    service: &S,
    x: f64,
    y: f64,
    z: f64,
    overrides: &SinglePointOverrides,
) -> Result<String, RunError> {
    Ok(service.single_point(x, y, z, overrides)?)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use pcd_core::table::ResponseTable;
    use pcd_parser::parsers::{las::LasParser, Parser as _};

    use super::*;

    const POINTS: [[f64; 3]; 6] = [
        [329999.8947, 4839000.0062, 0.671],
        [330002.2338, 4838999.6872, 0.617],
        [330026.3268, 4839042.692, 0.417],
        [330047.6052, 4839040.4722, 0.7269],
        [330051.1468, 4839040.851, 0.645],
        [330020.8758, 4839046.2249, 0.2888],
    ];

    fn options() -> CsvToLasOptions {
        CsvToLasOptions {
            delimiter: ' ',
            scale: [0.0001; 3],
            offset: Some([329999.8947, 4839000.0062, 0.0]),
            version: "1.2".to_string(),
            date: NaiveDate::from_ymd_opt(2013, 6, 4).unwrap(),
            software_id: "software_id".to_string(),
            system_id: "system_id".to_string(),
        }
    }

    fn write_source(dir: &Path) -> PathBuf {
        let csv = dir.join("points.txt");
        let text: String = POINTS
            .iter()
            .map(|[x, y, z]| format!("{x} {y} {z}\n"))
            .collect();
        fs::write(&csv, text).unwrap();

        let las = dir.join("points.las");
        assert_eq!(csv_to_las(&csv, &las, &options()).unwrap(), POINTS.len());
        las
    }

    /// Answers a bulk call by adding a fixed amount to every uploaded height.
    struct FakeService {
        shift: f64,
        drop_last: bool,
        uploads: RefCell<Vec<String>>,
    }

    impl FakeService {
        fn new(shift: f64) -> Self {
            Self {
                shift,
                drop_last: false,
                uploads: RefCell::new(Vec::new()),
            }
        }
    }

    impl GeodeticService for FakeService {
        fn batch_call(&self, extract: &Path) -> Result<ResponseTable, HeightError> {
            let text = fs::read_to_string(extract)?;
            self.uploads.borrow_mut().push(text.clone());

            let request = ResponseTable::parse(&text, ',')?;
            let mut response = String::from("utm_e,utm_n,H2013,utm_z\n");
            let mut rows = request.rows().to_vec();
            if self.drop_last {
                rows.pop();
            }
            for row in rows {
                let height: f64 = row[2].parse().unwrap();
                response.push_str(&format!(
                    "{},{},{},{}\n",
                    row[0],
                    row[1],
                    height + self.shift,
                    row[3]
                ));
            }
            Ok(ResponseTable::parse(&response, ',')?)
        }

        fn single_point(
            &self,
            x: f64,
            y: f64,
            z: f64,
            _overrides: &SinglePointOverrides,
        ) -> Result<String, HeightError> {
            Ok(format!("<result><x>{x}</x><y>{y}</y><h>{}</h></result>", z + self.shift))
        }
    }

    #[test]
    fn csv_to_las_and_back() {
        let dir = tempfile::tempdir().unwrap();
        let las = write_source(dir.path());
        let csv = dir.path().join("points.csv");

        assert_eq!(las_to_csv(&las, &csv).unwrap(), POINTS.len());

        let text = fs::read_to_string(&csv).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), POINTS.len() + 1);
        assert!(lines[0].starts_with("X,Y,Z,intensity"));
        for (line, expected) in lines[1..].iter().zip(POINTS) {
            let values: Vec<f64> = line.split(',').map(|v| v.parse().unwrap()).collect();
            for axis in 0..3 {
                assert!((values[axis] - expected[axis]).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn csv_to_las_defaults_offset_to_minimum() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("points.csv");
        fs::write(&csv, "X,Y,Z\n10.5,20.25,3.0\n11.5,21.25,1.0\n").unwrap();
        let las = dir.path().join("points.las");

        let options = CsvToLasOptions {
            delimiter: ',',
            offset: None,
            ..options()
        };
        csv_to_las(&csv, &las, &options).unwrap();

        let (info, points) = LasParser::new(&las).parse().unwrap();
        assert_eq!(info.transforms.offset(), [10.5, 20.25, 1.0]);
        assert_eq!(points.records()[0].raw_xyz(), [0, 0, 20000]);
        assert_eq!(points.records()[1].raw_xyz(), [10000, 10000, 0]);
    }

    #[test]
    fn csv_to_las_rejects_empty_input() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("empty.csv");
        fs::write(&csv, "X,Y,Z\n").unwrap();
        let options = CsvToLasOptions {
            delimiter: ',',
            ..options()
        };
        let err = csv_to_las(&csv, &dir.path().join("empty.las"), &options).unwrap_err();
        assert!(matches!(err, RunError::NoPoints(_)));
    }

    #[test]
    fn extract_matches_service_layout() {
        let dir = tempfile::tempdir().unwrap();
        let las = write_source(dir.path());
        let extract = dir.path().join("prewb.csv");

        assert_eq!(las_to_extract(&las, &extract, "ON-9").unwrap(), POINTS.len());
        let text = fs::read_to_string(&extract).unwrap();
        let table = ResponseTable::parse(&text, ',').unwrap();
        assert_eq!(table.header(), &["utm_e", "utm_n", "height", "utm_z"]);
        assert_eq!(table.len(), POINTS.len());
        assert_eq!(table.dropped_rows(), 0);
        assert!(table.rows().iter().all(|row| row[3] == "ON-9"));
    }

    #[test]
    fn correct_heights_replaces_z_only() {
        let dir = tempfile::tempdir().unwrap();
        let las = write_source(dir.path());
        let output = dir.path().join("converted_points.las");
        let kept = dir.path().join("prewb.temp.csv");
        let service = FakeService::new(35.0);

        let merged = correct_heights(
            &las,
            &output,
            &service,
            &CorrectionOptions {
                height_code: "H2013".to_string(),
                zone: "ON-9".to_string(),
                keep_extract: Some(kept.clone()),
            },
        )
        .unwrap();
        assert_eq!(merged, POINTS.len());
        assert_eq!(service.uploads.borrow().len(), 1);
        assert_eq!(fs::read_to_string(&kept).unwrap(), service.uploads.borrow()[0]);

        let (_, original) = LasParser::new(&las).parse().unwrap();
        let (info, corrected) = LasParser::new(&output).parse().unwrap();
        assert_eq!(corrected.len(), POINTS.len());
        for ((before, after), expected) in original.iter().zip(corrected.iter()).zip(POINTS) {
            assert_eq!(before.x, after.x);
            assert_eq!(before.y, after.y);
            assert_eq!(before.extra, after.extra);
            assert!((info.transforms.z.decode(after.z) - (expected[2] + 35.0)).abs() < 1e-6);
        }
    }

    #[test]
    fn correct_heights_fails_on_missing_rows_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let las = write_source(dir.path());
        let output = dir.path().join("converted_points.las");
        let service = FakeService {
            drop_last: true,
            ..FakeService::new(35.0)
        };

        let err = correct_heights(
            &las,
            &output,
            &service,
            &CorrectionOptions {
                height_code: "H2013".to_string(),
                zone: "ON-9".to_string(),
                keep_extract: None,
            },
        )
        .unwrap_err();
        assert!(matches!(
            err,
            RunError::Height(HeightError::Core(PcdError::Alignment {
                expected: 6,
                actual: 5
            }))
        ));
        assert!(!output.exists());
    }

    #[test]
    fn correct_heights_fails_on_unknown_height_code() {
        let dir = tempfile::tempdir().unwrap();
        let las = write_source(dir.path());
        let output = dir.path().join("converted_points.las");

        let err = correct_heights(
            &las,
            &output,
            &FakeService::new(0.0),
            &CorrectionOptions {
                height_code: "H2010".to_string(),
                zone: "ON-9".to_string(),
                keep_extract: None,
            },
        )
        .unwrap_err();
        assert!(matches!(
            err,
            RunError::Height(HeightError::Core(PcdError::MissingColumn(_)))
        ));
        assert!(!output.exists());
    }

    #[test]
    fn rejects_non_las_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("points.csv");
        let err = las_to_csv(&input, &dir.path().join("out.csv")).unwrap_err();
        assert!(matches!(err, RunError::NotLas(_)));
    }

    #[test]
    fn single_point_returns_raw_response() {
        let xml = single_point(
            &FakeService::new(35.0),
            330000.0,
            4839000.0,
            0.5,
            &SinglePointOverrides::default(),
        )
        .unwrap();
        assert_eq!(xml, "<result><x>330000</x><y>4839000</y><h>35.5</h></result>");
    }
}
