use std::{fs::File, io::Read, path::Path};

use csv::{ReaderBuilder, StringRecord};

use crate::error::ParseError;

/// Reads delimited text as raw field tuples.
///
/// No header handling and no field-count validation: every non-blank line comes back as-is and
/// the caller decides what to do with short or long rows.
pub struct DelimitedReader<R: Read> {
    reader: csv::Reader<R>,
}

impl DelimitedReader<File> {
    pub fn from_path<P: AsRef<Path>>(path: P, delimiter: char) -> Result<Self, ParseError> {
        let reader = builder(delimiter)?.from_path(path)?;
        Ok(Self { reader })
    }
}

impl<R: Read> DelimitedReader<R> {
    pub fn from_reader(rdr: R, delimiter: char) -> Result<Self, ParseError> {
        let reader = builder(delimiter)?.from_reader(rdr);
        Ok(Self { reader })
    }

    pub fn rows(&mut self) -> impl Iterator<Item = Result<Vec<String>, ParseError>> + '_ {
        self.reader.records().map(|record| {
            let record = record?;
            Ok(record.iter().map(str::to_string).collect())
        })
    }
}

fn builder(delimiter: char) -> Result<ReaderBuilder, ParseError> {
    let byte = u8::try_from(delimiter).map_err(|_| ParseError::InvalidDelimiter(delimiter))?;
    let mut builder = ReaderBuilder::new();
    builder.has_headers(false).flexible(true).delimiter(byte);
    Ok(builder)
}

/// Loads real-world X/Y/Z coordinates from a delimited file.
///
/// The first row is treated as a header when it is not numeric. Rows whose field count differs
/// from the first row are skipped.
pub struct CsvPointLoader<R: Read> {
    reader: DelimitedReader<R>,
}

impl CsvPointLoader<File> {
    pub fn from_path<P: AsRef<Path>>(path: P, delimiter: char) -> Result<Self, ParseError> {
        Ok(Self {
            reader: DelimitedReader::from_path(path, delimiter)?,
        })
    }
}

impl<R: Read> CsvPointLoader<R> {
    pub fn from_reader(rdr: R, delimiter: char) -> Result<Self, ParseError> {
        Ok(Self {
            reader: DelimitedReader::from_reader(rdr, delimiter)?,
        })
    }

    pub fn load(mut self) -> Result<Vec<[f64; 3]>, ParseError> {
        let mut points = Vec::new();
        let mut mapping: Option<([usize; 3], usize)> = None;
        let mut skipped = 0;

        for (index, row) in self.reader.rows().enumerate() {
            let row = row?;
            let row_number = index + 1;

            let (columns, field_count) = match mapping {
                Some(mapping) => mapping,
                None if is_numeric_row(&row) => {
                    let positional = ([0, 1, 2], row.len());
                    mapping = Some(positional);
                    positional
                }
                None => {
                    let header = StringRecord::from(row);
                    mapping = Some((create_field_mapping(&header)?, header.len()));
                    continue;
                }
            };

            if row.len() != field_count {
                log::warn!(
                    "skipping row {}: expected {} fields, found {}",
                    row_number,
                    field_count,
                    row.len()
                );
                skipped += 1;
                continue;
            }

            let mut point = [0.0; 3];
            for ((value, &column), name) in point.iter_mut().zip(&columns).zip(["x", "y", "z"]) {
                let field = &row[column];
                *value = field
                    .trim()
                    .parse()
                    .map_err(|_| ParseError::InvalidValue {
                        row: row_number,
                        column: name,
                        value: field.clone(),
                    })?;
            }
            points.push(point);

            if points.len() % 1000 == 0 {
                log::info!("{} points loaded", points.len());
            }
        }

        if skipped > 0 {
            log::warn!("{} malformed rows skipped", skipped);
        }

        Ok(points)
    }
}

fn is_numeric_row(row: &[String]) -> bool {
    row.len() >= 3 && row[..3].iter().all(|f| f.trim().parse::<f64>().is_ok())
}

fn create_field_mapping(headers: &StringRecord) -> Result<[usize; 3], ParseError> {
    let mut mapping: [Option<usize>; 3] = [None; 3];

    for (index, header) in headers.iter().enumerate() {
        let normalized_header = header.trim().to_lowercase().replace(['_', '-'], "");
        for (slot, attr_name) in mapping.iter_mut().zip(["x", "y", "z"]) {
            if slot.is_none() && normalized_header == attr_name {
                *slot = Some(index);
                break;
            }
        }
    }

    let mut columns = [0; 3];
    for ((column, slot), attr_name) in columns.iter_mut().zip(mapping).zip(["x", "y", "z"]) {
        *column = slot.ok_or(ParseError::MissingField(attr_name))?;
    }
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_keep_raw_fields_and_skip_blank_lines() {
        let text = "utm_e,utm_n,height\n\n1.5,2.5,3.5\n4,5\n";
        let mut reader = DelimitedReader::from_reader(text.as_bytes(), ',').unwrap();
        let rows: Vec<Vec<String>> = reader.rows().collect::<Result<_, _>>().unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], vec!["utm_e", "utm_n", "height"]);
        assert_eq!(rows[1], vec!["1.5", "2.5", "3.5"]);
        assert_eq!(rows[2], vec!["4", "5"]);
    }

    #[test]
    fn rejects_multibyte_delimiter() {
        let err = DelimitedReader::from_reader("".as_bytes(), '→').err().unwrap();
        assert!(matches!(err, ParseError::InvalidDelimiter('→')));
    }

    #[test]
    fn loads_space_delimited_points_without_header() {
        let text = "329999.8947 4839000.0062 0.671\n330002.2338 4838999.6872 0.617\n";
        let points = CsvPointLoader::from_reader(text.as_bytes(), ' ')
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(
            points,
            vec![
                [329999.8947, 4839000.0062, 0.671],
                [330002.2338, 4838999.6872, 0.617]
            ]
        );
    }

    #[test]
    fn loads_points_by_header_name_and_skips_malformed_rows() {
        let text = "intensity,Z,X,Y\n10,0.5,1.0,2.0\n11,0.6\n12,0.7,3.0,4.0\n";
        let points = CsvPointLoader::from_reader(text.as_bytes(), ',')
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(points, vec![[1.0, 2.0, 0.5], [3.0, 4.0, 0.7]]);
    }

    #[test]
    fn missing_axis_column_is_an_error() {
        let text = "x,y,height\n1,2,3\n";
        let err = CsvPointLoader::from_reader(text.as_bytes(), ',')
            .unwrap()
            .load()
            .unwrap_err();
        assert!(matches!(err, ParseError::MissingField("z")));
    }

    #[test]
    fn unparsable_value_reports_row() {
        let text = "X,Y,Z\n1,2,3\n4,five,6\n";
        let err = CsvPointLoader::from_reader(text.as_bytes(), ',')
            .unwrap()
            .load()
            .unwrap_err();
        match err {
            ParseError::InvalidValue { row, column, value } => {
                assert_eq!(row, 3);
                assert_eq!(column, "y");
                assert_eq!(value, "five");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
