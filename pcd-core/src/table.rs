use std::io::Read;

use csv::{ByteRecord, ReaderBuilder, StringRecord};

use crate::error::PcdError;

/// A rectangular text matrix: one header row and the data rows matching its column count.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseTable {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
    dropped_rows: usize,
}

impl ResponseTable {
    /// Parses delimited text. The first record is the header; data rows whose column count
    /// differs from the header are dropped. Blank lines are skipped.
    pub fn parse(text: &str, delimiter: char) -> Result<Self, PcdError> {
        Self::from_reader(text.as_bytes(), delimiter)
    }

    pub fn from_reader<R: Read>(rdr: R, delimiter: char) -> Result<Self, PcdError> {
        let mut reader = builder(delimiter)?.from_reader(rdr);
        let mut records = reader.records();

        let header: Vec<String> = match records.next() {
            Some(record) => to_fields(&record?),
            None => Vec::new(),
        };

        let mut rows = Vec::new();
        let mut dropped_rows = 0;

        for (index, record) in records.enumerate() {
            let row = to_fields(&record?);
            if row.len() == header.len() {
                rows.push(row);
            } else {
                log::warn!(
                    "dropping response row {}: expected {} columns, found {}",
                    index + 1,
                    header.len(),
                    row.len()
                );
                dropped_rows += 1;
            }
        }

        Ok(Self {
            header,
            rows,
            dropped_rows,
        })
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn dropped_rows(&self) -> usize {
        self.dropped_rows
    }

    /// Index of the first header column named exactly `name`.
    pub fn column_index(&self, name: &str) -> Result<usize, PcdError> {
        self.header
            .iter()
            .position(|column| column == name)
            .ok_or_else(|| PcdError::MissingColumn(name.to_string()))
    }

    pub fn column(&self, name: &str) -> Result<impl Iterator<Item = &str>, PcdError> {
        let index = self.column_index(name)?;
        Ok(self.rows.iter().map(move |row| row[index].as_str()))
    }
}

/// Number of records after the header, whatever their column count.
pub fn count_data_rows<R: Read>(rdr: R, delimiter: char) -> Result<usize, PcdError> {
    let mut reader = builder(delimiter)?.from_reader(rdr);
    let mut record = ByteRecord::new();
    let mut records = 0usize;
    while reader.read_byte_record(&mut record)? {
        records += 1;
    }
    Ok(records.saturating_sub(1))
}

fn builder(delimiter: char) -> Result<ReaderBuilder, PcdError> {
    let byte = u8::try_from(delimiter).map_err(|_| PcdError::InvalidDelimiter(delimiter))?;
    let mut builder = ReaderBuilder::new();
    builder.has_headers(false).flexible(true).delimiter(byte);
    Ok(builder)
}

fn to_fields(record: &StringRecord) -> Vec<String> {
    record.iter().map(str::to_string).collect()
}
