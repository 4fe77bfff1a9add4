//! Tabular dataset ingestion and persistence
//!
//! Reads a headed CSV file into memory and writes it back with an extra
//! column appended, preserving row order.

use crate::error::ComputeError;
use csv::{ReaderBuilder, StringRecord, Writer};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Default name of the appended risk column
pub const DEFAULT_RISK_COLUMN: &str = "W_risk";

/// One data row
#[derive(Debug, Clone)]
pub struct Row {
    record: StringRecord,
}

impl Row {
    /// Cell at a column position
    pub fn cell(&self, index: usize) -> Option<&str> {
        self.record.get(index)
    }
}

/// In-memory headed table
#[derive(Debug, Clone)]
pub struct Dataset {
    headers: Vec<String>,
    rows: Vec<Row>,
}

impl Dataset {
    /// Load a CSV file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ComputeError> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(file)
    }

    /// Load CSV from any reader; every record must have as many fields as the header
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ComputeError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let headers = reader.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            rows.push(Row { record: record? });
        }

        tracing::debug!(rows = rows.len(), "dataset loaded");
        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell by row position and column name
    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.headers.iter().position(|h| h == column)?;
        self.rows.get(row)?.cell(index)
    }

    /// Write the dataset to `path` with `name` appended as the last column.
    ///
    /// `values` must have one entry per row; `None` leaves the cell empty.
    pub fn write_with_column<P: AsRef<Path>>(
        &self,
        path: P,
        name: &str,
        values: &[Option<f64>],
    ) -> Result<(), ComputeError> {
        let file = File::create(path.as_ref())?;
        self.write_with_column_to(file, name, values)
    }

    /// Same as `write_with_column`, to any writer
    pub fn write_with_column_to<W: Write>(
        &self,
        writer: W,
        name: &str,
        values: &[Option<f64>],
    ) -> Result<(), ComputeError> {
        if values.len() != self.rows.len() {
            return Err(ComputeError::LengthMismatch {
                rows: self.rows.len(),
                values: values.len(),
            });
        }

        let mut writer = Writer::from_writer(writer);

        let mut header = StringRecord::from(self.headers.clone());
        header.push_field(name);
        writer.write_record(&header)?;

        for (row, value) in self.rows.iter().zip(values) {
            let mut record = row.record.clone();
            let cell = value.map(|v| format!("{v:.6}")).unwrap_or_default();
            record.push_field(&cell);
            writer.write_record(&record)?;
        }

        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = "Age,Sex,BMI\n45,M,24.5\n61,F,31.0\n";

    #[test]
    fn test_reads_headers_and_rows() {
        let dataset = Dataset::from_reader(SAMPLE.as_bytes()).unwrap();

        assert_eq!(dataset.headers(), &["Age", "Sex", "BMI"]);
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.get(1, "Sex"), Some("F"));
        assert_eq!(dataset.get(0, "Missing"), None);
        assert_eq!(dataset.rows()[0].cell(2), Some("24.5"));
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let result = Dataset::from_reader("a,b\n1,2\n3\n".as_bytes());
        assert!(matches!(result, Err(ComputeError::CsvError(_))));
    }

    #[test]
    fn test_header_only_is_empty() {
        let dataset = Dataset::from_reader("a,b\n".as_bytes()).unwrap();
        assert!(dataset.is_empty());
    }

    #[test]
    fn test_write_appends_column_in_order() {
        let dataset = Dataset::from_reader(SAMPLE.as_bytes()).unwrap();
        let mut out = Vec::new();
        dataset
            .write_with_column_to(&mut out, DEFAULT_RISK_COLUMN, &[Some(0.123456), None])
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "Age,Sex,BMI,W_risk\n45,M,24.5,0.123456\n61,F,31.0,\n"
        );
    }

    #[test]
    fn test_write_length_mismatch() {
        let dataset = Dataset::from_reader(SAMPLE.as_bytes()).unwrap();
        let result = dataset.write_with_column_to(Vec::new(), "r", &[Some(0.5)]);
        assert!(matches!(
            result,
            Err(ComputeError::LengthMismatch { rows: 2, values: 1 })
        ));
    }
}
