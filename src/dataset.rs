use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::constants::is_missing;
use crate::error::{CleaningError, Result};

/// A CSV table held in memory as text cells.
///
/// Column names and order are preserved exactly as read, so writing a dataset
/// back out only changes the cells a cleaning step rewrote.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Dataset {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn read_csv(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    /// Reads a headed CSV. Short rows are padded with empty (missing) cells,
    /// rows wider than the header are rejected.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        let width = headers.len();

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            if record.len() > width {
                return Err(CleaningError::MalformedRow {
                    line: record.position().map(|p| p.line()).unwrap_or(0),
                    expected: width,
                    found: record.len(),
                });
            }
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            row.resize(width, String::new());
            rows.push(row);
        }

        Ok(Self { headers, rows })
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        self.to_writer(file)
    }

    /// Writes the header row followed by every row; no index column.
    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.headers)?;
        for row in &self.rows {
            wtr.write_record(row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Number of rows, header excluded
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| CleaningError::MissingColumn(name.to_string()))
    }

    pub fn column(&self, name: &str) -> Result<Vec<&str>> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(|row| row[idx].as_str()).collect())
    }

    /// Numeric view of a column; missing or unparseable cells are `None`.
    pub fn numeric_column(&self, name: &str) -> Result<Vec<Option<f64>>> {
        Ok(self.column(name)?.into_iter().map(parse_number).collect())
    }

    pub fn null_count(&self, name: &str) -> Result<usize> {
        Ok(self.column(name)?.into_iter().filter(|c| is_missing(c)).count())
    }

    /// Replaces every cell of `name` with `f(cell)`.
    pub fn map_column<F>(&mut self, name: &str, mut f: F) -> Result<()>
    where
        F: FnMut(&str) -> String,
    {
        let idx = self.column_index(name)?;
        for row in &mut self.rows {
            let updated = f(&row[idx]);
            row[idx] = updated;
        }
        Ok(())
    }

    /// Overwrites a whole column; `values` must have one entry per row.
    pub fn replace_column(&mut self, name: &str, values: Vec<String>) -> Result<()> {
        let idx = self.column_index(name)?;
        if values.len() != self.rows.len() {
            return Err(CleaningError::ColumnLength {
                column: name.to_string(),
                expected: self.rows.len(),
                found: values.len(),
            });
        }
        for (row, value) in self.rows.iter_mut().zip(values) {
            row[idx] = value;
        }
        Ok(())
    }

    /// Keeps the rows for which `keep` returns true, preserving order.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&[String]) -> bool,
    {
        self.rows.retain(|row| keep(row));
    }
}

/// Parses a numeric cell; NA tokens and non-numeric text give `None`.
pub fn parse_number(cell: &str) -> Option<f64> {
    if is_missing(cell) {
        return None;
    }
    cell.trim().parse::<f64>().ok().filter(|v| !v.is_nan())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "id,name,price\n1,Cozy loft,150\n2,\"Room, shared\",45\n3,Studio\n";

    #[test]
    fn reads_headers_and_pads_short_rows() {
        let ds = Dataset::from_reader(SAMPLE.as_bytes()).unwrap();
        assert_eq!(ds.headers(), &["id", "name", "price"]);
        assert_eq!(ds.height(), 3);
        assert_eq!(ds.column("name").unwrap()[1], "Room, shared");
        assert_eq!(ds.column("price").unwrap()[2], "");
        assert_eq!(ds.null_count("price").unwrap(), 1);
    }

    #[test]
    fn rejects_rows_wider_than_header() {
        let err = Dataset::from_reader("a,b\n1,2,3\n".as_bytes()).unwrap_err();
        assert!(matches!(err, CleaningError::MalformedRow { expected: 2, found: 3, .. }));
    }

    #[test]
    fn missing_column_is_an_error() {
        let ds = Dataset::from_reader(SAMPLE.as_bytes()).unwrap();
        let err = ds.column("latitude").unwrap_err();
        assert!(matches!(err, CleaningError::MissingColumn(c) if c == "latitude"));
    }

    #[test]
    fn writes_without_index_column_and_requotes() {
        let ds = Dataset::from_reader(SAMPLE.as_bytes()).unwrap();
        let mut out = Vec::new();
        ds.to_writer(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "id,name,price\n1,Cozy loft,150\n2,\"Room, shared\",45\n3,Studio,\n");
    }

    #[test]
    fn numeric_column_treats_text_as_missing() {
        let ds = Dataset::from_reader("price\n10\nabc\n\"\"\n-5.5\nNaN\n".as_bytes()).unwrap();
        assert_eq!(
            ds.numeric_column("price").unwrap(),
            vec![Some(10.0), None, None, Some(-5.5), None]
        );
    }

    #[test]
    fn map_and_retain_touch_only_their_targets() {
        let mut ds = Dataset::from_reader(SAMPLE.as_bytes()).unwrap();
        ds.map_column("name", |c| c.to_uppercase()).unwrap();
        ds.retain(|row| row[0] != "2");
        assert_eq!(ds.height(), 2);
        assert_eq!(ds.column("name").unwrap(), vec!["COZY LOFT", "STUDIO"]);
        assert_eq!(ds.column("id").unwrap(), vec!["1", "3"]);
    }
}
