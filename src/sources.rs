//! Delimited source extracts with a fixed set of expected columns.

use csv::StringRecord;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::rc::Rc;
use tracing::debug;

use crate::error::{DataError, Result};

/// An opened source file whose header has been checked
pub struct SourceTable {
    name: Rc<str>,
    reader: csv::Reader<File>,
    columns: Rc<HashMap<String, usize>>,
}

impl SourceTable {
    /// Open `path` and check that every column of `required` is present.
    ///
    /// A missing column is fatal: the extract does not have the expected format.
    pub fn open(name: &str, path: &Path, delimiter: u8, required: &[&str]) -> Result<Self> {
        let file = File::open(path).map_err(|source| DataError::SourceUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .trim(csv::Trim::Fields)
            .from_reader(file);

        let headers = reader.headers().map_err(|e| row_error(name, e))?;
        let columns: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim_start_matches('\u{feff}').trim().to_string(), i))
            .collect();

        for column in required {
            if !columns.contains_key(*column) {
                return Err(DataError::MissingColumn {
                    source_name: name.to_string(),
                    column: column.to_string(),
                });
            }
        }
        debug!(source = name, path = %path.display(), "Opened source");

        Ok(Self {
            name: Rc::from(name),
            reader,
            columns: Rc::new(columns),
        })
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    /// Stream the rows; any unreadable row is an error
    pub fn rows(self) -> impl Iterator<Item = Result<SourceRow>> {
        let name = self.name;
        let columns = self.columns;
        self.reader.into_records().map(move |record| {
            let record = record.map_err(|e| row_error(&name, e))?;
            let line = record.position().map_or(0, |p| p.line());
            Ok(SourceRow {
                source: Rc::clone(&name),
                line,
                record,
                columns: Rc::clone(&columns),
            })
        })
    }

    /// Read the whole file in memory
    pub fn read_all(self) -> Result<Vec<SourceRow>> {
        self.rows().collect()
    }
}

fn row_error(name: &str, e: csv::Error) -> DataError {
    if e.is_io_error() {
        return DataError::Csv(e);
    }
    let line = e.position().map_or(0, |p| p.line());
    DataError::malformed(name, line, e.to_string())
}

/// One row of a source extract
#[derive(Debug, Clone)]
pub struct SourceRow {
    source: Rc<str>,
    line: u64,
    record: StringRecord,
    columns: Rc<HashMap<String, usize>>,
}

impl SourceRow {
    /// Value of `column`; columns absent from the file read as empty
    pub fn get(&self, column: &str) -> &str {
        self.columns
            .get(column)
            .and_then(|i| self.record.get(*i))
            .unwrap_or("")
    }

    /// Value of `column`, `None` when empty
    pub fn opt(&self, column: &str) -> Option<&str> {
        Some(self.get(column)).filter(|v| !v.is_empty())
    }

    /// Value of a column that must not be empty
    pub fn required(&self, column: &str) -> Result<&str> {
        self.opt(column)
            .ok_or_else(|| self.malformed(format!("empty value for '{}'", column)))
    }

    pub fn line(&self) -> u64 {
        self.line
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Error pointing at this row
    pub fn malformed(&self, message: impl Into<String>) -> DataError {
        DataError::malformed(self.source.to_string(), self.line, message)
    }
}
