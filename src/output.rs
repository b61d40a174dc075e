//! Output tables: one delimited file per entity, written to a temp file in the
//! destination directory and renamed onto the final name only once complete.

use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::constants::NULL;
use crate::error::{DataError, Result};
use crate::registry::Id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    None,
    Gzip,
}

impl Compression {
    pub fn extension(&self) -> &'static str {
        match self {
            Compression::None => "csv",
            Compression::Gzip => "csv.gz",
        }
    }
}

impl FromStr for Compression {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Compression::None),
            "gzip" | "gz" => Ok(Compression::Gzip),
            other => Err(format!("unknown compression '{}'", other)),
        }
    }
}

/// One output field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Null,
    Text(String),
    Int(i64),
}

impl Cell {
    /// Empty or missing values become NULL
    pub fn or_null(value: Option<&str>) -> Self {
        match value {
            Some(v) if !v.is_empty() => Cell::Text(v.to_string()),
            _ => Cell::Null,
        }
    }

    pub fn render(&self) -> String {
        match self {
            Cell::Null => NULL.to_string(),
            Cell::Text(s) => s.clone(),
            Cell::Int(i) => i.to_string(),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<Id> for Cell {
    fn from(value: Id) -> Self {
        Cell::Int(i64::from(value.get()))
    }
}

impl From<Option<Id>> for Cell {
    fn from(value: Option<Id>) -> Self {
        value.map_or(Cell::Null, Cell::from)
    }
}

enum Sink {
    Plain(BufWriter<NamedTempFile>),
    Gzip(GzEncoder<BufWriter<NamedTempFile>>),
}

impl Sink {
    fn into_temp_file(self) -> io::Result<NamedTempFile> {
        let buffered = match self {
            Sink::Plain(w) => w,
            Sink::Gzip(encoder) => encoder.finish()?,
        };
        buffered.into_inner().map_err(|e| e.into_error())
    }
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Plain(w) => w.write(buf),
            Sink::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Plain(w) => w.flush(),
            Sink::Gzip(w) => w.flush(),
        }
    }
}

/// Writer for one output table.
///
/// Dropping the writer without calling [`TableWriter::finish`] removes the temp
/// file, so a failed normalization never publishes a partial table.
pub struct TableWriter {
    table: String,
    dest: PathBuf,
    columns: usize,
    rows: usize,
    writer: csv::Writer<Sink>,
}

impl TableWriter {
    pub fn create(table: &str, dest: &Path, columns: &[&str], compression: Compression) -> Result<Self> {
        let dir = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let temp = NamedTempFile::new_in(&dir)?;
        let buffered = BufWriter::new(temp);
        let sink = match compression {
            Compression::None => Sink::Plain(buffered),
            // GzEncoder leaves the header mtime at 0, keeping the output reproducible
            Compression::Gzip => Sink::Gzip(GzEncoder::new(buffered, flate2::Compression::default())),
        };

        let mut writer = csv::WriterBuilder::new().from_writer(sink);
        writer.write_record(columns)?;

        Ok(Self {
            table: table.to_string(),
            dest: dest.to_path_buf(),
            columns: columns.len(),
            rows: 0,
            writer,
        })
    }

    pub fn write_row(&mut self, row: Vec<Cell>) -> Result<()> {
        if row.len() != self.columns {
            return Err(DataError::malformed(
                format!("output table {}", self.table),
                self.rows as u64 + 2,
                format!("expected {} columns, got {}", self.columns, row.len()),
            ));
        }
        self.writer.write_record(row.iter().map(Cell::render))?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Flush everything into the temp file; the table is not visible yet
    pub fn finish(self) -> Result<StagedTable> {
        let sink = self.writer.into_inner().map_err(|e| e.into_error())?;
        let temp = sink.into_temp_file()?;
        temp.as_file().sync_all()?;
        debug!("Staged table {} ({} rows)", self.table, self.rows);
        Ok(StagedTable {
            table: self.table,
            dest: self.dest,
            rows: self.rows,
            temp,
        })
    }
}

/// A fully written table waiting to be renamed onto its final path
pub struct StagedTable {
    table: String,
    dest: PathBuf,
    rows: usize,
    temp: NamedTempFile,
}

impl StagedTable {
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn publish(self) -> Result<PathBuf> {
        self.temp.persist(&self.dest).map_err(|e| e.error)?;
        Ok(self.dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    fn list_dir(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_null_is_distinct_from_empty_text() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("t.csv");
        let mut w = TableWriter::create("t", &dest, &["a", "b", "c"], Compression::None).unwrap();
        w.write_row(vec![Cell::Null, Cell::from(""), Cell::Int(3)]).unwrap();
        w.finish().unwrap().publish().unwrap();

        let content = fs::read_to_string(&dest).unwrap();
        assert_eq!(content, "a,b,c\n\\N,,3\n");
    }

    #[test]
    fn test_nothing_visible_until_published() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("t.csv");
        let mut w = TableWriter::create("t", &dest, &["a"], Compression::None).unwrap();
        w.write_row(vec![Cell::from("x")]).unwrap();
        let staged = w.finish().unwrap();
        assert!(!dest.exists());
        staged.publish().unwrap();
        assert!(dest.exists());
    }

    #[test]
    fn test_dropped_writer_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("t.csv");
        {
            let mut w = TableWriter::create("t", &dest, &["a"], Compression::Gzip).unwrap();
            w.write_row(vec![Cell::from("x")]).unwrap();
        }
        assert!(list_dir(dir.path()).is_empty());
    }

    #[test]
    fn test_wrong_arity_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut w =
            TableWriter::create("t", &dir.path().join("t.csv"), &["a", "b"], Compression::None).unwrap();
        assert!(w.write_row(vec![Cell::Null]).is_err());
    }

    #[test]
    fn test_gzip_output_is_reproducible() {
        let dir = tempfile::tempdir().unwrap();
        let mut contents = Vec::new();
        for name in ["one.csv.gz", "two.csv.gz"] {
            let dest = dir.path().join(name);
            let mut w = TableWriter::create("t", &dest, &["id", "code"], Compression::Gzip).unwrap();
            w.write_row(vec![Cell::Int(0), Cell::from("01001")]).unwrap();
            w.finish().unwrap().publish().unwrap();
            contents.push(fs::read(&dest).unwrap());
        }
        assert_eq!(contents[0], contents[1]);

        let mut decoded = String::new();
        GzDecoder::new(&contents[0][..]).read_to_string(&mut decoded).unwrap();
        assert_eq!(decoded, "id,code\n0,01001\n");
    }
}
