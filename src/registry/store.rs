use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

use super::{Id, IdRegistry, Mode, RegistrySpec};
use crate::error::{DataError, Result};

const ID_COLUMN: &str = "id";

/// Directory holding one registry file per entity type.
///
/// A file is a CSV whose header names the natural-key columns followed by `id`,
/// one row per known key, sorted by ID so that newly allocated IDs show up as
/// appended lines in a diff.
#[derive(Debug, Clone)]
pub struct RegistryStore {
    dir: PathBuf,
}

impl RegistryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", name))
    }

    /// Load the registry `name`; a missing file gives an empty registry
    pub fn open(&self, name: &str, key_columns: &[&str], mode: Mode) -> Result<IdRegistry> {
        let path = self.path(name);
        let columns: Vec<String> = key_columns.iter().map(|c| c.to_string()).collect();

        if !path.exists() {
            debug!(registry = name, "No store yet, starting empty");
            return IdRegistry::from_entries(name, &path, columns, mode, Vec::new(), false);
        }

        let entries = read_entries(&path, &columns)?;
        debug!(registry = name, keys = entries.len(), "Loaded registry store");
        IdRegistry::from_entries(name, &path, columns, mode, entries, true)
    }

    pub fn open_spec(&self, spec: RegistrySpec, mode: Mode) -> Result<IdRegistry> {
        self.open(spec.name, spec.key, mode)
    }
}

fn read_entries(path: &Path, columns: &[String]) -> Result<Vec<(Vec<String>, Id)>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| DataError::corruption(path, e.to_string()))?;

    let headers = reader
        .headers()
        .map_err(|e| DataError::corruption(path, e.to_string()))?
        .clone();
    let expected: Vec<&str> = columns
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(ID_COLUMN))
        .collect();
    if headers.iter().collect::<Vec<_>>() != expected {
        return Err(DataError::corruption(
            path,
            format!(
                "header is {:?}, expected {:?}",
                headers.iter().collect::<Vec<_>>(),
                expected
            ),
        ));
    }

    let mut entries = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let line = index + 2;
        let record = record.map_err(|e| DataError::corruption(path, e.to_string()))?;
        if record.len() != expected.len() {
            return Err(DataError::corruption(
                path,
                format!("line {} has {} fields, expected {}", line, record.len(), expected.len()),
            ));
        }

        let raw_id = &record[columns.len()];
        let id: u32 = raw_id.parse().map_err(|_| {
            DataError::corruption(path, format!("line {}: id '{}' is not a non-negative integer", line, raw_id))
        })?;
        let key = record.iter().take(columns.len()).map(str::to_string).collect();
        entries.push((key, Id::new(id)));
    }
    Ok(entries)
}

/// Rewrite the whole store through a temp file renamed over the old one
pub(super) fn write_entries<'a>(
    path: &Path,
    columns: &[String],
    entries: impl Iterator<Item = (Id, &'a [String])>,
) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;

    let temp = NamedTempFile::new_in(&dir)?;
    let mut writer = csv::Writer::from_writer(temp);

    let mut header: Vec<&str> = columns.iter().map(String::as_str).collect();
    header.push(ID_COLUMN);
    writer.write_record(&header)?;

    for (id, key) in entries {
        let id = id.to_string();
        writer.write_record(key.iter().map(String::as_str).chain(std::iter::once(id.as_str())))?;
    }

    let mut temp = writer.into_inner().map_err(|e| e.into_error())?;
    temp.flush()?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
