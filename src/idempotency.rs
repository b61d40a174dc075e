//! Task fingerprints: decide whether a task must run again.
//!
//! A fingerprint is a SHA-256 over the task name, the bytes of every input file,
//! the bytes of every registry store the task opens and the presence of each of
//! its targets. It is recorded after a successful run; an unchanged fingerprint
//! means running the task again would produce the same files.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::error::{DataError, Result};

pub fn compute_task_fingerprint(
    task: &str,
    inputs: &[PathBuf],
    stores: &[PathBuf],
    targets: &[PathBuf],
) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(b"task\0");
    hasher.update(task.as_bytes());
    hasher.update(b"\n");

    for (kind, paths) in [("input", inputs), ("store", stores)] {
        for path in paths {
            hasher.update(kind.as_bytes());
            hasher.update(b"\0");
            hasher.update(path.to_string_lossy().as_bytes());
            hasher.update(b"\0");
            hasher.update(file_digest(path)?.as_bytes());
            hasher.update(b"\n");
        }
    }

    for target in targets {
        hasher.update(b"target\0");
        hasher.update(target.to_string_lossy().as_bytes());
        hasher.update(if target.exists() { b"\0present\n" as &[u8] } else { b"\0absent\n" });
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Hex SHA-256 of a file's content, `absent` when it does not exist
fn file_digest(path: &Path) -> Result<String> {
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok("absent".to_string()),
        Err(e) => return Err(e.into()),
    };
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Fingerprints of the last successful run of each task
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FingerprintManifest {
    #[serde(skip)]
    path: PathBuf,
    tasks: BTreeMap<String, String>,
}

impl FingerprintManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let mut manifest = match fs::read_to_string(path) {
            Ok(content) => serde_json::from_str::<FingerprintManifest>(&content).map_err(|e| {
                DataError::corruption(path, format!("invalid fingerprint manifest: {}", e))
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => FingerprintManifest::default(),
            Err(e) => return Err(e.into()),
        };
        manifest.path = path.to_path_buf();
        Ok(manifest)
    }

    pub fn get(&self, task: &str) -> Option<&str> {
        self.tasks.get(task).map(String::as_str)
    }

    pub fn record(&mut self, task: &str, fingerprint: String) {
        self.tasks.insert(task.to_string(), fingerprint);
    }

    pub fn forget(&mut self, task: &str) {
        self.tasks.remove(task);
    }

    pub fn save(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut temp = NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut temp, self)?;
        temp.write_all(b"\n")?;
        temp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}
