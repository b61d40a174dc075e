use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("Unknown key {key:?} in read-only registry '{registry}'")]
    UnknownKey { registry: String, key: Vec<String> },

    #[error("Malformed input in {source_name} at line {line}: {message}")]
    MalformedInput {
        source_name: String,
        line: u64,
        message: String,
    },

    #[error("Missing column '{column}' in {source_name}")]
    MissingColumn { source_name: String, column: String },

    #[error("Cannot read source {}: {source}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupted registry store {}: {message}", path.display())]
    StoreCorruption { path: PathBuf, message: String },

    #[error("Registry '{registry}' expects {expected} key fields, got {got}")]
    KeyArity {
        registry: String,
        expected: usize,
        got: usize,
    },

    #[error("Dependency cycle between tasks: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    #[error("Unknown task: {0}")]
    UnknownTask(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid geometry: {0}")]
    Geometry(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),
}

impl DataError {
    pub fn malformed(source_name: impl Into<String>, line: u64, message: impl Into<String>) -> Self {
        DataError::MalformedInput {
            source_name: source_name.into(),
            line,
            message: message.into(),
        }
    }

    pub fn corruption(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        DataError::StoreCorruption {
            path: path.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
