use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{DataError, Result};
use crate::output::Compression;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub sources: SourcesConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding the prepared source extracts
    pub source_dir: PathBuf,
    /// Directory holding the registry stores (one CSV per entity type)
    pub references_dir: PathBuf,
    /// Directory receiving the normalized tables
    pub output_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("data/sources"),
            references_dir: PathBuf::from("data/references"),
            output_dir: PathBuf::from("data/output"),
        }
    }
}

/// File names of the source extracts, relative to `paths.source_dir`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub regions: String,
    pub departements: String,
    pub epci: String,
    pub communes: String,
    pub communes_geometrie: String,
    pub communes_population: String,
    pub mairies: String,
    pub codes_postaux: String,
    pub cantons: String,
    pub circonscriptions_consulaires: String,
    pub circonscriptions_legislatives: String,
    pub elus_municipaux: String,
    pub deputes: String,
    pub groupes: String,
    pub partis: String,
    pub deputes_groupes: String,
    pub deputes_partis: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            regions: "cog/regions.csv".to_string(),
            departements: "cog/departements.csv".to_string(),
            epci: "cog/epci.csv".to_string(),
            communes: "cog/communes.csv".to_string(),
            communes_geometrie: "admin_express/communes_geometrie.csv".to_string(),
            communes_population: "insee/communes_population.csv".to_string(),
            mairies: "annuaire_administratif/mairies.csv".to_string(),
            codes_postaux: "laposte/codes_postaux.csv".to_string(),
            cantons: "cog/cantons.csv".to_string(),
            circonscriptions_consulaires: "consulaires/circonscriptions_consulaires.csv".to_string(),
            circonscriptions_legislatives: "sciences_po/circonscriptions_legislatives.json"
                .to_string(),
            elus_municipaux: "interieur/rne/elus_municipaux.csv".to_string(),
            deputes: "assemblee_nationale/deputes.csv".to_string(),
            groupes: "assemblee_nationale/groupes.csv".to_string(),
            partis: "assemblee_nationale/partis.csv".to_string(),
            deputes_groupes: "assemblee_nationale/deputes_groupes.csv".to_string(),
            deputes_partis: "assemblee_nationale/deputes_partis.csv".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub compression: Compression,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            compression: Compression::Gzip,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: PathBuf,
    pub file_prefix: String,
    /// Filter used when RUST_LOG is not set
    pub default_filter: String,
    /// Also write JSON logs to a daily-rotated file
    pub json_file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("logs"),
            file_prefix: "data_france.log".to_string(),
            default_filter: "data_france=info,warn".to_string(),
            json_file: true,
        }
    }
}

impl Config {
    /// Load the configuration file, falling back to defaults when it does not exist,
    /// then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                DataError::Config(format!(
                    "Failed to read config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration rooted at a single directory, used by tests and ad-hoc runs
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            paths: PathsConfig {
                source_dir: root.join("sources"),
                references_dir: root.join("references"),
                output_dir: root.join("output"),
            },
            ..Config::default()
        }
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var("DATA_FRANCE_SOURCE_DIR") {
            self.paths.source_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("DATA_FRANCE_REFERENCES_DIR") {
            self.paths.references_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("DATA_FRANCE_OUTPUT_DIR") {
            self.paths.output_dir = PathBuf::from(dir);
        }
        if let Ok(value) = std::env::var("DATA_FRANCE_COMPRESSION") {
            self.output.compression = value.parse().map_err(DataError::Config)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let paths = [
            ("paths.source_dir", &self.paths.source_dir),
            ("paths.references_dir", &self.paths.references_dir),
            ("paths.output_dir", &self.paths.output_dir),
        ];
        for (name, path) in paths {
            if path.as_os_str().is_empty() {
                return Err(DataError::Config(format!("{} must not be empty", name)));
            }
        }
        Ok(())
    }

    pub fn source_path(&self, file_name: &str) -> PathBuf {
        self.paths.source_dir.join(file_name)
    }

    /// Final path of an output table, extension depending on the compression
    pub fn output_path(&self, table: &str) -> PathBuf {
        self.paths
            .output_dir
            .join(format!("{}.{}", table, self.output.compression.extension()))
    }

    pub fn registry_path(&self, name: &str) -> PathBuf {
        self.paths.references_dir.join(format!("{}.csv", name))
    }
}
