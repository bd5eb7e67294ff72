use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "biodb";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable overriding the settings file location
pub const CONFIG_ENV: &str = "BIODB_CONFIG";

/// Get the application data directory.
/// Falls back to the working directory when the platform has no data dir.
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default SQLite database location
pub fn default_database_path() -> PathBuf {
    app_data_dir().join("biodb.sqlite3")
}

/// Default blob store root (encoded measurements)
pub fn default_blob_dir() -> PathBuf {
    app_data_dir().join("spectral_data")
}

/// Log filter used when `RUST_LOG` is not set
pub fn default_log_filter() -> &'static str {
    "biodb=info"
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid settings file {path}: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Which identity column keys the bulk-upload tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IndexColumn {
    #[default]
    PatientId,
    PatientCid,
}

impl IndexColumn {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PatientId => "patient_id",
            Self::PatientCid => "patient_cid",
        }
    }
}

/// Flags threaded through one ingestion call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub index_column: IndexColumn,
    /// Run default QC annotators on every new measurement.
    pub auto_annotate: bool,
    /// Link new visits to the subject's latest existing visit.
    pub auto_find_previous_visit: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            index_column: IndexColumn::PatientId,
            auto_annotate: true,
            auto_find_previous_visit: false,
        }
    }
}

/// Settings loaded from an optional TOML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database_path: PathBuf,
    pub blob_dir: PathBuf,
    /// Observable names left out of the pivoted visit view.
    pub view_exclusions: Vec<String>,
    pub ingest: IngestConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            blob_dir: default_blob_dir(),
            view_exclusions: Vec::new(),
            ingest: IngestConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings from `path`; missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Resolve settings from an explicit path, else `BIODB_CONFIG`, else defaults.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => match std::env::var_os(CONFIG_ENV) {
                Some(p) => Self::load(Path::new(&p)),
                None => Ok(Self::default()),
            },
        }
    }
}
