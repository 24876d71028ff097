//! Engine configuration
//!
//! Reads `flowframe.toml`. Every section is optional; defaults make an
//! empty file (or no file at all) a working configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub datasets: DatasetsConfig,

    #[serde(default)]
    pub postgres: PostgresConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Default graph file executed when the CLI gets no `--graph`.
    pub graph: Option<PathBuf>,

    /// Log level: "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Session identifier stamped into execution results.
    #[serde(default = "default_session")]
    pub session_id: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            graph: None,
            log_level: default_log_level(),
            session_id: default_session(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatasetsConfig {
    /// Directory resolved against relative dataset paths.
    #[serde(default = "default_dataset_dir")]
    pub dir: PathBuf,

    /// CSV delimiter, a single character.
    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    /// Whether CSV files carry a header row.
    #[serde(default = "default_true")]
    pub has_header: bool,
}

impl Default for DatasetsConfig {
    fn default() -> Self {
        Self {
            dir: default_dataset_dir(),
            delimiter: default_delimiter(),
            has_header: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PostgresConfig {
    /// Connection string handed to the query backend, when one is
    /// installed.
    pub connection: Option<String>,
}

fn default_log_level() -> String {
    "info".into()
}

fn default_session() -> String {
    "local".into()
}

fn default_dataset_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_delimiter() -> String {
    ",".into()
}

fn default_true() -> bool {
    true
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.datasets.delimiter.chars().count() != 1 {
            return Err(ConfigError::Validation(format!(
                "datasets.delimiter must be a single character, got '{}'",
                self.datasets.delimiter
            )));
        }
        match self.engine.log_level.as_str() {
            "debug" | "info" | "warn" | "error" => Ok(()),
            other => Err(ConfigError::Validation(format!(
                "unknown log level '{other}'"
            ))),
        }
    }

    pub fn delimiter_byte(&self) -> u8 {
        self.datasets.delimiter.bytes().next().unwrap_or(b',')
    }
}
