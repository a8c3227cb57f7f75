//! Configuration for filingsum
//!
//! Resolution order: built-in defaults, then `config.toml` (from `--config`,
//! `FILINGSUM_CONFIG_DIR`, or `~/.config/filingsum/`), then environment
//! variables. The CLI applies its own flags last and calls [`Config::validate`].

pub mod types;

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{FilingError, Result};
use crate::{bail_invalid, bail_usage};

pub use types::{
    Config, EdgarConfig, ModelConfig, PathsConfig, PipelineConfig, MIN_REQUEST_DELAY_MS,
};

const CONFIG_DIR: &str = "filingsum";
const CONFIG_FILE: &str = "config.toml";
const CONFIG_DIR_ENV_VAR: &str = "FILINGSUM_CONFIG_DIR";

const MAX_WORKERS: usize = 8;

impl Config {
    /// Default location of the configuration file
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = if let Ok(env_dir) = std::env::var(CONFIG_DIR_ENV_VAR) {
            PathBuf::from(env_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| {
                    FilingError::Other("unable to determine config directory".to_string())
                })?
                .join(CONFIG_DIR)
        };

        Ok(config_dir.join(CONFIG_FILE))
    }

    /// Load configuration from a file, falling back to defaults.
    ///
    /// An explicit path must exist; the default path is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = Self::default_path()?;
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    Self::default()
                }
            }
        };

        Ok(config.with_env_overrides())
    }

    /// Parse a configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| FilingError::io_operation("read config", path.display(), e))?;

        toml::from_str(&content).map_err(|e| {
            FilingError::invalid_value("config file", format!("{}: {}", path.display(), e))
        })
    }

    /// Apply environment variable overrides
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(dir) = env_string("FILINGSUM_DATA_DIR") {
            self.paths.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = env_string("FILINGSUM_OUTPUT_DIR") {
            self.paths.output_dir = Some(PathBuf::from(dir));
        }
        if let Some(agent) = env_string("SEC_USER_AGENT") {
            self.edgar.user_agent = Some(agent);
        }
        if let Some(model) = env_string("FILINGSUM_MODEL") {
            self.model.name = model;
        }
        if let Some(url) = env_string("FILINGSUM_OLLAMA_URL") {
            self.model.base_url = url;
        }
        if let Some(size) = env_parse("FILINGSUM_CHUNK_SIZE") {
            self.pipeline.chunk_size = size;
        }
        if let Some(overlap) = env_parse("FILINGSUM_CHUNK_OVERLAP") {
            self.pipeline.overlap = overlap;
        }
        if let Some(temperature) = env_parse("FILINGSUM_TEMPERATURE") {
            self.model.temperature = temperature;
        }
        self
    }

    /// Check settings that every command depends on
    pub fn validate(&self) -> Result<()> {
        let pipeline = &self.pipeline;
        if pipeline.chunk_size == 0 {
            bail_invalid!("chunk size", "must be greater than zero");
        }
        if pipeline.overlap >= pipeline.chunk_size {
            bail_invalid!(
                "chunk overlap",
                format!(
                    "{} must be smaller than chunk size {}",
                    pipeline.overlap, pipeline.chunk_size
                )
            );
        }
        if pipeline.workers == 0 || pipeline.workers > MAX_WORKERS {
            bail_invalid!(
                "workers",
                format!("{} (expected 1-{})", pipeline.workers, MAX_WORKERS)
            );
        }
        if self.model.name.trim().is_empty() {
            bail_invalid!("model name", "must not be empty");
        }
        if !(0.0..=2.0).contains(&self.model.temperature) {
            bail_invalid!("temperature", self.model.temperature);
        }
        if self.model.backend == crate::inference::Backend::Command && self.model.command.is_empty()
        {
            bail_usage!("the command backend requires model.command (program and arguments)");
        }
        if self.edgar.request_delay_ms < MIN_REQUEST_DELAY_MS {
            bail_invalid!(
                "EDGAR request delay",
                format!(
                    "{}ms (SEC requires at least {}ms)",
                    self.edgar.request_delay_ms, MIN_REQUEST_DELAY_MS
                )
            );
        }
        Ok(())
    }

    /// Check the settings needed to talk to EDGAR
    pub fn validate_edgar(&self) -> Result<&str> {
        match self.edgar.user_agent.as_deref() {
            Some(agent) if agent.contains('@') => Ok(agent),
            Some(agent) => Err(FilingError::invalid_value(
                "SEC user agent",
                format!("{agent:?} must contain a contact e-mail address"),
            )),
            None => bail_usage!(
                "set SEC_USER_AGENT (or edgar.user_agent) to 'Name email@domain' before downloading filings"
            ),
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        self.paths
            .output_dir
            .clone()
            .unwrap_or_else(|| self.paths.data_dir.join("summaries"))
    }

    pub fn raw_filings_dir(&self) -> PathBuf {
        self.paths.data_dir.join("raw_filings")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.paths.data_dir.join("cache")
    }

    pub fn progress_dir(&self) -> PathBuf {
        self.paths.data_dir.join("progress")
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| FilingError::Other(format!("failed to serialize config: {}", e)))
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env_string(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(variable = name, value = %raw, "ignoring unparsable environment override");
            None
        }
    }
}
