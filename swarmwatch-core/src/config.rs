use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use swarmwatch_scanner::ExtractOptions;
use swarmwatch_scanner::client::DEFAULT_ENDPOINT;
use thiserror::Error;
use url::Url;

pub const DEFAULT_CONFIG_PATH: &str = "~/.config/swarmwatch/config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid endpoint '{0}'")]
    Endpoint(String),
}

/// Everything tunable about a scan. Missing keys fall back to defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
    pub initial_delay_ms: u64,
    pub interval_ms: u64,
    pub min_raw_chars: usize,
    pub min_text_chars: usize,
    pub viewport_width: f64,
    pub single_flight: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: 10,
            initial_delay_ms: 2000,
            interval_ms: 5000,
            min_raw_chars: 10,
            min_text_chars: 5,
            viewport_width: 1280.0,
            single_flight: false,
        }
    }
}

impl ScanConfig {
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` (tilde-expanded). A missing file yields the defaults.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let expanded = shellexpand::tilde(path);
        let path = Path::new(expanded.as_ref());
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.endpoint).map_err(|_| ConfigError::Endpoint(self.endpoint.clone()))?;
        Ok(())
    }

    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            min_raw_chars: self.min_raw_chars,
            min_text_chars: self.min_text_chars,
        }
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}
