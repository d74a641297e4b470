use anyhow::{Context, Result};
use log::{LevelFilter, warn};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::credentials::{CredentialProvider, FileCredentials, StaticCredentials};
use crate::errors::AppError;
use crate::upload::{ProgressSimulation, SessionOptions};

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Base URL of the document API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Use the in-process demo uploader instead of the API
    #[serde(default = "default_true")]
    pub demo_mode: bool,

    /// Upload behaviour
    #[serde(default)]
    pub upload: UploadConfig,

    /// Where the bearer token comes from
    #[serde(default)]
    pub auth: AuthConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Upload pipeline settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UploadConfig {
    /// Milliseconds between simulated progress increments
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,

    /// Largest random progress increment, in percent
    #[serde(default = "default_max_progress_step")]
    pub max_progress_step: f64,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Simulated latency of the demo uploader
    #[serde(default = "default_demo_delay_ms")]
    pub demo_delay_ms: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            progress_interval_ms: default_progress_interval_ms(),
            max_progress_step: default_max_progress_step(),
            timeout_secs: default_timeout_secs(),
            demo_delay_ms: default_demo_delay_ms(),
        }
    }
}

/// Credential settings
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct AuthConfig {
    // @field: Token used as-is when non-empty
    #[serde(default = "String::new")]
    pub token: String,

    // @field: Token file, defaults to <config dir>/instimem/token
    #[serde(default)]
    pub token_file: Option<PathBuf>,
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(&self) -> LevelFilter {
        match self {
            Self::Error => LevelFilter::Error,
            Self::Warn => LevelFilter::Warn,
            Self::Info => LevelFilter::Info,
            Self::Debug => LevelFilter::Debug,
            Self::Trace => LevelFilter::Trace,
        }
    }
}

fn default_api_url() -> String {
    "http://localhost:8000/api/v1".to_string()
}

fn default_true() -> bool {
    true
}

fn default_progress_interval_ms() -> u64 {
    300
}

fn default_max_progress_step() -> f64 {
    30.0
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_demo_delay_ms() -> u64 {
    1200
}

impl Config {
    /// Load the configuration file, or write a default one if it is missing
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let file = File::open(path).context(format!("Failed to open config file: {:?}", path))?;
            let reader = BufReader::new(file);
            let config: Config = serde_json::from_reader(reader)
                .context(format!("Failed to parse config file: {:?}", path))?;
            return Ok(config);
        }

        warn!("Config file not found at {:?}, creating default config.", path);
        let config = Config::default();
        let config_json = serde_json::to_string_pretty(&config)
            .context("Failed to serialize default config to JSON")?;
        std::fs::write(path, config_json)
            .context(format!("Failed to write default config to file: {:?}", path))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<(), AppError> {
        let url = Url::parse(&self.api_url)
            .map_err(|e| AppError::Config(format!("Invalid api_url '{}': {}", self.api_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AppError::Config(format!(
                "api_url must use http or https, got '{}'",
                url.scheme()
            )));
        }

        if self.upload.progress_interval_ms == 0 {
            return Err(AppError::Config("progress_interval_ms must be positive".to_string()));
        }
        if !(self.upload.max_progress_step > 0.0 && self.upload.max_progress_step.is_finite()) {
            return Err(AppError::Config("max_progress_step must be a positive number".to_string()));
        }
        if self.upload.timeout_secs == 0 {
            return Err(AppError::Config("timeout_secs must be positive".to_string()));
        }

        Ok(())
    }

    /// Session tuning derived from the upload settings
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            progress: ProgressSimulation {
                interval: Duration::from_millis(self.upload.progress_interval_ms),
                max_step: self.upload.max_progress_step,
            },
            ..SessionOptions::default()
        }
    }

    /// Credential provider for the REST uploader.
    ///
    /// An explicit token wins; otherwise the token file is consulted.
    pub fn credentials(&self) -> Arc<dyn CredentialProvider> {
        if !self.auth.token.trim().is_empty() {
            return Arc::new(StaticCredentials::new(self.auth.token.clone()));
        }
        match self.token_file() {
            Some(path) => Arc::new(FileCredentials::new(path)),
            None => Arc::new(StaticCredentials::anonymous()),
        }
    }

    /// Configured token file, or the platform default
    pub fn token_file(&self) -> Option<PathBuf> {
        self.auth.token_file.clone().or_else(FileCredentials::default_path)
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            api_url: default_api_url(),
            demo_mode: true,
            upload: UploadConfig::default(),
            auth: AuthConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}
