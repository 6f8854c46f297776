use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::constants;
use crate::error::{PipelineError, Result};

pub const CONFIG_PATH_ENV: &str = "IT_ASSETS_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const CLOUD_URL_ENV: &str = "CLOUD_URL";
pub const API_KEY_ENV: &str = "API_KEY";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub search: SearchConfig,
    pub collections: CollectionsConfig,
    pub cleaner: CleanerConfig,
    pub loader: LoaderConfig,
    pub transformer: TransformerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub url: Option<String>,
    /// Only ever taken from the environment
    #[serde(skip)]
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
    pub scroll_keep_alive: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectionsConfig {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CleanerConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub key_column: String,
    pub date_column: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub batch_size: usize,
    pub drop_empty_rows: bool,
    pub recreate_index: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransformerConfig {
    pub batch_size: usize,
    pub hostname_field: String,
    pub provider_field: String,
    pub status_field: String,
    /// Checked in order; the first one present on a document wins
    pub date_fields: Vec<String>,
    pub invalid_providers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: PathBuf,
    pub file_prefix: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            timeout_seconds: constants::DEFAULT_TIMEOUT_SECONDS,
            scroll_keep_alive: constants::DEFAULT_SCROLL_KEEP_ALIVE.to_string(),
        }
    }
}

impl Default for CollectionsConfig {
    fn default() -> Self {
        Self {
            source: constants::SOURCE_INDEX.to_string(),
            target: constants::TARGET_INDEX.to_string(),
        }
    }
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("it_asset_inventory.csv"),
            output: PathBuf::from("it_asset_inventory_cleaned.csv"),
            key_column: constants::HOSTNAME_FIELD.to_string(),
            date_column: constants::OS_INSTALLATION_DATE_FIELD.to_string(),
        }
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: constants::DEFAULT_BATCH_SIZE,
            drop_empty_rows: true,
            recreate_index: false,
        }
    }
}

impl Default for TransformerConfig {
    fn default() -> Self {
        Self {
            batch_size: constants::DEFAULT_BATCH_SIZE,
            hostname_field: constants::HOSTNAME_FIELD.to_string(),
            provider_field: constants::PROVIDER_FIELD.to_string(),
            status_field: constants::LIFECYCLE_STATUS_FIELD.to_string(),
            date_fields: vec![
                constants::INSTALLATION_DATE_FIELD.to_string(),
                constants::OS_INSTALLATION_DATE_FIELD.to_string(),
            ],
            invalid_providers: constants::INVALID_PROVIDERS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
            file_prefix: "it_assets.log".to_string(),
        }
    }
}

impl Config {
    /// Load `config.toml` (or `$IT_ASSETS_CONFIG`), then apply credentials from the environment.
    pub fn load() -> Result<Self> {
        let config_path = env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::from_file(Path::new(&config_path))?;
        config.apply_env(|key| env::var(key).ok());
        Ok(config)
    }

    /// A missing file yields the defaults; an unreadable or malformed one is an error.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No config file at '{}', using defaults", path.display());
            return Ok(Self::default());
        }
        let config_content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&config_content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(CLOUD_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.search.url = Some(url.trim().to_string());
        }
        if let Some(key) = lookup(API_KEY_ENV).filter(|v| !v.trim().is_empty()) {
            self.search.api_key = Some(key.trim().to_string());
        }
    }

    fn validate(&self) -> Result<()> {
        if self.loader.batch_size == 0 || self.transformer.batch_size == 0 {
            return Err(PipelineError::Config("batch_size must be greater than zero".to_string()));
        }
        if self.transformer.date_fields.is_empty() {
            return Err(PipelineError::Config(
                "transformer.date_fields must name at least one field".to_string(),
            ));
        }
        Ok(())
    }
}

impl SearchConfig {
    pub fn url(&self) -> Result<&str> {
        self.url
            .as_deref()
            .ok_or_else(|| PipelineError::Config(format!("{CLOUD_URL_ENV} is not set")))
    }
}
