use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::downloader::DownloadSettings;
use crate::errors::{AppError, Result};

/// Prefix for environment overrides, e.g. `YTQ_QUEUE__TICK_INTERVAL_MS=100`.
pub const ENV_PREFIX: &str = "YTQ";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub download_path: PathBuf,
    pub browser: String,
    pub subtitle_langs: Vec<String>,
    pub merge_format: String,
    pub queue: QueueConfig,
    pub metadata: MetadataConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct QueueConfig {
    pub tick_interval_ms: u64,
    pub min_increment: f64,
    pub max_increment: f64,
    /// Fixed seed for the progress simulator; random when unset.
    pub seed: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct MetadataConfig {
    pub latency_ms: u64,
    pub timeout_secs: u64,
    pub playlist_size: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            download_path: dirs::download_dir()
                .map(|dir| dir.join("YouTube Downloader"))
                .unwrap_or_else(|| PathBuf::from("./downloads")),
            browser: "chrome".to_string(),
            subtitle_langs: vec!["en".to_string()],
            merge_format: "mp4".to_string(),
            queue: QueueConfig::default(),
            metadata: MetadataConfig::default(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 500,
            min_increment: 1.0,
            max_increment: 6.0,
            seed: None,
        }
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            latency_ms: 1500,
            timeout_secs: 30,
            playlist_size: 6,
        }
    }
}

impl AppConfig {
    /// Loads the config from the default location plus environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::get_config_path()?;
        Self::load_from(Some(&path))
    }

    /// Layers defaults, the optional JSON file at `path` and `YTQ_*` variables.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let defaults = config::Config::try_from(&AppConfig::default())?;
        let mut builder = config::Config::builder().add_source(defaults);

        if let Some(path) = path {
            if path.exists() {
                log::info!("[CONFIG] Reading {:?}", path);
            }
            builder = builder.add_source(
                config::File::from(path.to_path_buf())
                    .format(config::FileFormat::Json)
                    .required(false),
            );
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("subtitle_langs")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(config_dir) = config_path.parent() {
            if !config_dir.exists() {
                std::fs::create_dir_all(config_dir)?;
            }
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        log::info!("[CONFIG] Saved {:?}", config_path);
        Ok(())
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| AppError::Config(config::ConfigError::Message("Could not find config directory".to_string())))?;

        Ok(config_dir.join("yt-queue").join("config.json"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.queue.tick_interval_ms == 0 {
            return Err(AppError::Validation("queue.tick_interval_ms must be positive".to_string()));
        }
        if !(self.queue.min_increment > 0.0) {
            return Err(AppError::Validation("queue.min_increment must be positive".to_string()));
        }
        if self.queue.max_increment < self.queue.min_increment {
            return Err(AppError::Validation(format!(
                "queue.max_increment ({}) is below queue.min_increment ({})",
                self.queue.max_increment, self.queue.min_increment
            )));
        }
        if self.metadata.playlist_size == 0 {
            return Err(AppError::Validation("metadata.playlist_size must be at least 1".to_string()));
        }
        if self.metadata.timeout_secs == 0 {
            return Err(AppError::Validation("metadata.timeout_secs must be positive".to_string()));
        }
        Ok(())
    }
}

impl From<&AppConfig> for DownloadSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            download_dir: config.download_path.to_string_lossy().to_string(),
            cookies_loaded: false,
            browser: config.browser.clone(),
            subtitle_langs: config.subtitle_langs.clone(),
            merge_format: config.merge_format.clone(),
        }
    }
}
