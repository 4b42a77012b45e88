use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_feeds_path")]
    pub feeds_path: String,

    #[serde(default = "default_archive_dir")]
    pub archive_dir: String,

    /// Cached article content is reused without re-scraping for this long.
    #[serde(default = "default_cache_duration_hours")]
    pub cache_duration_hours: u32,

    /// Articles older than this are eligible for migration to cold storage.
    #[serde(default = "default_archive_threshold_days")]
    pub archive_threshold_days: u32,
}

fn data_dir() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("feedvault");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir
}

fn default_db_path() -> String {
    data_dir().join("articles.db").to_string_lossy().to_string()
}

fn default_feeds_path() -> String {
    data_dir().join("feeds.txt").to_string_lossy().to_string()
}

fn default_archive_dir() -> String {
    data_dir().join("archive").to_string_lossy().to_string()
}

fn default_cache_duration_hours() -> u32 {
    24
}

fn default_archive_threshold_days() -> u32 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            feeds_path: default_feeds_path(),
            archive_dir: default_archive_dir(),
            cache_duration_hours: default_cache_duration_hours(),
            archive_threshold_days: default_archive_threshold_days(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("feedvault")
            .join("config.toml")
    }
}
