//! # Buho Configuration
//!
//! Feed endpoints, retry policy and the local database location.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     BUHO_FEED_URL=https://backoffice.example.com/api/                  │
//! │     BUHO_PLATFORM=native                                               │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/buho-orders/buho.toml (Linux)                            │
//! │     ~/Library/Application Support/com.buho.orders/buho.toml (macOS)    │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     page_size 500, 120 s / 30 s timeouts, 3 retries every 2 s          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # buho.toml
//! [feed]
//! base_url = "https://backoffice.example.com/api/"
//! page_size = 500
//! timeout_secs = 120
//! page_timeout_secs = 30
//! max_retries = 3
//! retry_delay_ms = 2000
//!
//! [database]
//! path = "/var/lib/buho/buho.db"
//! platform = "embedded"  # native | embedded (detected when absent)
//! ```

use buho_store::{DbConfig, Platform, StoreConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Feed Settings
// =============================================================================

/// Remote feed endpoint and retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSettings {
    /// Root of the back-office API, e.g. `https://host/api/`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Records per page for paginated imports.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Timeout for single-shot fetches.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Timeout for each page of a paginated import.
    #[serde(default = "default_page_timeout")]
    pub page_timeout_secs: u64,

    /// Extra attempts after the first failed one.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay; attempt `n` waits `n * retry_delay_ms`.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

fn default_base_url() -> String {
    "http://localhost:8080/".to_string()
}
fn default_page_size() -> usize {
    500
}
fn default_timeout() -> u64 {
    120
}
fn default_page_timeout() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_delay() -> u64 {
    2000
}

impl Default for FeedSettings {
    fn default() -> Self {
        FeedSettings {
            base_url: default_base_url(),
            page_size: default_page_size(),
            timeout_secs: default_timeout(),
            page_timeout_secs: default_page_timeout(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay(),
        }
    }
}

impl FeedSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Database file. Defaults to the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Forces an engine instead of detecting it from the build target.
    #[serde(default)]
    pub platform: Option<Platform>,
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete configuration for feeds and local storage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuhoConfig {
    #[serde(default)]
    pub feed: FeedSettings,

    #[serde(default)]
    pub database: DatabaseSettings,
}

impl BuhoConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (buho.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        let url = url::Url::parse(&self.feed.base_url)?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(SyncError::InvalidUrl(format!(
                "Feed URL must start with http:// or https://, got: {}",
                self.feed.base_url
            )));
        }

        if self.feed.page_size == 0 {
            return Err(SyncError::InvalidConfig(
                "page_size must be greater than 0".into(),
            ));
        }

        if self.feed.timeout_secs == 0 || self.feed.page_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "timeouts must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies `BUHO_*` overrides read through `lookup`.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("BUHO_FEED_URL") {
            debug!(url = %url, "Overriding feed URL from environment");
            self.feed.base_url = url;
        }

        if let Some(size) = lookup("BUHO_PAGE_SIZE") {
            match size.parse::<usize>() {
                Ok(size) => self.feed.page_size = size,
                Err(_) => warn!(value = %size, "Ignoring non-numeric BUHO_PAGE_SIZE"),
            }
        }

        if let Some(retries) = lookup("BUHO_MAX_RETRIES") {
            if let Ok(retries) = retries.parse::<u32>() {
                self.feed.max_retries = retries;
            }
        }

        if let Some(path) = lookup("BUHO_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = Some(PathBuf::from(path));
        }

        if let Some(platform) = lookup("BUHO_PLATFORM") {
            match platform.to_lowercase().as_str() {
                "native" => self.database.platform = Some(Platform::Native),
                "embedded" => self.database.platform = Some(Platform::Embedded),
                _ => warn!(platform = %platform, "Unknown platform in environment"),
            }
        }
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("com", "buho", "orders")
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("buho.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Database file, falling back to the platform data directory.
    pub fn database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .or_else(|| Self::project_dirs().map(|dirs| dirs.data_dir().join("buho.db")))
            .unwrap_or_else(|| PathBuf::from("buho.db"))
    }

    /// Storage configuration for `OrderStorageFacade::open`.
    pub fn store_config(&self) -> StoreConfig {
        let config = StoreConfig::new(DbConfig::new(self.database_path()));
        match self.database.platform {
            Some(platform) => config.with_platform(platform),
            None => config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = BuhoConfig::default();
        assert_eq!(config.feed.page_size, 500);
        assert_eq!(config.feed.timeout(), Duration::from_secs(120));
        assert_eq!(config.feed.page_timeout(), Duration::from_secs(30));
        assert_eq!(config.feed.max_retries, 3);
        assert_eq!(config.feed.retry_delay(), Duration::from_secs(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = BuhoConfig::default();

        config.feed.base_url = "ws://localhost:8080".to_string();
        assert!(matches!(config.validate(), Err(SyncError::InvalidUrl(_))));

        config.feed.base_url = "not a url".to_string();
        assert!(config.validate().unwrap_err().is_config_error());

        config.feed.base_url = "https://backoffice.example.com/api/".to_string();
        config.feed.page_size = 0;
        assert!(matches!(config.validate(), Err(SyncError::InvalidConfig(_))));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("BUHO_FEED_URL", "https://remote.example.com/"),
            ("BUHO_PAGE_SIZE", "250"),
            ("BUHO_MAX_RETRIES", "oops"),
            ("BUHO_DB_PATH", "/tmp/buho-test.db"),
            ("BUHO_PLATFORM", "Native"),
        ]
        .into_iter()
        .collect();

        let mut config = BuhoConfig::default();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.feed.base_url, "https://remote.example.com/");
        assert_eq!(config.feed.page_size, 250);
        assert_eq!(config.feed.max_retries, 3);
        assert_eq!(config.database_path(), PathBuf::from("/tmp/buho-test.db"));
        assert_eq!(config.store_config().platform(), Platform::Native);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("buho.toml");

        let mut config = BuhoConfig::default();
        config.feed.base_url = "https://backoffice.example.com/api/".to_string();
        config.feed.page_size = 100;
        config.database.platform = Some(Platform::Embedded);
        config.save(Some(path.clone())).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[feed]"));
        assert!(contents.contains("platform = \"embedded\""));

        let loaded: BuhoConfig = toml::from_str(&contents).unwrap();
        assert_eq!(loaded.feed.page_size, 100);
        assert_eq!(loaded.database.platform, Some(Platform::Embedded));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: BuhoConfig = toml::from_str("[feed]\npage_size = 50\n").unwrap();
        assert_eq!(config.feed.page_size, 50);
        assert_eq!(config.feed.max_retries, 3);
        assert!(config.database.path.is_none());
    }
}
