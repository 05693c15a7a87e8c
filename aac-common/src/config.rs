//! Configuration loading and config file resolution
//!
//! Resolution order for the config file:
//! 1. Command-line argument (highest priority)
//! 2. `AAC_CONFIG` environment variable
//! 3. User config directory (`<config_dir>/aac-board/aac-board.toml`)
//! 4. Compiled defaults (no file)
//!
//! A missing file found through steps 3-4 is not an error: the board starts
//! with defaults and a warning. Endpoints and secrets can be overridden from
//! the environment after the file is read.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const CONFIG_ENV_VAR: &str = "AAC_CONFIG";
const CONFIG_DIR_NAME: &str = "aac-board";
const CONFIG_FILE_NAME: &str = "aac-board.toml";

/// Complete board configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub catalog: CatalogConfig,
    pub cache: CacheConfig,
    /// Remote store; absent means no backend is deployed
    pub remote: Option<RemoteConfig>,
    /// Media host; absent disables uploads
    pub media: Option<MediaConfig>,
    pub policy: PolicyConfig,
    pub sync: SyncConfig,
    pub speech: SpeechConfig,
    pub logging: LoggingConfig,
}

/// Bundled picture catalog location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Directory holding one sub-directory per system category
    pub asset_root: PathBuf,
    /// Prefix prepended to asset paths to form public URLs
    pub url_prefix: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from("public/images"),
            url_prefix: "/images".to_string(),
        }
    }
}

/// Local offline cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub database_path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            database_path: default_data_folder().join("board.db"),
        }
    }
}

/// Remote store connection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Project base URL (REST and auth endpoints hang off it)
    pub base_url: String,
    /// Public (anon) API key sent with every request
    pub api_key: String,
    /// Session access token; absent means anonymous
    pub access_token: Option<String>,
}

/// Media host credentials and image processing limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub api_base: String,
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    /// Upload folder on the media host
    pub folder: String,
    /// Longest allowed side in pixels
    pub max_dimension: u32,
    /// Size above which one lower-quality re-encode is attempted
    pub target_bytes: usize,
    /// Size above which the image is rejected after the re-encode
    pub hard_ceiling_bytes: usize,
    pub quality: u8,
    pub fallback_quality: u8,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.cloudinary.com/v1_1".to_string(),
            cloud_name: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            folder: "aac-board".to_string(),
            max_dimension: 800,
            target_bytes: 300 * 1024,
            hard_ceiling_bytes: 500 * 1024,
            quality: 80,
            fallback_quality: 60,
        }
    }
}

/// Board-wide write policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Whether user cards may be added to system categories
    pub allow_cards_in_system_categories: bool,
    /// Allow mutations without a remote session, backed by the local cache
    pub local_mode: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            allow_cards_in_system_categories: true,
            local_mode: false,
        }
    }
}

/// Media sync sweep schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub enabled: bool,
    pub interval_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 300,
        }
    }
}

/// Speech synthesis settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub language: String,
    pub rate: f32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            language: "pt-PT".to_string(),
            rate: 0.9,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl BoardConfig {
    /// Load configuration from an optional file, then apply env overrides
    ///
    /// An explicitly given path must exist; `None` yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("Read config {} failed: {}", path.display(), e))
                })?;
                let config: BoardConfig = toml::from_str(&content)
                    .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
                info!("Loaded configuration from {}", path.display());
                config
            }
            None => {
                warn!("No configuration file found, using compiled defaults");
                BoardConfig::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Override endpoints and secrets from the environment
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("AAC_REMOTE_URL") {
            self.remote.get_or_insert_with(RemoteConfig::default).base_url = url;
        }
        if let Ok(key) = std::env::var("AAC_REMOTE_KEY") {
            self.remote.get_or_insert_with(RemoteConfig::default).api_key = key;
        }
        if let Ok(token) = std::env::var("AAC_ACCESS_TOKEN") {
            self.remote.get_or_insert_with(RemoteConfig::default).access_token = Some(token);
        }
        if let Ok(cloud) = std::env::var("AAC_MEDIA_CLOUD") {
            self.media.get_or_insert_with(MediaConfig::default).cloud_name = cloud;
        }
        if let Ok(key) = std::env::var("AAC_MEDIA_API_KEY") {
            self.media.get_or_insert_with(MediaConfig::default).api_key = key;
        }
        if let Ok(secret) = std::env::var("AAC_MEDIA_API_SECRET") {
            self.media.get_or_insert_with(MediaConfig::default).api_secret = secret;
        }
    }

    /// Reject configurations the board cannot run with
    pub fn validate(&self) -> Result<()> {
        if let Some(remote) = &self.remote {
            if remote.base_url.trim().is_empty() {
                return Err(Error::Config("remote.base_url must not be empty".to_string()));
            }
        }

        if let Some(media) = &self.media {
            if media.max_dimension == 0 {
                return Err(Error::Config("media.max_dimension must be positive".to_string()));
            }
            if media.target_bytes > media.hard_ceiling_bytes {
                return Err(Error::Config(format!(
                    "media.target_bytes ({}) exceeds media.hard_ceiling_bytes ({})",
                    media.target_bytes, media.hard_ceiling_bytes
                )));
            }
            for (name, quality) in [("quality", media.quality), ("fallback_quality", media.fallback_quality)] {
                if !(1..=100).contains(&quality) {
                    return Err(Error::Config(format!("media.{} must be within 1..=100", name)));
                }
            }
            if media.fallback_quality > media.quality {
                return Err(Error::Config(
                    "media.fallback_quality must not exceed media.quality".to_string(),
                ));
            }
        }

        if self.sync.enabled && self.sync.interval_secs == 0 {
            return Err(Error::Config("sync.interval_secs must be positive".to_string()));
        }

        Ok(())
    }
}

/// Resolve the config file path following the documented priority order
pub fn resolve_config_path(cli_arg: Option<&str>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(PathBuf::from(path));
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: User config directory, only when the file exists
    if let Some(path) = user_config_path() {
        if path.exists() {
            return Some(path);
        }
    }

    // Priority 4: compiled defaults
    None
}

/// Per-user config file location (`<config dir>/aac-board/aac-board.toml`)
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Write configuration back to a TOML file
pub fn write_toml_config(config: &BoardConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;
    std::fs::write(path, content)?;
    Ok(())
}

/// OS-dependent default data folder
pub fn default_data_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(CONFIG_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("./aac_data"))
}
