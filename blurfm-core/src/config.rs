use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlurfmConfig {
    #[serde(default)]
    pub stream: StreamEndpoint,
    #[serde(default)]
    pub station: StationConfig,
    #[serde(default)]
    pub nowplaying: NowPlayingConfig,
    #[serde(default)]
    pub artwork: ArtworkConfig,
}

/// The live stream endpoint consumed by the playback pipeline.
///
/// Set once at startup and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEndpoint {
    /// Live stream URL
    #[serde(default = "default_stream_url")]
    pub url: String,
    /// Connection timeout in milliseconds
    #[serde(default = "default_stream_connect_timeout")]
    pub connect_timeout_ms: u64,
    /// Buffer duration for playback in milliseconds
    #[serde(default = "default_stream_buffer")]
    pub buffer_ms: u64,
}

fn default_stream_url() -> String {
    "https://live.radiovague.com:8443/blurfm01".to_string()
}

const fn default_stream_connect_timeout() -> u64 {
    10_000
}

const fn default_stream_buffer() -> u64 {
    5000
}

impl Default for StreamEndpoint {
    fn default() -> Self {
        Self {
            url: default_stream_url(),
            connect_timeout_ms: default_stream_connect_timeout(),
            buffer_ms: default_stream_buffer(),
        }
    }
}

impl StreamEndpoint {
    /// Connection timeout as a [`Duration`]
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Buffer duration as a [`Duration`]
    #[must_use]
    pub const fn buffer_duration(&self) -> Duration {
        Duration::from_millis(self.buffer_ms)
    }
}

/// Now-playing service configuration.
///
/// The default base URL is a placeholder; until it points at a real
/// deployment, fetches fail fast on the short timeout and the synchronizer
/// falls back to the station identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConfig {
    /// Base URL of the now-playing service
    #[serde(default = "default_station_base_url")]
    pub base_url: String,
    /// Per-request timeout in milliseconds
    #[serde(default = "default_api_timeout")]
    pub request_timeout_ms: u64,
}

fn default_station_base_url() -> String {
    "https://api.blurfm.com".to_string()
}

const fn default_api_timeout() -> u64 {
    5000
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            base_url: default_station_base_url(),
            request_timeout_ms: default_api_timeout(),
        }
    }
}

impl StationConfig {
    /// Request timeout as a [`Duration`]
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Now-playing refresh configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NowPlayingConfig {
    /// Refresh interval in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Whether periodic refreshes run at all
    #[serde(default = "default_true")]
    pub enabled: bool,
}

const fn default_poll_interval() -> u64 {
    20_000
}

const fn default_true() -> bool {
    true
}

impl Default for NowPlayingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            enabled: default_true(),
        }
    }
}

impl NowPlayingConfig {
    /// Poll interval as a [`Duration`]
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Artwork lookup configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtworkConfig {
    /// Per-search timeout in milliseconds
    #[serde(default = "default_api_timeout")]
    pub search_timeout_ms: u64,
    /// Number of search rounds before giving up
    #[serde(default = "default_artwork_attempts")]
    pub max_attempts: u32,
    /// Base wait between rounds; doubles after each round
    #[serde(default = "default_artwork_backoff")]
    pub backoff_base_ms: u64,
}

const fn default_artwork_attempts() -> u32 {
    3
}

const fn default_artwork_backoff() -> u64 {
    200
}

impl Default for ArtworkConfig {
    fn default() -> Self {
        Self {
            search_timeout_ms: default_api_timeout(),
            max_attempts: default_artwork_attempts(),
            backoff_base_ms: default_artwork_backoff(),
        }
    }
}

impl ArtworkConfig {
    /// Search timeout as a [`Duration`]
    #[must_use]
    pub const fn search_timeout(&self) -> Duration {
        Duration::from_millis(self.search_timeout_ms)
    }

    /// Backoff base as a [`Duration`]
    #[must_use]
    pub const fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

impl BlurfmConfig {
    /// Get the configuration directory path
    #[must_use]
    pub fn config_dir() -> PathBuf {
        crate::paths::config_dir()
    }

    /// Get the config file path
    #[must_use]
    pub fn config_path() -> PathBuf {
        crate::paths::config_path()
    }

    /// Load config from the default location or create a template on first run
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigNotFound`] after writing a fresh template,
    /// or an error if the file cannot be read or parsed.
    pub fn load_or_create() -> Result<Self> {
        Self::load_or_create_at(&Self::config_path())
    }

    /// Load config from an explicit path or create a template there
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigNotFound`] after writing a fresh template,
    /// or an error if the file cannot be read or parsed.
    pub fn load_or_create_at(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            if let Some(parent) = config_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(config_path, CONFIG_TEMPLATE)?;
            return Err(CoreError::ConfigNotFound {
                path: config_path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(config_path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate required fields
    ///
    /// # Errors
    ///
    /// Returns an error if a required field is missing or out of range.
    pub fn validate(&self) -> Result<()> {
        if self.stream.url.trim().is_empty() {
            return Err(CoreError::ConfigMissingField {
                field: "stream.url".to_string(),
            });
        }
        if self.station.base_url.trim().is_empty() {
            return Err(CoreError::ConfigMissingField {
                field: "station.base_url".to_string(),
            });
        }
        if self.artwork.max_attempts == 0 {
            return Err(CoreError::ConfigMissingField {
                field: "artwork.max_attempts".to_string(),
            });
        }
        Ok(())
    }
}

const CONFIG_TEMPLATE: &str = r#"# Blur FM Configuration
# ~/.config/blurfm/config.toml

[stream]
# Live stream endpoint, consumed as an opaque audio source
url = "https://live.radiovague.com:8443/blurfm01"
connect_timeout_ms = 10000
buffer_ms = 5000

[station]
# Base URL of the now-playing service ({base}/nowplaying is queried).
# The default is a placeholder; until it is configured, fetches fail fast
# and the player shows the station fallback identity.
base_url = "https://api.blurfm.com"
request_timeout_ms = 5000

[nowplaying]
# How often to refresh track metadata
poll_interval_ms = 20000
enabled = true

[artwork]
# iTunes search settings for album artwork
search_timeout_ms = 5000
max_attempts = 3
backoff_base_ms = 200
"#;
