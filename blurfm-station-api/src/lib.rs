//! Client for the station's now-playing service.
//!
//! One bounded-timeout `GET {base}/nowplaying` per call; the response is a
//! small JSON object whose fields may be null. Until the base URL points at
//! a real deployment the default placeholder fails fast on the short
//! timeout, which the synchronizer turns into the station fallback identity.

use async_trait::async_trait;
use blurfm_core::error::{CoreError, Result};
use blurfm_core::model::NowPlaying;
use blurfm_core::source::MetadataSource;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Title substituted when the service reports none
pub const UNKNOWN_TITLE: &str = "Unknown Track";
/// Artist substituted when the service reports none
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Default per-request timeout (5 seconds)
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const USER_AGENT: &str = "BlurFM/0.1 (https://github.com/blurfm/blurfm-rs)";

/// Response body of the now-playing endpoint.
///
/// Both fields are nullable server-side; missing fields decode the same way.
#[derive(Debug, Deserialize)]
pub struct NowPlayingResponse {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
}

impl NowPlayingResponse {
    /// Convert into a [`NowPlaying`] value, substituting the unknown-track
    /// placeholders for null or blank fields. Artwork is never attached
    /// here; it is resolved separately.
    #[must_use]
    pub fn into_now_playing(self) -> NowPlaying {
        let title = self
            .title
            .filter(|title| !title.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_TITLE.to_string());
        let artist = self
            .artist
            .filter(|artist| !artist.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());
        NowPlaying::new(title, artist)
    }
}

/// HTTP client for the now-playing service.
pub struct StationClient {
    client: reqwest::Client,
    endpoint: Url,
}

impl StationClient {
    /// Create a client with the default 5-second timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client
    /// cannot be created.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Create a client with an explicit per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client
    /// cannot be created.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        // A trailing slash keeps the last path segment when joining
        let base: Url = format!("{}/", base_url.trim_end_matches('/')).parse()?;
        let endpoint = base.join("nowplaying")?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl MetadataSource for StationClient {
    fn name(&self) -> &'static str {
        "station"
    }

    async fn fetch_now_playing(&self) -> Result<NowPlaying> {
        debug!("Fetching now playing from {}", self.endpoint);

        let response = self.client.get(self.endpoint.clone()).send().await?;
        if !response.status().is_success() {
            return Err(CoreError::ServiceStatus {
                service: "now-playing",
                status: response.status().as_u16(),
            });
        }

        let body: NowPlayingResponse = response.json().await?;
        let now_playing = body.into_now_playing();
        debug!(
            "Fetched now playing: {} - {}",
            now_playing.artist, now_playing.title
        );
        Ok(now_playing)
    }
}
