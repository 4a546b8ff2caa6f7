//! Now-playing track metadata.

/// Title substituted when the station service is unreachable or unconfigured.
pub const FALLBACK_TITLE: &str = "Blur FM Radio";
/// Artist substituted when the station service is unreachable or unconfigured.
pub const FALLBACK_ARTIST: &str = "Blur FM";

/// Metadata describing the track currently airing on the live stream.
///
/// A `NowPlaying` value is immutable; a refresh produces a new value that
/// atomically replaces the previous one. The pair (title, artist) is the
/// track identity; the artwork URL is compared separately so an artwork-only
/// update still reaches subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlaying {
    /// Title of the currently playing track
    pub title: String,
    /// Artist of the currently playing track
    pub artist: String,
    /// URL of the album artwork, if one was resolved
    pub artwork_url: Option<String>,
}

impl Default for NowPlaying {
    fn default() -> Self {
        Self {
            title: "Blur FM".to_string(),
            artist: "Loading...".to_string(),
            artwork_url: None,
        }
    }
}

impl NowPlaying {
    /// Create a new now-playing value without artwork
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            artwork_url: None,
        }
    }

    /// Attach an artwork URL
    #[must_use]
    pub fn with_artwork(mut self, url: impl Into<String>) -> Self {
        self.artwork_url = Some(url.into());
        self
    }

    /// The constant station identity used when the now-playing service
    /// cannot be reached.
    #[must_use]
    pub fn station_fallback() -> Self {
        Self::new(FALLBACK_TITLE, FALLBACK_ARTIST)
    }

    /// Check whether the track identity (title, artist) differs
    #[must_use]
    pub fn track_changed(&self, other: &Self) -> bool {
        self.title != other.title || self.artist != other.artist
    }

    /// Check whether only the artwork URL differs
    #[must_use]
    pub fn artwork_changed(&self, other: &Self) -> bool {
        self.artwork_url != other.artwork_url
    }
}
