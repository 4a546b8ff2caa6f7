//! Dependency seams for the metadata and artwork services.
//!
//! The synchronizer is constructed against these traits rather than concrete
//! HTTP clients, so tests (and alternative deployments) can substitute
//! fakes.

use crate::error::Result;
use crate::model::NowPlaying;
use async_trait::async_trait;

/// A service that reports the track currently airing on the stream.
///
/// Implementations issue one bounded-timeout request per call and never
/// attach artwork; artwork resolution is a separate concern. Transport and
/// decode failures propagate as errors - the synchronizer converts them into
/// the station fallback, so no failure escapes past it.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Returns a human-readable name for this source.
    fn name(&self) -> &'static str;

    /// Fetch the currently airing track.
    ///
    /// # Errors
    ///
    /// Returns an error on timeout, unreachable host, refused connection, a
    /// non-success status, or a malformed response body.
    async fn fetch_now_playing(&self) -> Result<NowPlaying>;
}

/// A catalog service that resolves album artwork for a track identity.
#[async_trait]
pub trait ArtworkSource: Send + Sync {
    /// Returns a human-readable name for this source.
    fn name(&self) -> &'static str;

    /// Look up an artwork URL for the given artist and title.
    ///
    /// `Ok(None)` means the full retry schedule ran without a hit.
    ///
    /// # Errors
    ///
    /// Returns an error only for failures outside the retry schedule;
    /// per-attempt network failures are absorbed into `Ok(None)`.
    async fn fetch_artwork(&self, artist: &str, title: &str) -> Result<Option<String>>;
}
