//! Periodic now-playing refresh loop.

use crate::model::NowPlaying;
use crate::source::{ArtworkSource, MetadataSource};
use crate::sync::NowPlayingSync;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Orchestrates the metadata fetcher and artwork resolver into the single
/// published [`NowPlaying`] value.
///
/// One update runs immediately when the loop starts, then every poll
/// interval until the cancellation token fires. On-demand refreshes may run
/// concurrently with the loop; each is an independent network round trip and
/// the last publish wins.
pub struct NowPlayingSynchronizer {
    metadata: Arc<dyn MetadataSource>,
    artwork: Arc<dyn ArtworkSource>,
    sync: Arc<NowPlayingSync>,
    poll_interval: Duration,
    cancel_token: CancellationToken,
}

impl NowPlayingSynchronizer {
    /// Create a new synchronizer
    ///
    /// # Arguments
    /// * `metadata` - now-playing service client
    /// * `artwork` - catalog artwork resolver
    /// * `sync` - holder of the published value
    /// * `poll_interval` - time between periodic updates
    /// * `cancel_token` - optional external cancellation token bound to the
    ///   owning screen's lifetime
    pub fn new(
        metadata: Arc<dyn MetadataSource>,
        artwork: Arc<dyn ArtworkSource>,
        sync: Arc<NowPlayingSync>,
        poll_interval: Duration,
        cancel_token: Option<CancellationToken>,
    ) -> Self {
        Self {
            metadata,
            artwork,
            sync,
            poll_interval,
            cancel_token: cancel_token.unwrap_or_default(),
        }
    }

    /// Get a clone of the cancellation token
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Start the periodic loop in a background task
    #[must_use]
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Run the periodic loop until cancelled.
    ///
    /// The first update fires immediately; cancellation is cooperative at
    /// the sleep boundary.
    pub async fn run(&self) {
        info!(
            "Starting now-playing updates every {:?} via {} / {}",
            self.poll_interval,
            self.metadata.name(),
            self.artwork.name()
        );

        loop {
            self.update_once().await;

            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!("Now-playing updates shutting down");
                    break;
                }
                () = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    /// Run one update out of band, e.g. for a pull-to-refresh gesture.
    ///
    /// Safe to call while the periodic loop is running; there is no lock and
    /// no shared mutable state outside the published value.
    pub async fn refresh(&self) {
        self.update_once().await;
    }

    /// One pass of the update procedure: fetch metadata, resolve artwork
    /// best-effort, submit through the change gate. Failures never escape;
    /// the fetch failing selects the fallback branch and the loop continues
    /// on its next tick regardless.
    async fn update_once(&self) {
        let next = match self.metadata.fetch_now_playing().await {
            Ok(fetched) => {
                let artwork_url = self.resolve_artwork(&fetched.artist, &fetched.title).await;
                NowPlaying {
                    artwork_url,
                    ..fetched
                }
            }
            Err(e) => {
                // Service unreachable or unconfigured: show the station
                // identity instead and still try for a station cover. The
                // lookup reruns every tick on purpose so artwork can appear
                // once the catalog responds.
                warn!("Now-playing fetch failed, using station fallback: {e}");
                let fallback = NowPlaying::station_fallback();
                let artwork_url = self.resolve_artwork(&fallback.artist, &fallback.title).await;
                NowPlaying {
                    artwork_url,
                    ..fallback
                }
            }
        };

        if self.sync.publish(next) {
            let current = self.sync.current();
            info!("Track changed: {} - {}", current.artist, current.title);
        } else {
            debug!("Now-playing unchanged, skipping publish");
        }
    }

    async fn resolve_artwork(&self, artist: &str, title: &str) -> Option<String> {
        match self.artwork.fetch_artwork(artist, title).await {
            Ok(url) => url,
            Err(e) => {
                warn!("Artwork lookup failed, continuing without it: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CoreError, Result};
    use crate::model::{FALLBACK_ARTIST, FALLBACK_TITLE};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedMetadata {
        script: Mutex<VecDeque<Result<NowPlaying>>>,
    }

    impl ScriptedMetadata {
        fn new(script: Vec<Result<NowPlaying>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
            })
        }
    }

    #[async_trait]
    impl MetadataSource for ScriptedMetadata {
        fn name(&self) -> &'static str {
            "scripted-metadata"
        }

        async fn fetch_now_playing(&self) -> Result<NowPlaying> {
            let popped = match self.script.lock() {
                Ok(mut script) => script.pop_front(),
                Err(_) => None,
            };
            popped.unwrap_or_else(|| {
                Err(CoreError::Pipeline {
                    reason: "script exhausted".to_string(),
                })
            })
        }
    }

    struct RecordingArtwork {
        calls: Mutex<Vec<(String, String)>>,
        result: Option<String>,
    }

    impl RecordingArtwork {
        fn new(result: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                result: result.map(str::to_string),
            })
        }

        fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl ArtworkSource for RecordingArtwork {
        fn name(&self) -> &'static str {
            "recording-artwork"
        }

        async fn fetch_artwork(&self, artist: &str, title: &str) -> Result<Option<String>> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push((artist.to_string(), title.to_string()));
            }
            Ok(self.result.clone())
        }
    }

    fn network_error() -> CoreError {
        CoreError::ServiceStatus {
            service: "station",
            status: 503,
        }
    }

    fn synchronizer(
        metadata: Arc<dyn MetadataSource>,
        artwork: Arc<dyn ArtworkSource>,
        sync: Arc<NowPlayingSync>,
    ) -> NowPlayingSynchronizer {
        NowPlayingSynchronizer::new(metadata, artwork, sync, Duration::from_secs(20), None)
    }

    #[tokio::test]
    async fn test_fetch_failure_publishes_station_fallback() {
        let metadata = ScriptedMetadata::new(vec![Err(network_error())]);
        let artwork = RecordingArtwork::new(None);
        let sync = NowPlayingSync::new();
        let synchronizer = synchronizer(metadata, artwork.clone(), sync.clone());

        synchronizer.refresh().await;

        let current = sync.current();
        assert_eq!(current.title, FALLBACK_TITLE);
        assert_eq!(current.artist, FALLBACK_ARTIST);
        assert!(current.artwork_url.is_none());
        // Fallback artwork was attempted with the fallback identity
        assert_eq!(
            artwork.calls(),
            vec![(FALLBACK_ARTIST.to_string(), FALLBACK_TITLE.to_string())]
        );
    }

    #[tokio::test]
    async fn test_successful_fetch_attaches_artwork() {
        let metadata =
            ScriptedMetadata::new(vec![Ok(NowPlaying::new("Beetlebum", "Blur"))]);
        let artwork = RecordingArtwork::new(Some("https://example.com/600x600bb.jpg"));
        let sync = NowPlayingSync::new();
        let synchronizer = synchronizer(metadata, artwork.clone(), sync.clone());

        synchronizer.refresh().await;

        let current = sync.current();
        assert_eq!(current.title, "Beetlebum");
        assert_eq!(current.artist, "Blur");
        assert_eq!(
            current.artwork_url.as_deref(),
            Some("https://example.com/600x600bb.jpg")
        );
        assert_eq!(
            artwork.calls(),
            vec![("Blur".to_string(), "Beetlebum".to_string())]
        );
    }

    #[tokio::test]
    async fn test_unchanged_track_does_not_notify() {
        let track = NowPlaying::new("Song 2", "Blur");
        let metadata = ScriptedMetadata::new(vec![Ok(track.clone()), Ok(track)]);
        let artwork = RecordingArtwork::new(Some("https://example.com/a.jpg"));
        let sync = NowPlayingSync::new();
        let synchronizer = synchronizer(metadata, artwork, sync.clone());

        synchronizer.refresh().await;

        let mut rx = sync.subscribe();
        rx.mark_unchanged();

        synchronizer.refresh().await;
        assert!(rx.has_changed().is_ok_and(|changed| !changed));
    }

    #[tokio::test]
    async fn test_artwork_failure_still_publishes_track() {
        struct FailingArtwork;

        #[async_trait]
        impl ArtworkSource for FailingArtwork {
            fn name(&self) -> &'static str {
                "failing-artwork"
            }

            async fn fetch_artwork(&self, _artist: &str, _title: &str) -> Result<Option<String>> {
                Err(network_error())
            }
        }

        let metadata = ScriptedMetadata::new(vec![Ok(NowPlaying::new("Tender", "Blur"))]);
        let sync = NowPlayingSync::new();
        let synchronizer = synchronizer(metadata, Arc::new(FailingArtwork), sync.clone());

        synchronizer.refresh().await;

        let current = sync.current();
        assert_eq!(current.title, "Tender");
        assert!(current.artwork_url.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_loop_updates_on_interval_until_cancelled() {
        let metadata = ScriptedMetadata::new(vec![
            Ok(NowPlaying::new("Song A", "Blur")),
            Ok(NowPlaying::new("Song B", "Blur")),
        ]);
        let artwork = RecordingArtwork::new(None);
        let sync = NowPlayingSync::new();
        let cancel_token = CancellationToken::new();
        let synchronizer = Arc::new(NowPlayingSynchronizer::new(
            metadata,
            artwork,
            sync.clone(),
            Duration::from_secs(20),
            Some(cancel_token.clone()),
        ));

        let handle = synchronizer.start();
        tokio::task::yield_now().await;
        assert_eq!(sync.current().title, "Song A");

        tokio::time::sleep(Duration::from_secs(21)).await;
        assert_eq!(sync.current().title, "Song B");

        cancel_token.cancel();
        assert!(handle.await.is_ok());
    }
}
