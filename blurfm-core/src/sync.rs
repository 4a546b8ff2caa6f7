//! Published now-playing state with change de-duplication.

use crate::model::NowPlaying;
use std::sync::Arc;
use tokio::sync::watch;

/// Holder of the single published [`NowPlaying`] value.
///
/// Subscribers get current-value-plus-subscription semantics through a
/// [`watch`] channel: a new receiver immediately observes the held value and
/// is notified only when a meaningful change is published. A candidate value
/// replaces the held one iff the track identity (title, artist) differs, or
/// the artwork alone differs; identical candidates are dropped without
/// notifying anyone.
pub struct NowPlayingSync {
    tx: watch::Sender<NowPlaying>,
}

impl NowPlayingSync {
    /// Create a new holder seeded with the default identity
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            tx: watch::channel(NowPlaying::default()).0,
        })
    }

    /// Subscribe to published values
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<NowPlaying> {
        self.tx.subscribe()
    }

    /// Snapshot of the currently held value
    #[must_use]
    pub fn current(&self) -> NowPlaying {
        self.tx.borrow().clone()
    }

    /// Publish a candidate value through the change gate.
    ///
    /// Returns `true` if the candidate replaced the held value and
    /// subscribers were notified.
    pub fn publish(&self, next: NowPlaying) -> bool {
        self.tx.send_if_modified(move |current| {
            if current.track_changed(&next) || current.artwork_changed(&next) {
                *current = next;
                true
            } else {
                false
            }
        })
    }
}
