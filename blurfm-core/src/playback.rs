//! Playback controller for the live stream.
//!
//! The actual streaming engine is an external collaborator behind the
//! [`StreamPipeline`] seam; this module owns the lifecycle around it:
//! rebuild-on-error, the fade-in ramp, stop/pause semantics for a live
//! source, and the two observable flags.

use crate::config::StreamEndpoint;
use crate::error::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Duration of the fade-in ramp when playback starts
pub const FADE_IN_DURATION: Duration = Duration::from_millis(800);

/// Volume steps per ramp; small enough that each step is audible-smooth
const FADE_STEPS: u16 = 16;

/// Lifecycle callbacks emitted by a streaming pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// The pipeline finished buffering and is ready to play
    Ready,
    /// The stream ended
    Ended,
    /// Playback started or stopped
    PlayingChanged(bool),
    /// The pipeline failed
    Error(String),
}

/// A prepared streaming pipeline for one connection to the live edge.
///
/// Implementations report their lifecycle through the event sender handed to
/// [`PipelineFactory::build`] and must stop emitting once released.
pub trait StreamPipeline: Send + Sync {
    /// Set the output volume, `0.0..=1.0`
    fn set_volume(&self, volume: f32);

    /// Request playback to begin as soon as the pipeline is ready
    fn request_play(&self);

    /// Halt playback but keep the pipeline allocated for a cheap restart
    fn halt(&self);

    /// Tear down the pipeline and free the underlying audio resources
    fn release(&self);
}

/// Builds pipelines connected to the live edge of a stream endpoint.
pub trait PipelineFactory: Send + Sync {
    /// Build a fresh pipeline for `endpoint`, reporting lifecycle events
    /// through `events`.
    ///
    /// # Errors
    ///
    /// Returns an error if the pipeline cannot be constructed.
    fn build(
        &self,
        endpoint: &StreamEndpoint,
        events: mpsc::UnboundedSender<PipelineEvent>,
    ) -> Result<Box<dyn StreamPipeline>>;
}

struct ControllerInner {
    pipeline: Option<Arc<dyn StreamPipeline>>,
    ramp_token: Option<CancellationToken>,
    event_task: Option<JoinHandle<()>>,
}

/// Controller wrapping the streaming pipeline for one player screen.
///
/// Exposes play/pause/toggle/retry/release plus the `is_playing` and
/// `has_error` observables. The flags are updated only from pipeline events
/// and the explicit operations; nothing else may set them.
pub struct PlayerController {
    endpoint: StreamEndpoint,
    factory: Box<dyn PipelineFactory>,
    fade_in: Duration,
    inner: Mutex<ControllerInner>,
    is_playing_tx: watch::Sender<bool>,
    has_error_tx: watch::Sender<bool>,
}

impl PlayerController {
    /// Create a controller for `endpoint` with the default fade-in
    #[must_use]
    pub fn new(endpoint: StreamEndpoint, factory: Box<dyn PipelineFactory>) -> Self {
        Self::with_fade_in(endpoint, factory, FADE_IN_DURATION)
    }

    /// Create a controller with an explicit fade-in duration
    #[must_use]
    pub fn with_fade_in(
        endpoint: StreamEndpoint,
        factory: Box<dyn PipelineFactory>,
        fade_in: Duration,
    ) -> Self {
        Self {
            endpoint,
            factory,
            fade_in,
            inner: Mutex::new(ControllerInner {
                pipeline: None,
                ramp_token: None,
                event_task: None,
            }),
            is_playing_tx: watch::channel(false).0,
            has_error_tx: watch::channel(false).0,
        }
    }

    /// Subscribe to the playing flag
    #[must_use]
    pub fn is_playing(&self) -> watch::Receiver<bool> {
        self.is_playing_tx.subscribe()
    }

    /// Subscribe to the error flag
    #[must_use]
    pub fn has_error(&self) -> watch::Receiver<bool> {
        self.has_error_tx.subscribe()
    }

    /// Start playback with a fade-in ramp.
    ///
    /// Always connects to the live edge: if no pipeline exists, or the error
    /// flag is set, the old pipeline is torn down and a fresh one is built.
    /// Any in-flight ramp is cancelled before the new one starts, so no two
    /// ramps ever run concurrently.
    ///
    /// # Errors
    ///
    /// Returns an error if a fresh pipeline cannot be built; the error flag
    /// is set as well so the UI can offer a retry.
    pub async fn play(&self) -> Result<()> {
        debug!("Play requested");
        let mut inner = self.inner.lock().await;

        if inner.pipeline.is_none() || *self.has_error_tx.borrow() {
            self.release_locked(&mut inner);
            if let Err(e) = self.build_pipeline_locked(&mut inner) {
                warn!("Pipeline construction failed: {e}");
                self.has_error_tx.send_replace(true);
                return Err(e);
            }
        }

        let Some(pipeline) = inner.pipeline.clone() else {
            return Ok(());
        };

        if let Some(token) = inner.ramp_token.take() {
            token.cancel();
        }

        pipeline.set_volume(0.0);
        pipeline.request_play();

        let token = CancellationToken::new();
        inner.ramp_token = Some(token.clone());
        tokio::spawn(run_fade_ramp(pipeline, self.fade_in, token));
        debug!("Started playback with fade-in");
        Ok(())
    }

    /// Halt playback, keeping the pipeline allocated.
    ///
    /// For a live stream there is no buffered position to preserve; the next
    /// [`play`](Self::play) reconnects to the live edge.
    pub async fn stop(&self) {
        debug!("Stop requested");
        let mut inner = self.inner.lock().await;
        if let Some(token) = inner.ramp_token.take() {
            token.cancel();
        }
        if let Some(pipeline) = &inner.pipeline {
            pipeline.halt();
        }
    }

    /// Pause playback. Equivalent to [`stop`](Self::stop) for a live source.
    pub async fn pause(&self) {
        self.stop().await;
    }

    /// Stop if currently playing, otherwise play.
    ///
    /// # Errors
    ///
    /// Propagates a pipeline construction failure from the play branch.
    pub async fn toggle_play_pause(&self) -> Result<()> {
        if *self.is_playing_tx.borrow() {
            self.stop().await;
            Ok(())
        } else {
            self.play().await
        }
    }

    /// Clear the error flag and rebuild the pipeline from scratch.
    ///
    /// # Errors
    ///
    /// Returns an error if the rebuilt pipeline cannot be constructed.
    pub async fn retry(&self) -> Result<()> {
        debug!("Retry requested");
        self.has_error_tx.send_replace(false);
        {
            let mut inner = self.inner.lock().await;
            self.release_locked(&mut inner);
        }
        self.play().await
    }

    /// Tear down the pipeline and free the underlying audio resources.
    ///
    /// Idempotent; must be called when the owning screen goes away.
    pub async fn release(&self) {
        debug!("Releasing player");
        let mut inner = self.inner.lock().await;
        self.release_locked(&mut inner);
        self.is_playing_tx.send_replace(false);
    }

    fn build_pipeline_locked(&self, inner: &mut ControllerInner) -> Result<()> {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let pipeline: Arc<dyn StreamPipeline> =
            Arc::from(self.factory.build(&self.endpoint, event_tx)?);

        let is_playing = self.is_playing_tx.clone();
        let has_error = self.has_error_tx.clone();
        let event_task = tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                match event {
                    PipelineEvent::Ready => {
                        debug!("Pipeline ready");
                        has_error.send_replace(false);
                    }
                    PipelineEvent::Ended => {
                        debug!("Stream ended");
                        is_playing.send_replace(false);
                    }
                    PipelineEvent::PlayingChanged(playing) => {
                        debug!("Is playing: {playing}");
                        is_playing.send_replace(playing);
                    }
                    PipelineEvent::Error(reason) => {
                        warn!("Pipeline error: {reason}");
                        has_error.send_replace(true);
                        is_playing.send_replace(false);
                    }
                }
            }
        });

        inner.pipeline = Some(pipeline);
        inner.event_task = Some(event_task);
        Ok(())
    }

    fn release_locked(&self, inner: &mut ControllerInner) {
        if let Some(token) = inner.ramp_token.take() {
            token.cancel();
        }
        if let Some(pipeline) = inner.pipeline.take() {
            pipeline.halt();
            pipeline.release();
        }
        // No further callbacks may arrive once the pipeline is gone
        if let Some(task) = inner.event_task.take() {
            task.abort();
        }
    }
}

/// Ramp the pipeline volume from silent to full over `duration`.
async fn run_fade_ramp(
    pipeline: Arc<dyn StreamPipeline>,
    duration: Duration,
    cancel: CancellationToken,
) {
    let step_delay = duration / u32::from(FADE_STEPS);
    for step in 1..=FADE_STEPS {
        tokio::select! {
            () = cancel.cancelled() => return,
            () = tokio::time::sleep(step_delay) => {}
        }
        pipeline.set_volume(f32::from(step) / f32::from(FADE_STEPS));
    }
}
