//! Core of the Blur FM radio player: the now-playing data model, the
//! periodic synchronizer that keeps it fresh, and the playback controller
//! wrapping an external streaming pipeline.

pub mod config;
pub mod error;
pub mod model;
pub mod paths;
pub mod playback;
pub mod source;
pub mod sync;
pub mod synchronizer;

pub use config::{ArtworkConfig, BlurfmConfig, NowPlayingConfig, StationConfig, StreamEndpoint};
pub use error::CoreError;
pub use model::{NowPlaying, FALLBACK_ARTIST, FALLBACK_TITLE};
pub use playback::{
    PipelineEvent, PipelineFactory, PlayerController, StreamPipeline, FADE_IN_DURATION,
};
pub use source::{ArtworkSource, MetadataSource};
pub use sync::NowPlayingSync;
pub use synchronizer::NowPlayingSynchronizer;
