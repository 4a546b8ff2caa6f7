//! Headless now-playing monitor for the Blur FM live stream.
//!
//! Wires the station metadata client and the `iTunes` artwork resolver into
//! the periodic synchronizer and logs every published change until
//! interrupted. Playback itself belongs to an embedding UI, which drives
//! [`blurfm_core::PlayerController`] through the pipeline seam.

use blurfm_artwork_itunes::ArtworkResolver;
use blurfm_core::{BlurfmConfig, CoreError, NowPlayingSync, NowPlayingSynchronizer};
use blurfm_station_api::StationClient;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config() -> Result<BlurfmConfig, ExitCode> {
    match BlurfmConfig::load_or_create() {
        Ok(config) => Ok(config),
        Err(CoreError::ConfigNotFound { path }) => {
            // Expected on first run: not an error, just not runnable yet
            info!(
                "Created a config template at {}; edit it and restart",
                path.display()
            );
            Err(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!("{e}");
            Err(ExitCode::FAILURE)
        }
    }
}

async fn run(config: BlurfmConfig) -> Result<(), CoreError> {
    let station = Arc::new(StationClient::with_timeout(
        &config.station.base_url,
        config.station.request_timeout(),
    )?);
    let artwork = Arc::new(ArtworkResolver::from_config(&config.artwork)?);
    let sync = NowPlayingSync::new();

    let cancel_token = CancellationToken::new();
    let ctrlc_token = cancel_token.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received Ctrl+C, shutting down gracefully...");
        ctrlc_token.cancel();
    }) {
        error!("Failed to set Ctrl+C handler: {e}");
    }

    let synchronizer = Arc::new(NowPlayingSynchronizer::new(
        station,
        artwork,
        sync.clone(),
        config.nowplaying.poll_interval(),
        Some(cancel_token.clone()),
    ));

    info!("Live stream endpoint: {}", config.stream.url);

    let loop_handle = if config.nowplaying.enabled {
        Some(synchronizer.clone().start())
    } else {
        info!("Periodic now-playing updates disabled in config");
        None
    };

    // One out-of-band refresh at startup so title and artwork populate even
    // when periodic updates are disabled
    synchronizer.refresh().await;

    let mut rx = sync.subscribe();
    let current = rx.borrow_and_update().clone();
    info!("Now playing: {} - {}", current.artist, current.title);

    loop {
        tokio::select! {
            () = cancel_token.cancelled() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let now_playing = rx.borrow_and_update().clone();
                if let Some(artwork_url) = &now_playing.artwork_url {
                    info!(
                        "Now playing: {} - {} (artwork: {artwork_url})",
                        now_playing.artist, now_playing.title
                    );
                } else {
                    info!(
                        "Now playing: {} - {}",
                        now_playing.artist, now_playing.title
                    );
                }
            }
        }
    }

    if let Some(handle) = loop_handle {
        let _ = handle.await;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let config = match load_config() {
        Ok(config) => config,
        Err(code) => return code,
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
