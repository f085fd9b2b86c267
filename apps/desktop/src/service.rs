//! Background polling service
//!
//! Every tick: sample the player, enrich the track, publish presence, and push
//! any playback transitions to the status indicator.

use crate::status::{render, PlaybackTracker, StatusEvent};
use anyhow::{Context, Result};
use futures::FutureExt;
use music_rpc_catalog::{CatalogSearchEngine, DeezerClient};
use music_rpc_core::{EnrichedTrack, SharedConfig, SongInfoAggregator};
use music_rpc_presence::PresencePublisher;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Wire the probe, resolver and catalog into one aggregator
pub async fn build_aggregator(config: &SharedConfig) -> Result<SongInfoAggregator> {
    let (probe, resolver) = music_rpc_media_session::create_media_session(None);
    let tuning = config.read().await.search.clone();
    let client = DeezerClient::new().context("Failed to build catalog HTTP client")?;
    let engine = CatalogSearchEngine::new(Arc::new(client), tuning);

    Ok(SongInfoAggregator::new(probe, resolver, Arc::new(engine)))
}

pub struct PresenceService {
    config: SharedConfig,
    aggregator: SongInfoAggregator,
    publisher: Option<PresencePublisher>,
    tracker: PlaybackTracker,
    status: mpsc::Sender<StatusEvent>,
    interval_override: Option<Duration>,
    presence_connected: bool,
    stopped: bool,
}

impl PresenceService {
    /// `publisher: None` runs in monitor-only mode
    pub fn new(
        config: SharedConfig,
        aggregator: SongInfoAggregator,
        publisher: Option<PresencePublisher>,
        status: mpsc::Sender<StatusEvent>,
    ) -> Self {
        Self {
            config,
            aggregator,
            publisher,
            tracker: PlaybackTracker::default(),
            status,
            interval_override: None,
            presence_connected: false,
            stopped: false,
        }
    }

    pub fn with_interval(mut self, seconds: Option<u64>) -> Self {
        self.interval_override = seconds.map(Duration::from_secs);
        self
    }

    /// One poll: aggregate, publish, report transitions
    pub async fn tick(&mut self) -> EnrichedTrack {
        let track = self.aggregator.current_song_info().await;

        for event in self.tracker.observe(&track) {
            info!("{}", render(&event));
            self.notify(event);
        }

        let connected = match self.publisher.as_mut() {
            Some(publisher) => {
                if !track.is_active() {
                    if let Err(e) = publisher.update(&track).await {
                        warn!("Failed to clear presence: {}", e);
                    }
                } else if publisher.connect(track.player.as_deref()).await {
                    if let Err(e) = publisher.update(&track).await {
                        warn!("Presence update failed, will reconnect next tick: {}", e);
                    }
                } else {
                    debug!("No presence for player {}", track.player_name());
                }
                Some(publisher.is_connected())
            }
            None => None,
        };

        if let Some(connected) = connected.filter(|c| *c != self.presence_connected) {
            self.presence_connected = connected;
            self.notify(StatusEvent::PresenceConnected(connected));
        }

        track
    }

    /// [`Self::tick`] with errors and panics contained
    pub async fn poll_once(&mut self) {
        if let Err(panic) = AssertUnwindSafe(self.tick()).catch_unwind().await {
            error!("Poll iteration panicked: {}", panic_message(panic.as_ref()));
        }
    }

    /// Poll until `shutdown` resolves, then clear presence
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let interval = poll_interval(&self.config, self.interval_override).await;
        info!("Polling every {} seconds", interval.as_secs());

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = self.poll_once() => {}
            }

            let interval = poll_interval(&self.config, self.interval_override).await;
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        info!("Shutdown requested");
        self.shutdown().await;
    }

    pub async fn shutdown(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        if let Some(publisher) = self.publisher.as_mut() {
            publisher.shutdown().await;
        }
    }

    fn notify(&self, event: StatusEvent) {
        match self.status.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => debug!("Status queue full, dropping update"),
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

async fn poll_interval(config: &SharedConfig, fixed: Option<Duration>) -> Duration {
    match fixed {
        Some(interval) => interval,
        None => Duration::from_secs(config.read().await.update_interval),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
