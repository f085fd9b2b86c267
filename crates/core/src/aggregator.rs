//! Song info aggregation
//!
//! Combines the probe, the player resolver, the track cache and catalog
//! search into one call that always produces a coherent track.

use crate::cache::TrackCache;
use crate::models::{EnrichedTrack, RawPlaybackSample, TrackIdentity};
use crate::traits::{CatalogSearch, NowPlayingProbe, PlayerResolver};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct SongInfoAggregator {
    probe: Arc<dyn NowPlayingProbe>,
    resolver: Arc<dyn PlayerResolver>,
    search: Arc<dyn CatalogSearch>,
    cache: TrackCache,
    last_identity: Option<TrackIdentity>,
}

impl SongInfoAggregator {
    pub fn new(
        probe: Arc<dyn NowPlayingProbe>,
        resolver: Arc<dyn PlayerResolver>,
        search: Arc<dyn CatalogSearch>,
    ) -> Self {
        Self {
            probe,
            resolver,
            search,
            cache: TrackCache::new(),
            last_identity: None,
        }
    }

    /// Get the currently playing track, enriching it on first sight.
    ///
    /// Never fails: if nothing is playing (or the probe is unusable) the
    /// "Not playing" sentinel is returned.
    pub async fn current_song_info(&mut self) -> EnrichedTrack {
        let sample = match self.probe.sample().await {
            Ok(sample) => sample,
            Err(e) => {
                warn!("{}; now-playing detection disabled for this session", e);
                RawPlaybackSample::not_playing()
            }
        };

        if !sample.has_track() {
            if let Some(previous) = self.last_identity.take() {
                debug!("Playback stopped (last track: {})", previous);
            }
            return EnrichedTrack::not_playing();
        }

        let player = match sample.player_hint.clone() {
            Some(hint) if !hint.trim().is_empty() => Some(hint),
            _ => self.resolver.resolve(&sample).await,
        };
        let identity = TrackIdentity::new(&sample.title, &sample.artist);

        // 1. Known track: refresh playback state only
        if let Some(cached) = self.cache.get_mut(&identity) {
            cached.elapsed_seconds = sample.elapsed_seconds;
            cached.duration_seconds = sample.duration_seconds;
            cached.is_playing = sample.is_playing;
            if cached.player.is_none() && player.is_some() {
                debug!("Player for {} resolved late: {:?}", identity, player);
                cached.player = player;
            }
            debug!("Using cached song info for {}", identity);
            self.last_identity = Some(identity);
            return cached.clone();
        }

        // 2. New track: one catalog lookup per identity
        info!("New track: {} (player: {:?})", identity, player);
        let enrichment = self
            .search
            .search(identity.title(), identity.artist(), player.as_deref())
            .await;

        if enrichment.is_none() {
            debug!("No catalog match for {}, using default artwork", identity);
        }

        let track = EnrichedTrack::from_sample(identity.clone(), &sample, player, enrichment);
        self.cache.put(identity.clone(), track.clone());
        self.last_identity = Some(identity);
        track
    }

    /// Identity of the track returned by the last successful poll
    pub fn last_identity(&self) -> Option<&TrackIdentity> {
        self.last_identity.as_ref()
    }

    pub fn cache(&self) -> &TrackCache {
        &self.cache
    }
}
