use crate::normalize::normalize_text;
use serde::{Deserialize, Serialize};

/// Title shown when nothing is playing
pub const NOT_PLAYING_TITLE: &str = "Not playing";

/// Artist shown when the probe gave us none
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Player name used when identity resolution comes up empty
pub const DEFAULT_PLAYER: &str = "Music";

/// Sentinel asset key for missing or unverified album art
pub const DEFAULT_ALBUM_ART: &str = "music_logo";

/// Sentinel asset key for missing or unverified artist images
pub const DEFAULT_ARTIST_IMAGE: &str = "music_icon";

/// Identity key for a track: normalized title and artist.
///
/// Comparison is exact. Two titles that differ only by punctuation are
/// distinct identities; fuzzy matching belongs to catalog search only.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackIdentity {
    title: String,
    artist: String,
}

impl TrackIdentity {
    pub fn new(title: &str, artist: &str) -> Self {
        Self {
            title: normalize_text(title),
            artist: normalize_text(artist),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }
}

impl std::fmt::Display for TrackIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.artist, self.title)
    }
}

/// One poll's worth of now-playing data, straight from the probe
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawPlaybackSample {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub elapsed_seconds: f64,
    pub duration_seconds: f64,
    pub is_playing: bool,
    /// Best-effort player name reported alongside the sample
    pub player_hint: Option<String>,
    pub client_name: Option<String>,
    pub bundle_identifier: Option<String>,
    pub content_item_identifier: Option<String>,
}

impl RawPlaybackSample {
    /// Sample reported when the probe has no data
    pub fn not_playing() -> Self {
        Self::default()
    }

    pub fn has_track(&self) -> bool {
        self.is_playing && !self.title.trim().is_empty()
    }
}

/// Catalog data found for a track
#[derive(Clone, Debug, PartialEq)]
pub struct EnrichmentResult {
    pub title: String,
    pub artist: String,
    /// Verified-reachable cover URL
    pub album_art_url: Option<String>,
    /// Verified-reachable artist picture URL
    pub artist_image_url: Option<String>,
    pub external_link: Option<String>,
    pub player: Option<String>,
}

impl EnrichmentResult {
    pub fn has_art(&self) -> bool {
        self.album_art_url.is_some()
    }
}

/// A resolved track, kept in the cache for the rest of the session
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EnrichedTrack {
    pub identity: TrackIdentity,
    pub display_title: String,
    pub display_artist: String,
    pub album: Option<String>,
    /// Verified cover URL or [`DEFAULT_ALBUM_ART`]
    pub album_art_url: String,
    /// Verified artist picture URL or [`DEFAULT_ARTIST_IMAGE`]
    pub artist_image_url: String,
    pub external_link: Option<String>,
    pub player: Option<String>,

    // Volatile playback state, refreshed on every poll
    pub elapsed_seconds: f64,
    pub duration_seconds: f64,
    pub is_playing: bool,
}

impl EnrichedTrack {
    /// Sentinel returned whenever nothing is playing
    pub fn not_playing() -> Self {
        Self {
            identity: TrackIdentity::new(NOT_PLAYING_TITLE, ""),
            display_title: NOT_PLAYING_TITLE.to_string(),
            display_artist: UNKNOWN_ARTIST.to_string(),
            album: None,
            album_art_url: DEFAULT_ALBUM_ART.to_string(),
            artist_image_url: DEFAULT_ARTIST_IMAGE.to_string(),
            external_link: None,
            player: None,
            elapsed_seconds: 0.0,
            duration_seconds: 0.0,
            is_playing: false,
        }
    }

    /// Build a cache entry from a sample and whatever the catalog returned
    pub fn from_sample(
        identity: TrackIdentity,
        sample: &RawPlaybackSample,
        player: Option<String>,
        enrichment: Option<EnrichmentResult>,
    ) -> Self {
        let display_title = normalize_text(&sample.title);
        let display_artist = match normalize_text(&sample.artist) {
            artist if artist.trim().is_empty() => UNKNOWN_ARTIST.to_string(),
            artist => artist,
        };
        let album = Some(normalize_text(&sample.album)).filter(|album| !album.trim().is_empty());

        let (album_art_url, artist_image_url, external_link, player) = match enrichment {
            Some(found) => (
                found.album_art_url.unwrap_or_else(|| DEFAULT_ALBUM_ART.to_string()),
                found.artist_image_url.unwrap_or_else(|| DEFAULT_ARTIST_IMAGE.to_string()),
                found.external_link.filter(|link| !link.is_empty()),
                player.or(found.player),
            ),
            None => (
                DEFAULT_ALBUM_ART.to_string(),
                DEFAULT_ARTIST_IMAGE.to_string(),
                None,
                player,
            ),
        };

        Self {
            identity,
            display_title,
            display_artist,
            album,
            album_art_url,
            artist_image_url,
            external_link,
            player,
            elapsed_seconds: sample.elapsed_seconds,
            duration_seconds: sample.duration_seconds,
            is_playing: sample.is_playing,
        }
    }

    /// True only for a real track that is currently playing
    pub fn is_active(&self) -> bool {
        self.is_playing && self.display_title != NOT_PLAYING_TITLE
    }

    pub fn has_album_art(&self) -> bool {
        is_remote_asset(&self.album_art_url)
    }

    pub fn has_artist_image(&self) -> bool {
        is_remote_asset(&self.artist_image_url)
    }

    pub fn player_name(&self) -> &str {
        self.player.as_deref().unwrap_or(DEFAULT_PLAYER)
    }
}

/// Asset values are either remote URLs or the name of an uploaded app asset
pub fn is_remote_asset(value: &str) -> bool {
    value.starts_with("https://") || value.starts_with("http://")
}
