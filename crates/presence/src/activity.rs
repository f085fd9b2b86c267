//! Rich presence activity payload

use chrono::{DateTime, Utc};
use music_rpc_core::{EnrichedTrack, DEFAULT_ALBUM_ART};
use serde::Serialize;

/// Discord rejects longer details / state / asset texts
pub const MAX_FIELD_CHARS: usize = 128;

pub const LISTEN_BUTTON_LABEL: &str = "Listen";

/// Longer durations are treated as unknown
const MAX_TRACK_SECONDS: f64 = 7.0 * 24.0 * 3600.0;

/// Shown instead of details / state that would be too short to publish
pub const PLACEHOLDER_TEXT: &str = "Unknown";

/// Discord rejects shorter details / state / asset texts
const MIN_FIELD_CHARS: usize = 2;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Activity {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<Timestamps>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assets: Option<Assets>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<Button>,
}

/// Unix seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Timestamps {
    pub start: i64,
    pub end: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Assets {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub large_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub large_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub small_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub small_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Button {
    pub label: String,
    pub url: String,
}

impl Activity {
    /// Build the activity for a playing track.
    ///
    /// With `use_album_art` off, or without verified art, the uploaded
    /// default asset is used instead of remote URLs.
    pub fn for_track(track: &EnrichedTrack, use_album_art: bool, now: DateTime<Utc>) -> Self {
        let player = track.player_name();

        let (large_image, large_text) = if use_album_art && track.has_album_art() {
            (
                track.album_art_url.clone(),
                track.album.clone().unwrap_or_else(|| player.to_string()),
            )
        } else {
            (DEFAULT_ALBUM_ART.to_string(), player.to_string())
        };

        let (small_image, small_text) = if use_album_art && track.has_artist_image() {
            (
                Some(track.artist_image_url.clone()),
                Some(display_text(&track.display_artist)),
            )
        } else {
            (None, None)
        };

        let buttons = track
            .external_link
            .iter()
            .map(|url| Button {
                label: LISTEN_BUTTON_LABEL.to_string(),
                url: url.clone(),
            })
            .collect();

        Self {
            details: Some(display_text(&track.display_title)),
            state: Some(display_text(&track.display_artist)),
            timestamps: timestamps(track.elapsed_seconds, track.duration_seconds, now),
            assets: Some(Assets {
                large_image: Some(large_image),
                large_text: Some(display_text(&large_text)),
                small_image,
                small_text,
            }),
            buttons,
        }
    }

    /// Same activity with remote images swapped for the default asset
    pub fn with_default_art(&self) -> Self {
        let mut activity = self.clone();
        if let Some(assets) = activity.assets.as_mut() {
            assets.large_image = Some(DEFAULT_ALBUM_ART.to_string());
            assets.small_image = None;
            assets.small_text = None;
        }
        activity
    }

    /// True if any image points at a remote URL
    pub fn uses_remote_art(&self) -> bool {
        self.assets.as_ref().is_some_and(|assets| {
            [&assets.large_image, &assets.small_image]
                .into_iter()
                .flatten()
                .any(|image| music_rpc_core::is_remote_asset(image))
        })
    }
}

/// Start/end so the client can draw a progress bar.
///
/// `None` for unknown or absurd durations and once elapsed runs past the end.
pub fn timestamps(elapsed_seconds: f64, duration_seconds: f64, now: DateTime<Utc>) -> Option<Timestamps> {
    if !elapsed_seconds.is_finite() || !(0.0..=MAX_TRACK_SECONDS).contains(&duration_seconds) {
        return None;
    }

    let elapsed = elapsed_seconds.clamp(0.0, MAX_TRACK_SECONDS) as i64;
    let duration = duration_seconds as i64;
    if elapsed > duration {
        return None;
    }

    let start = now.timestamp().checked_sub(elapsed)?;
    let end = start.checked_add(duration)?;
    (start < end).then_some(Timestamps { start, end })
}

/// Make text safe for the presence UI: drop zero-width characters, replace
/// characters outside the BMP with `?`, and cap at [`MAX_FIELD_CHARS`].
///
/// Blank results become [`PLACEHOLDER_TEXT`]; a single character is padded.
pub fn display_text(text: &str) -> String {
    let mut shown: String = text
        .chars()
        .filter(|c| !matches!(c, '\u{200B}'..='\u{200D}' | '\u{FEFF}'))
        .map(|c| if (c as u32) > 0xFFFF { '?' } else { c })
        .take(MAX_FIELD_CHARS)
        .collect();

    if shown.trim().is_empty() {
        return PLACEHOLDER_TEXT.to_string();
    }
    while shown.chars().count() < MIN_FIELD_CHARS {
        shown.push('.');
    }
    shown
}
