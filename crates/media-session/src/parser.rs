//! Parser for the `nowplaying-cli get-raw` dictionary dump
//!
//! The tool prints an NSDictionary description:
//!
//! ```text
//! {
//!     kMRMediaRemoteNowPlayingInfoArtist = "Viktor Sheen";
//!     kMRMediaRemoteNowPlayingInfoPlaybackRate = 1;
//!     kMRMediaRemoteNowPlayingInfoTitle = Cau;
//! }
//! ```
//!
//! Non-ASCII characters come out as `\Uxxxx` escapes with four hex digits.

use music_rpc_core::{normalize_text, RawPlaybackSample};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;

const KEY_PREFIXES: [&str; 2] = ["kMRMediaRemoteNowPlayingInfo", "kMRMediaRemoteNowPlaying"];

const CLIENT_NAME_KEYS: [&str; 3] = ["clientname", "applicationdisplayname", "clientdisplayname"];
const BUNDLE_KEYS: [&str; 3] = [
    "clientbundleidentifier",
    "bundleidentifier",
    "clientparentappbundleidentifier",
];
const CONTENT_ITEM_KEYS: [&str; 2] = ["contentitemidentifier", "uniqueidentifier"];

/// `\Uxxxx` escapes, optionally forming a UTF-16 surrogate pair
static PLIST_ESCAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\U([dD][89abAB][0-9a-fA-F]{2})\\U([dD][c-fC-F][0-9a-fA-F]{2})|\\U([0-9a-fA-F]{4})")
        .expect("plist escape pattern is valid")
});

/// Parse a raw dump into a sample. Anything unrecognizable yields a
/// not-playing sample.
pub fn parse_raw(raw: &str) -> RawPlaybackSample {
    let fields = parse_fields(raw);
    if fields.is_empty() {
        return RawPlaybackSample::not_playing();
    }

    let text = |key: &str| fields.get(key).map(|v| normalize_text(v)).unwrap_or_default();
    let number = |key: &str| {
        fields
            .get(key)
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|n| n.is_finite())
            .unwrap_or(0.0)
    };

    RawPlaybackSample {
        title: text("title"),
        artist: text("artist"),
        album: text("album"),
        elapsed_seconds: number("elapsedtime").max(0.0),
        duration_seconds: number("duration").max(0.0),
        is_playing: number("playbackrate") > 0.0,
        player_hint: None,
        client_name: first_of(&fields, &CLIENT_NAME_KEYS),
        bundle_identifier: first_of(&fields, &BUNDLE_KEYS),
        content_item_identifier: first_of(&fields, &CONTENT_ITEM_KEYS),
    }
}

fn first_of(fields: &HashMap<String, String>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| fields.get(*key))
        .map(|v| normalize_text(v))
        .filter(|v| !v.is_empty())
}

/// Collect `key = value;` lines. Keys lose their framework prefix and are
/// lowercased; the first occurrence of a key wins.
fn parse_fields(raw: &str) -> HashMap<String, String> {
    let mut fields = HashMap::new();

    for line in raw.lines() {
        let Some((key, value)) = line.split_once(" = ") else {
            continue;
        };

        let key = canonical_key(key);
        if key.is_empty() {
            continue;
        }

        fields.entry(key).or_insert_with(|| clean_value(value));
    }

    fields
}

fn canonical_key(key: &str) -> String {
    let key = key.trim().trim_matches('"');
    let key = KEY_PREFIXES
        .iter()
        .find_map(|prefix| key.strip_prefix(prefix))
        .unwrap_or(key);

    key.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn clean_value(value: &str) -> String {
    let value = value.trim().trim_end_matches(';').trim_end();
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);

    decode_plist_escapes(value).replace("\\\"", "\"")
}

fn decode_plist_escapes(value: &str) -> String {
    PLIST_ESCAPE
        .replace_all(value, |caps: &Captures| {
            let decoded = if let (Some(high), Some(low)) = (caps.get(1), caps.get(2)) {
                let high = u32::from_str_radix(high.as_str(), 16).unwrap_or(0);
                let low = u32::from_str_radix(low.as_str(), 16).unwrap_or(0);
                char::from_u32(0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00))
            } else {
                caps.get(3)
                    .and_then(|hex| u32::from_str_radix(hex.as_str(), 16).ok())
                    .and_then(char::from_u32)
            };

            decoded
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
