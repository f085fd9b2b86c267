//! Catalog search cascade
//!
//! Titles with Czech diacritics, featuring credits and artist aliases often
//! miss on the first try, so the engine walks through a fixed list of query
//! strategies until one of them yields verified album art:
//!
//! 1. primary: `artist:"A" track:"T"` (free text when the artist has
//!    diacritics, `track:"T"` when there is no artist)
//! 2. title only
//! 3. primary with diacritics stripped from both parts
//! 4. primary with each table alias of the artist
//! 5. top tracks of known catalog artist ids, scored by word overlap
//! 6. simplified title (first meaningful words)
//! 7. first title word + each artist name / alias
//! 8. stripped title + stripped artist, free text
//!
//! Stages 1-3 may produce a result without art, which is kept as a fallback.
//! Stages 4-8 only count when the cover is reachable. A query string is sent
//! at most once per search. The caller's title and artist are always the ones
//! reported back.

use crate::client::CatalogApi;
use crate::dto::CatalogTrack;
use crate::tuning::{
    artist_with_aliases, best_match, known_artist_ids, simplified_title, table_aliases,
};
use async_trait::async_trait;
use music_rpc_core::{has_diacritics, strip_diacritics, CatalogSearch, EnrichmentResult, SearchTuning};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct CatalogSearchEngine {
    api: Arc<dyn CatalogApi>,
    tuning: SearchTuning,
}

/// The track being looked up, as reported by the player
struct Wanted<'a> {
    title: &'a str,
    artist: &'a str,
    player: Option<&'a str>,
}

impl Wanted<'_> {
    fn result(&self, track: &CatalogTrack, cover: Option<String>, picture: Option<String>) -> EnrichmentResult {
        EnrichmentResult {
            title: self.title.to_string(),
            artist: self.artist.to_string(),
            album_art_url: cover,
            artist_image_url: picture,
            external_link: track.link().map(str::to_string),
            player: self.player.map(str::to_string),
        }
    }
}

fn structured_query(artist: &str, title: &str) -> String {
    format!(r#"artist:"{}" track:"{}""#, artist, title)
}

/// Query for the primary-style stages
fn primary_query(artist: &str, title: &str) -> String {
    if artist.is_empty() {
        format!(r#"track:"{}""#, title)
    } else if has_diacritics(artist) {
        format!("{} {}", artist, title)
    } else {
        structured_query(artist, title)
    }
}

impl CatalogSearchEngine {
    pub fn new(api: Arc<dyn CatalogApi>, tuning: SearchTuning) -> Self {
        Self { api, tuning }
    }

    /// First track for a query; any failure is local to the stage.
    /// Queries already in `tried` are skipped.
    async fn first_hit(&self, stage: &str, query: &str, tried: &mut HashSet<String>) -> Option<CatalogTrack> {
        if !tried.insert(query.to_string()) {
            debug!("[{}] already searched: {}", stage, query);
            return None;
        }
        debug!("[{}] searching: {}", stage, query);
        match self.api.search(query).await {
            Ok(tracks) => {
                let first = tracks.into_iter().next();
                if first.is_none() {
                    debug!("[{}] no results", stage);
                }
                first
            }
            Err(e) => {
                warn!("[{}] catalog search failed: {}", stage, e);
                None
            }
        }
    }

    async fn verified(&self, url: Option<&str>) -> Option<String> {
        let url = url?;
        if self.api.is_reachable(url).await {
            Some(url.to_string())
        } else {
            None
        }
    }

    /// Primary-style stage: the first hit counts even without art, and both
    /// the cover and the artist picture are verified.
    async fn lenient_stage(
        &self,
        stage: &str,
        query: &str,
        wanted: &Wanted<'_>,
        tried: &mut HashSet<String>,
    ) -> Option<EnrichmentResult> {
        let track = self.first_hit(stage, query, tried).await?;
        let cover = self.verified(track.cover_url()).await;
        let picture = self.verified(track.artist_picture_url()).await;
        Some(wanted.result(&track, cover, picture))
    }

    /// Fallback stage: only a hit with a reachable cover counts
    async fn art_stage(
        &self,
        stage: &str,
        query: &str,
        wanted: &Wanted<'_>,
        tried: &mut HashSet<String>,
    ) -> Option<EnrichmentResult> {
        let track = self.first_hit(stage, query, tried).await?;
        match self.verified(track.cover_url()).await {
            Some(cover) => Some(wanted.result(&track, Some(cover), None)),
            None => {
                debug!("[{}] hit without usable album art", stage);
                None
            }
        }
    }

    async fn top_tracks_stage(&self, artist_id: u64, wanted: &Wanted<'_>) -> Option<EnrichmentResult> {
        let tracks = match self.api.artist_top_tracks(artist_id).await {
            Ok(tracks) => tracks,
            Err(e) => {
                warn!("[top-tracks] lookup for artist {} failed: {}", artist_id, e);
                return None;
            }
        };
        debug!("[top-tracks] artist {} has {} tracks", artist_id, tracks.len());

        let (track, score) = best_match(wanted.title, &tracks)?;
        if score <= self.tuning.match_threshold {
            debug!(
                "[top-tracks] best match '{}' scored {:.0}, below threshold",
                track.title, score
            );
            return None;
        }

        let cover = self.verified(track.cover_url()).await?;
        debug!("[top-tracks] matched '{}' with score {:.0}", track.title, score);
        Some(wanted.result(track, Some(cover), None))
    }

    async fn run_cascade(&self, wanted: &Wanted<'_>) -> Option<EnrichmentResult> {
        let (title, artist) = (wanted.title, wanted.artist);
        let mut fallback: Option<EnrichmentResult> = None;
        let mut tried = HashSet::new();

        // Stages 1-3
        let mut lenient = vec![("primary", primary_query(artist, title))];
        if !artist.is_empty() {
            lenient.push(("title-only", format!(r#"track:"{}""#, title)));
        }
        if has_diacritics(title) || has_diacritics(artist) {
            lenient.push((
                "no-diacritics",
                primary_query(&strip_diacritics(artist), &strip_diacritics(title)),
            ));
        }

        for (stage, query) in &lenient {
            if let Some(found) = self.lenient_stage(stage, query, wanted, &mut tried).await {
                if found.has_art() {
                    return Some(found);
                }
                fallback.get_or_insert(found);
            }
        }

        // Stage 4
        for alias in table_aliases(&self.tuning, artist) {
            let query = structured_query(&alias, title);
            if let Some(found) = self.art_stage("artist-alias", &query, wanted, &mut tried).await {
                return Some(found);
            }
        }

        // Stage 5
        for artist_id in known_artist_ids(&self.tuning, artist) {
            if let Some(found) = self.top_tracks_stage(artist_id, wanted).await {
                return Some(found);
            }
        }

        // Stage 6
        if let Some(simplified) = simplified_title(&self.tuning, title) {
            if let Some(found) = self.art_stage("simplified-title", &simplified, wanted, &mut tried).await {
                return Some(found);
            }
        }

        // Stage 7
        if let Some(first_word) = title.split_whitespace().next() {
            let names = if artist.is_empty() {
                Vec::new()
            } else {
                artist_with_aliases(&self.tuning, artist)
            };
            for name in names {
                let query = format!("{} {}", first_word, name);
                if let Some(found) = self.art_stage("first-word-alias", &query, wanted, &mut tried).await {
                    return Some(found);
                }
            }
        }

        // Stage 8
        let catch_all = format!("{} {}", strip_diacritics(title), strip_diacritics(artist));
        if let Some(found) = self.art_stage("catch-all", catch_all.trim(), wanted, &mut tried).await {
            return Some(found);
        }

        fallback
    }
}

#[async_trait]
impl CatalogSearch for CatalogSearchEngine {
    async fn search(&self, title: &str, artist: &str, player_hint: Option<&str>) -> Option<EnrichmentResult> {
        let wanted = Wanted {
            title: title.trim(),
            artist: artist.trim(),
            player: player_hint,
        };
        if wanted.title.is_empty() {
            return None;
        }

        let found = self.run_cascade(&wanted).await;
        match &found {
            Some(result) if result.has_art() => {
                info!("Found album art for {} - {}", wanted.artist, wanted.title)
            }
            Some(_) => info!(
                "Found {} - {} in catalog, but without album art",
                wanted.artist, wanted.title
            ),
            None => info!("No catalog match for {} - {}", wanted.artist, wanted.title),
        }
        found
    }
}
