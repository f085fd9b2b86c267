//! Player identity resolution
//!
//! The now-playing data rarely says which app produced it, so we try a few
//! increasingly expensive heuristics and stop at the first hit:
//!
//! 1. the client name reported with the sample
//! 2. bundle / content identifiers matched against [`KNOWN_PLAYERS`]
//! 3. which known player processes are running
//! 4. the probe's `source` sub-command

use crate::probe::DEFAULT_PROBE_PROGRAM;
use crate::runner::{CommandOutcome, CommandRunner};
use async_trait::async_trait;
use music_rpc_core::{PlayerResolver, RawPlaybackSample};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Identifier substring (lowercase) -> canonical player name
pub const KNOWN_PLAYERS: &[(&str, &str)] = &[
    ("spotify", "Spotify"),
    ("deezer", "Deezer"),
    ("com.apple.music", "Music"),
    ("itunes", "iTunes"),
    ("tidal", "Tidal"),
    ("vlc", "VLC"),
    ("youtube", "YouTube"),
    ("audirvana", "Audirvana"),
    ("plexamp", "Plexamp"),
];

/// Process names checked in order; the first running one wins
pub const PROCESS_CHECK_ORDER: &[&str] =
    &["Deezer", "Spotify", "Music", "iTunes", "VLC", "YouTube", "Tidal"];

pub const PROCESS_CHECK_TIMEOUT: Duration = Duration::from_millis(500);
pub const SOURCE_TIMEOUT: Duration = Duration::from_secs(1);

/// Map an app identifier (bundle id, content id, source name) to a player
pub fn player_from_identifier(identifier: &str) -> Option<&'static str> {
    let identifier = identifier.to_lowercase();
    KNOWN_PLAYERS
        .iter()
        .find(|(needle, _)| identifier.contains(needle))
        .map(|(_, player)| *player)
}

pub struct PlayerIdentityResolver {
    runner: Arc<dyn CommandRunner>,
    probe_program: String,
}

impl PlayerIdentityResolver {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self::with_probe_program(DEFAULT_PROBE_PROGRAM, runner)
    }

    pub fn with_probe_program(program: impl Into<String>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            probe_program: program.into(),
        }
    }

    fn from_sample(sample: &RawPlaybackSample) -> Option<String> {
        if let Some(client) = sample.client_name.as_deref().map(str::trim) {
            if !client.is_empty() {
                return Some(client.to_string());
            }
        }

        [&sample.bundle_identifier, &sample.content_item_identifier]
            .into_iter()
            .flatten()
            .find_map(|id| player_from_identifier(id))
            .map(str::to_string)
    }

    async fn from_processes(&self) -> Option<String> {
        for name in PROCESS_CHECK_ORDER {
            let outcome = self
                .runner
                .run("pgrep", &["-i", "-x", *name], PROCESS_CHECK_TIMEOUT)
                .await;

            match outcome {
                CommandOutcome::NotFound => {
                    debug!("pgrep not available, skipping process checks");
                    return None;
                }
                outcome if outcome.succeeded() => {
                    debug!("Detected {} running via pgrep", name);
                    return Some(name.to_string());
                }
                _ => {}
            }
        }
        None
    }

    async fn from_probe_source(&self) -> Option<String> {
        let source = self
            .runner
            .run(&self.probe_program, &["source"], SOURCE_TIMEOUT)
            .await
            .success_stdout()?;

        player_from_identifier(&source).map(str::to_string)
    }
}

#[async_trait]
impl PlayerResolver for PlayerIdentityResolver {
    async fn resolve(&self, sample: &RawPlaybackSample) -> Option<String> {
        if let Some(player) = Self::from_sample(sample) {
            return Some(player);
        }

        if let Some(player) = self.from_processes().await {
            return Some(player);
        }

        let player = self.from_probe_source().await;
        if player.is_none() {
            debug!("Could not identify the active player");
        }
        player
    }
}
