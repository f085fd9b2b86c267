//! Playback transitions and the foreground status line

use music_rpc_core::EnrichedTrack;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    PlaybackStarted { title: String, artist: String, player: String },
    TrackChanged { title: String, artist: String },
    PlaybackStopped,
    PlayerChanged { from: String, to: String },
    PresenceConnected(bool),
}

/// Remembers the previous poll so each tick can be turned into events
#[derive(Debug, Default)]
pub struct PlaybackTracker {
    was_playing: bool,
    last_title: Option<String>,
    last_player: Option<String>,
}

impl PlaybackTracker {
    pub fn observe(&mut self, track: &EnrichedTrack) -> Vec<StatusEvent> {
        let mut events = Vec::new();
        let playing = track.is_active();

        if playing {
            let player = track.player_name().to_string();

            if let Some(previous) = self.last_player.as_ref().filter(|p| **p != player) {
                events.push(StatusEvent::PlayerChanged {
                    from: previous.clone(),
                    to: player.clone(),
                });
            }

            if !self.was_playing {
                events.push(StatusEvent::PlaybackStarted {
                    title: track.display_title.clone(),
                    artist: track.display_artist.clone(),
                    player: player.clone(),
                });
            } else if self.last_title.as_deref() != Some(track.display_title.as_str()) {
                events.push(StatusEvent::TrackChanged {
                    title: track.display_title.clone(),
                    artist: track.display_artist.clone(),
                });
            }

            self.last_title = Some(track.display_title.clone());
            self.last_player = Some(player);
        } else if self.was_playing {
            events.push(StatusEvent::PlaybackStopped);
            self.last_title = None;
        }

        self.was_playing = playing;
        events
    }
}

pub fn render(event: &StatusEvent) -> String {
    match event {
        StatusEvent::PlaybackStarted { title, artist, player } => {
            format!("Playing on {}: {} - {}", player, artist, title)
        }
        StatusEvent::TrackChanged { title, artist } => format!("Now playing: {} - {}", artist, title),
        StatusEvent::PlaybackStopped => "Playback stopped".to_string(),
        StatusEvent::PlayerChanged { from, to } => format!("Player changed: {} -> {}", from, to),
        StatusEvent::PresenceConnected(true) => "Discord rich presence connected".to_string(),
        StatusEvent::PresenceConnected(false) => "Discord rich presence disconnected".to_string(),
    }
}

/// Foreground side: prints every status update pushed by the service
pub struct StatusIndicator {
    rx: mpsc::Receiver<StatusEvent>,
}

impl StatusIndicator {
    pub fn new(rx: mpsc::Receiver<StatusEvent>) -> Self {
        Self { rx }
    }

    /// Runs until every sender is dropped
    pub async fn run(mut self) {
        while let Some(event) = self.rx.recv().await {
            println!(" | {}", render(&event));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use music_rpc_core::{RawPlaybackSample, TrackIdentity};

    fn track(title: &str, player: &str, playing: bool) -> EnrichedTrack {
        let sample = RawPlaybackSample {
            title: title.into(),
            artist: "Pink Floyd".into(),
            is_playing: playing,
            ..Default::default()
        };
        EnrichedTrack::from_sample(
            TrackIdentity::new(title, "Pink Floyd"),
            &sample,
            Some(player.into()),
            None,
        )
    }

    #[test]
    fn test_start_change_stop() {
        let mut tracker = PlaybackTracker::default();

        assert_eq!(
            tracker.observe(&track("Time", "Deezer", true)),
            vec![StatusEvent::PlaybackStarted {
                title: "Time".into(),
                artist: "Pink Floyd".into(),
                player: "Deezer".into()
            }]
        );
        assert!(tracker.observe(&track("Time", "Deezer", true)).is_empty());
        assert_eq!(
            tracker.observe(&track("Money", "Deezer", true)),
            vec![StatusEvent::TrackChanged {
                title: "Money".into(),
                artist: "Pink Floyd".into()
            }]
        );
        assert_eq!(
            tracker.observe(&EnrichedTrack::not_playing()),
            vec![StatusEvent::PlaybackStopped]
        );
        assert!(tracker.observe(&EnrichedTrack::not_playing()).is_empty());
    }

    #[test]
    fn test_paused_track_counts_as_stopped() {
        let mut tracker = PlaybackTracker::default();
        tracker.observe(&track("Time", "Deezer", true));

        assert_eq!(
            tracker.observe(&track("Time", "Deezer", false)),
            vec![StatusEvent::PlaybackStopped]
        );
    }

    #[test]
    fn test_player_change() {
        let mut tracker = PlaybackTracker::default();
        tracker.observe(&track("Time", "Deezer", true));
        tracker.observe(&EnrichedTrack::not_playing());

        let events = tracker.observe(&track("Time", "Spotify", true));
        assert_eq!(
            events[0],
            StatusEvent::PlayerChanged {
                from: "Deezer".into(),
                to: "Spotify".into()
            }
        );
        assert!(matches!(events[1], StatusEvent::PlaybackStarted { .. }));
    }

    #[test]
    fn test_render() {
        assert_eq!(render(&StatusEvent::PlaybackStopped), "Playback stopped");
        assert_eq!(
            render(&StatusEvent::TrackChanged {
                title: "Time".into(),
                artist: "Pink Floyd".into()
            }),
            "Now playing: Pink Floyd - Time"
        );
    }

    #[tokio::test]
    async fn test_indicator_stops_when_senders_drop() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(StatusEvent::PlaybackStopped).await.unwrap();
        drop(tx);

        StatusIndicator::new(rx).run().await;
    }
}
