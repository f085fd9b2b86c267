//! Presence publisher: keeps one presence connection per application id and
//! pushes activity updates when the track changes.

use crate::activity::Activity;
use crate::error::{PresenceError, Result};
use async_trait::async_trait;
use chrono::Utc;
use music_rpc_core::{EnrichedTrack, SharedConfig};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Pause between closing one application id and opening the next
pub const CLIENT_SWITCH_DELAY: Duration = Duration::from_millis(500);

/// Transport to the presence service
#[async_trait]
pub trait PresenceClient: Send {
    async fn connect(&mut self, client_id: &str) -> Result<()>;
    async fn set_activity(&mut self, activity: &Activity) -> Result<()>;
    async fn clear(&mut self) -> Result<()>;
    async fn close(&mut self) -> Result<()>;
    fn is_connected(&self) -> bool;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceState {
    pub connected_client_id: Option<String>,
    pub last_published_title: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// A new activity was sent
    Published,
    /// Same title as last time, nothing sent
    Skipped,
    /// Nothing playing, remote presence cleared
    Cleared,
    /// Nothing playing and not connected
    Idle,
}

pub struct PresencePublisher {
    config: SharedConfig,
    client: Box<dyn PresenceClient>,
    state: PresenceState,
    switch_delay: Duration,
}

impl PresencePublisher {
    pub fn new(config: SharedConfig, client: Box<dyn PresenceClient>) -> Self {
        Self {
            config,
            client,
            state: PresenceState::default(),
            switch_delay: CLIENT_SWITCH_DELAY,
        }
    }

    pub fn with_switch_delay(mut self, delay: Duration) -> Self {
        self.switch_delay = delay;
        self
    }

    pub fn state(&self) -> &PresenceState {
        &self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state.connected_client_id.is_some()
    }

    /// Make sure we are connected with the application id for `player`.
    ///
    /// Returns `false` when the player is disabled or the connection failed.
    pub async fn connect(&mut self, player: Option<&str>) -> bool {
        let client_id = self.config.read().await.client_id_for(player);

        let Some(client_id) = client_id else {
            if self.is_connected() {
                info!(
                    "Rich presence disabled for {}, disconnecting",
                    player.unwrap_or_default()
                );
                self.disconnect().await;
            }
            return false;
        };

        if self.state.connected_client_id.as_deref() == Some(client_id.as_str())
            && self.client.is_connected()
        {
            return true;
        }

        if self.is_connected() {
            debug!("Switching presence client id to {}", client_id);
            self.disconnect().await;
            tokio::time::sleep(self.switch_delay).await;
        }

        match self.client.connect(&client_id).await {
            Ok(()) => {
                self.state = PresenceState {
                    connected_client_id: Some(client_id),
                    last_published_title: None,
                };
                true
            }
            Err(e) => {
                warn!("Failed to connect to Discord: {}", e);
                self.state = PresenceState::default();
                false
            }
        }
    }

    /// Publish `track`, clear presence when nothing is playing
    pub async fn update(&mut self, track: &EnrichedTrack) -> Result<PublishOutcome> {
        if !track.is_active() {
            self.state.last_published_title = None;
            if !self.is_connected() {
                return Ok(PublishOutcome::Idle);
            }
            if let Err(e) = self.client.clear().await {
                warn!("Failed to clear presence: {}", e);
                self.disconnect().await;
                return Err(e);
            }
            debug!("Presence cleared");
            return Ok(PublishOutcome::Cleared);
        }

        if !self.is_connected() {
            return Err(PresenceError::NotConnected);
        }

        if self.state.last_published_title.as_deref() == Some(track.display_title.as_str()) {
            return Ok(PublishOutcome::Skipped);
        }

        let use_album_art = self.config.read().await.use_album_art;
        let activity = Activity::for_track(track, use_album_art, Utc::now());

        let result = match self.client.set_activity(&activity).await {
            Err(e) if activity.uses_remote_art() => {
                warn!("Presence update failed ({}), retrying with default art", e);
                self.client.set_activity(&activity.with_default_art()).await
            }
            other => other,
        };

        match result {
            Ok(()) => {
                info!(
                    "Presence updated: {} - {}",
                    track.display_artist, track.display_title
                );
                self.state.last_published_title = Some(track.display_title.clone());
                Ok(PublishOutcome::Published)
            }
            Err(e) => {
                error!("Failed to update presence: {}", e);
                self.disconnect().await;
                Err(e)
            }
        }
    }

    /// Clear and disconnect. Safe to call more than once.
    pub async fn shutdown(&mut self) {
        if !self.is_connected() && !self.client.is_connected() {
            return;
        }
        if let Err(e) = self.client.clear().await {
            debug!("Clearing presence on shutdown failed: {}", e);
        }
        self.disconnect().await;
        info!("Presence shut down");
    }

    async fn disconnect(&mut self) {
        if let Err(e) = self.client.close().await {
            debug!("Closing presence connection failed: {}", e);
        }
        self.state = PresenceState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use music_rpc_core::{Config, EnrichmentResult, RawPlaybackSample, TrackIdentity};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Script {
        events: Vec<String>,
        fail_remote_art: bool,
        fail_all: bool,
        fail_connect: bool,
    }

    /// Records every call; failures are switched on per test
    struct FakeClient {
        script: Arc<Mutex<Script>>,
        connected: bool,
    }

    impl FakeClient {
        fn new() -> (Self, Arc<Mutex<Script>>) {
            let script = Arc::new(Mutex::new(Script::default()));
            (
                Self {
                    script: script.clone(),
                    connected: false,
                },
                script,
            )
        }

        fn log(&self, event: String) {
            self.script.lock().unwrap().events.push(event);
        }
    }

    #[async_trait]
    impl PresenceClient for FakeClient {
        async fn connect(&mut self, client_id: &str) -> Result<()> {
            self.log(format!("connect {}", client_id));
            if self.script.lock().unwrap().fail_connect {
                return Err(PresenceError::DiscordNotRunning);
            }
            self.connected = true;
            Ok(())
        }

        async fn set_activity(&mut self, activity: &Activity) -> Result<()> {
            let large = activity
                .assets
                .as_ref()
                .and_then(|a| a.large_image.clone())
                .unwrap_or_default();
            self.log(format!("set {}", large));

            let script = self.script.lock().unwrap();
            if script.fail_all || (script.fail_remote_art && activity.uses_remote_art()) {
                return Err(PresenceError::Rejected("bad asset".into()));
            }
            Ok(())
        }

        async fn clear(&mut self) -> Result<()> {
            self.log("clear".into());
            Ok(())
        }

        async fn close(&mut self) -> Result<()> {
            self.log("close".into());
            self.connected = false;
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected
        }
    }

    fn publisher() -> (PresencePublisher, Arc<Mutex<Script>>) {
        let (client, script) = FakeClient::new();
        let publisher = PresencePublisher::new(Config::default().into_shared(), Box::new(client))
            .with_switch_delay(Duration::ZERO);
        (publisher, script)
    }

    fn events(script: &Arc<Mutex<Script>>) -> Vec<String> {
        script.lock().unwrap().events.clone()
    }

    fn playing(title: &str, art: Option<&str>) -> EnrichedTrack {
        let sample = RawPlaybackSample {
            title: title.into(),
            artist: "Pink Floyd".into(),
            elapsed_seconds: 5.0,
            duration_seconds: 200.0,
            is_playing: true,
            ..Default::default()
        };
        let found = EnrichmentResult {
            title: title.into(),
            artist: "Pink Floyd".into(),
            album_art_url: art.map(str::to_string),
            artist_image_url: None,
            external_link: None,
            player: None,
        };
        EnrichedTrack::from_sample(
            TrackIdentity::new(title, "Pink Floyd"),
            &sample,
            Some("Deezer".into()),
            Some(found),
        )
    }

    #[tokio::test]
    async fn test_disabled_player_does_not_connect() {
        let (mut publisher, script) = publisher();

        assert!(!publisher.connect(Some("Music")).await);
        assert!(!publisher.connect(Some("apple music")).await);
        assert!(events(&script).is_empty());
        assert!(!publisher.is_connected());
    }

    #[tokio::test]
    async fn test_disabling_disconnects() {
        let (mut publisher, script) = publisher();

        assert!(publisher.connect(Some("Deezer")).await);
        assert!(!publisher.connect(Some("Music")).await);
        assert_eq!(events(&script), vec!["connect 1352674859670310992", "close"]);
        assert_eq!(publisher.state(), &PresenceState::default());
    }

    #[tokio::test]
    async fn test_same_client_id_is_noop() {
        let (mut publisher, script) = publisher();

        assert!(publisher.connect(Some("Deezer")).await);
        assert!(publisher.connect(Some("deezer")).await);
        assert_eq!(events(&script), vec!["connect 1352674859670310992"]);
    }

    #[tokio::test]
    async fn test_client_id_switch() {
        let (mut publisher, script) = publisher();

        assert!(publisher.connect(Some("Deezer")).await);
        assert!(publisher.connect(Some("Spotify")).await);
        assert_eq!(
            events(&script),
            vec![
                "connect 1352674859670310992",
                "close",
                "connect 1352843252067209368"
            ]
        );
        assert_eq!(
            publisher.state().connected_client_id.as_deref(),
            Some("1352843252067209368")
        );
    }

    #[tokio::test]
    async fn test_connect_failure_leaves_disconnected() {
        let (mut publisher, script) = publisher();
        script.lock().unwrap().fail_connect = true;

        assert!(!publisher.connect(None).await);
        assert!(!publisher.is_connected());
    }

    #[tokio::test]
    async fn test_same_title_published_once() {
        let (mut publisher, script) = publisher();
        publisher.connect(Some("Deezer")).await;

        let track = playing("Time", Some("https://x/cover.jpg"));
        assert_eq!(publisher.update(&track).await.unwrap(), PublishOutcome::Published);
        assert_eq!(publisher.update(&track).await.unwrap(), PublishOutcome::Skipped);

        let sets = events(&script).iter().filter(|e| e.starts_with("set")).count();
        assert_eq!(sets, 1);
        assert_eq!(publisher.state().last_published_title.as_deref(), Some("Time"));
    }

    #[tokio::test]
    async fn test_not_playing_clears() {
        let (mut publisher, script) = publisher();

        assert_eq!(
            publisher.update(&EnrichedTrack::not_playing()).await.unwrap(),
            PublishOutcome::Idle
        );

        publisher.connect(Some("Deezer")).await;
        publisher.update(&playing("Time", None)).await.unwrap();
        assert_eq!(
            publisher.update(&EnrichedTrack::not_playing()).await.unwrap(),
            PublishOutcome::Cleared
        );
        assert_eq!(publisher.state().last_published_title, None);
        assert_eq!(events(&script).last().map(String::as_str), Some("clear"));

        // Resuming the same song publishes again
        assert_eq!(
            publisher.update(&playing("Time", None)).await.unwrap(),
            PublishOutcome::Published
        );
    }

    #[tokio::test]
    async fn test_update_requires_connection() {
        let (mut publisher, _script) = publisher();
        assert!(matches!(
            publisher.update(&playing("Time", None)).await,
            Err(PresenceError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_retry_with_default_art() {
        let (mut publisher, script) = publisher();
        script.lock().unwrap().fail_remote_art = true;
        publisher.connect(Some("Deezer")).await;

        let outcome = publisher
            .update(&playing("Time", Some("https://x/cover.jpg")))
            .await
            .unwrap();

        assert_eq!(outcome, PublishOutcome::Published);
        let sets: Vec<String> = events(&script)
            .into_iter()
            .filter(|e| e.starts_with("set"))
            .collect();
        assert_eq!(sets, vec!["set https://x/cover.jpg", "set music_logo"]);
    }

    #[tokio::test]
    async fn test_failed_publish_resets_state() {
        let (mut publisher, script) = publisher();
        script.lock().unwrap().fail_all = true;
        publisher.connect(Some("Deezer")).await;

        let result = publisher.update(&playing("Time", None)).await;

        assert!(matches!(result, Err(PresenceError::Rejected(_))));
        assert!(!publisher.is_connected());
        // Default art already, so no retry
        let sets = events(&script).iter().filter(|e| e.starts_with("set")).count();
        assert_eq!(sets, 1);
    }

    #[tokio::test]
    async fn test_album_art_disabled_in_config() {
        let (client, script) = FakeClient::new();
        let mut config = Config::default();
        config.use_album_art = false;
        let mut publisher =
            PresencePublisher::new(config.into_shared(), Box::new(client)).with_switch_delay(Duration::ZERO);

        publisher.connect(Some("Deezer")).await;
        publisher
            .update(&playing("Time", Some("https://x/cover.jpg")))
            .await
            .unwrap();

        assert!(events(&script).contains(&"set music_logo".to_string()));
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let (mut publisher, script) = publisher();
        publisher.connect(Some("Deezer")).await;

        publisher.shutdown().await;
        publisher.shutdown().await;

        assert_eq!(
            events(&script),
            vec!["connect 1352674859670310992", "clear", "close"]
        );
    }
}
