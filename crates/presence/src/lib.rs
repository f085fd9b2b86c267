//! Discord rich presence for the currently playing track

pub mod activity;
pub mod error;
pub mod ipc;
pub mod publisher;

pub use activity::{display_text, Activity, Assets, Button, Timestamps, MAX_FIELD_CHARS};
pub use error::{PresenceError, Result};
pub use ipc::DiscordIpcClient;
pub use publisher::{PresenceClient, PresencePublisher, PresenceState, PublishOutcome};
