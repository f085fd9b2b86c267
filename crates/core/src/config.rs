//! User configuration
//!
//! Stored as pretty-printed JSON. Loading is lenient: every field is read on
//! its own and an invalid value only costs that field its override. All
//! mutating operations validate, persist, and report `(ok, message)` instead
//! of failing.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Application id used when a player has no dedicated one
pub const DEFAULT_CLIENT_ID: &str = "1352843252067209368";

pub const DEFAULT_UPDATE_INTERVAL: u64 = 10;
pub const MIN_UPDATE_INTERVAL: i64 = 5;
pub const MAX_UPDATE_INTERVAL: i64 = 60;

/// Accepted `log_level` values
pub const LOG_LEVELS: [&str; 5] = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"];

/// Config shared between the service loop and command handlers
pub type SharedConfig = Arc<RwLock<Config>>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config has no file path")]
    NoPath,
}

/// Knobs for the catalog search cascade
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchTuning {
    /// Minimum word-overlap score (0-100) for a top-tracks match
    pub match_threshold: f64,
    /// Number of words kept when simplifying a title
    pub simplified_word_count: usize,
    /// Shortest word considered meaningful
    pub min_word_length: usize,
    pub stop_words: Vec<String>,
    /// Lowercase artist name -> alternative catalog spellings
    pub artist_aliases: BTreeMap<String, Vec<String>>,
    /// Lowercase artist name -> known catalog artist ids
    pub artist_ids: BTreeMap<String, Vec<u64>>,
}

impl Default for SearchTuning {
    fn default() -> Self {
        let stop_words = [
            "the", "and", "feat", "ft.", "featuring", "v", "na", "se", "si", "do", "od",
        ]
        .into_iter()
        .map(str::to_string)
        .collect();

        let artist_aliases = [
            ("yzomandias", vec!["Logic", "Yzomandias", "Milion+"]),
            ("viktor sheen", vec!["Viktor Sheen", "Sheen"]),
            ("calin", vec!["Calin", "Callin"]),
            ("nik tendo", vec!["Nik Tendo", "Milion+"]),
            ("hasan", vec!["Hasan", "Hasanbeatz"]),
        ]
        .into_iter()
        .map(|(artist, aliases)| {
            (
                artist.to_string(),
                aliases.into_iter().map(str::to_string).collect(),
            )
        })
        .collect();

        let artist_ids = [
            ("yzomandias", vec![8183745, 1483394]),
            ("viktor sheen", vec![14870999]),
            ("calin", vec![14858449]),
            ("nik tendo", vec![10597054]),
            ("hasan", vec![4446337]),
            ("pil c", vec![15392919]),
        ]
        .into_iter()
        .map(|(artist, ids)| (artist.to_string(), ids))
        .collect();

        Self {
            match_threshold: 30.0,
            simplified_word_count: 2,
            min_word_length: 3,
            stop_words,
            artist_aliases,
            artist_ids,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Config {
    /// Seconds between polls, always within 5..=60
    pub update_interval: u64,
    pub discord_client_ids: BTreeMap<String, String>,
    /// Lowercase alias -> canonical player name
    pub player_aliases: BTreeMap<String, String>,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    /// Players that get no rich presence at all
    pub disabled_players: Vec<String>,
    pub use_album_art: bool,
    pub search: SearchTuning,

    #[serde(skip)]
    path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let discord_client_ids = [
            ("Deezer", "1352674859670310992"),
            ("Music", "1352841157159288894"),
            ("iTunes", "1352841157159288894"),
            ("Tidal", "1352842418327912529"),
        ]
        .into_iter()
        .map(|(player, id)| (player.to_string(), id.to_string()))
        .collect();

        let player_aliases = [
            ("apple music", "Music"),
            ("music.app", "Music"),
            ("musicapp", "Music"),
            ("applemusic", "Music"),
            ("deezer", "Deezer"),
            ("itunes", "iTunes"),
            ("tidal", "Tidal"),
        ]
        .into_iter()
        .map(|(alias, player)| (alias.to_string(), player.to_string()))
        .collect();

        Self {
            update_interval: DEFAULT_UPDATE_INTERVAL,
            discord_client_ids,
            player_aliases,
            log_level: "WARNING".to_string(),
            log_file: None,
            disabled_players: vec!["Music".to_string()],
            use_album_art: true,
            search: SearchTuning::default(),
            path: None,
        }
    }
}

impl Config {
    /// `<config dir>/music-rpc/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("music-rpc").join("config.json"))
    }

    /// Load from `path`, falling back to defaults for anything missing or invalid.
    ///
    /// The returned config remembers `path` and saves back to it.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut config = Self {
            path: Some(path.clone()),
            ..Self::default()
        };

        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config file at {}, using defaults", path.display());
                return config;
            }
            Err(e) => {
                warn!("Failed to read config {}: {}", path.display(), e);
                return config;
            }
        };

        match serde_json::from_str::<Value>(&contents) {
            Ok(value) => config.apply_json(&value),
            Err(e) => warn!("Config {} is not valid JSON, using defaults: {}", path.display(), e),
        }

        config
    }

    /// Load from `path`, or plain unsaved defaults when no location is known
    pub fn load_or_default(path: Option<PathBuf>) -> Self {
        match path {
            Some(path) => Self::load(path),
            None => {
                warn!("No config directory available; settings will not be saved");
                Self::default()
            }
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn into_shared(self) -> SharedConfig {
        Arc::new(RwLock::new(self))
    }

    /// Overlay the valid fields of a JSON document onto this config
    pub fn apply_json(&mut self, value: &Value) {
        let Some(fields) = value.as_object() else {
            warn!("Config root is not an object, ignoring it");
            return;
        };

        if let Some(interval) = fields.get("update_interval") {
            match interval.as_i64() {
                Some(n) if (MIN_UPDATE_INTERVAL..=MAX_UPDATE_INTERVAL).contains(&n) => {
                    self.update_interval = n as u64;
                }
                _ => warn!("Ignoring invalid update_interval: {}", interval),
            }
        }

        if let Some(ids) = fields.get("discord_client_ids").and_then(Value::as_object) {
            for (player, id) in ids {
                match id.as_str() {
                    Some(id) if !player.is_empty() && is_numeric_id(id) => {
                        self.discord_client_ids.insert(player.clone(), id.to_string());
                    }
                    _ => warn!("Ignoring invalid client id for {}: {}", player, id),
                }
            }
        }

        if let Some(aliases) = fields.get("player_aliases").and_then(Value::as_object) {
            for (alias, player) in aliases {
                match player.as_str() {
                    Some(player) if !alias.is_empty() && !player.is_empty() => {
                        self.player_aliases.insert(alias.to_lowercase(), player.to_string());
                    }
                    _ => warn!("Ignoring invalid player alias {}: {}", alias, player),
                }
            }
        }

        if let Some(level) = fields.get("log_level") {
            match level.as_str().map(str::to_uppercase) {
                Some(level) if LOG_LEVELS.contains(&level.as_str()) => self.log_level = level,
                _ => warn!("Ignoring invalid log_level: {}", level),
            }
        }

        if let Some(file) = fields.get("log_file") {
            match file {
                Value::String(file) if !file.is_empty() => self.log_file = Some(expand_home(file)),
                Value::Null => self.log_file = None,
                _ => warn!("Ignoring invalid log_file: {}", file),
            }
        }

        if let Some(players) = fields.get("disabled_players") {
            match players.as_array() {
                Some(players) => {
                    self.disabled_players = players
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect();
                }
                None => warn!("Ignoring invalid disabled_players: {}", players),
            }
        }

        if let Some(toggle) = fields.get("use_album_art") {
            match toggle.as_bool() {
                Some(toggle) => self.use_album_art = toggle,
                None => warn!("Ignoring invalid use_album_art: {}", toggle),
            }
        }

        if let Some(search) = fields.get("search") {
            match serde_json::from_value::<SearchTuning>(search.clone()) {
                Ok(search) => self.search = search,
                Err(e) => warn!("Ignoring invalid search settings: {}", e),
            }
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the whole config to its path (write temp file, then rename)
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = self.path.as_ref().ok_or(ConfigError::NoPath)?;
        let io_err = |source| ConfigError::Io {
            path: path.clone(),
            source,
        };

        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(io_err)?;
        }

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, self.to_json_pretty()?).map_err(io_err)?;
        std::fs::rename(&tmp, path).map_err(io_err)?;

        debug!("Saved config to {}", path.display());
        Ok(())
    }

    /// Save, logging failures. The in-memory state stays authoritative.
    fn persist(&self) {
        match self.save() {
            Ok(()) | Err(ConfigError::NoPath) => {}
            Err(e) => warn!("Failed to save config: {}", e),
        }
    }

    pub fn set_update_interval(&mut self, seconds: i64) -> (bool, String) {
        if !(MIN_UPDATE_INTERVAL..=MAX_UPDATE_INTERVAL).contains(&seconds) {
            return (
                false,
                format!(
                    "Invalid interval. Keeping {} seconds (allowed: {}-{})",
                    self.update_interval, MIN_UPDATE_INTERVAL, MAX_UPDATE_INTERVAL
                ),
            );
        }

        self.update_interval = seconds as u64;
        self.persist();
        (true, format!("Update interval set to {} seconds", seconds))
    }

    /// Like [`Config::set_update_interval`], for unparsed user input
    pub fn set_update_interval_str(&mut self, input: &str) -> (bool, String) {
        match input.trim().parse::<i64>() {
            Ok(seconds) => self.set_update_interval(seconds),
            Err(_) => (
                false,
                format!("Invalid input. Keeping {} seconds", self.update_interval),
            ),
        }
    }

    pub fn set_client_id(&mut self, player: &str, client_id: &str) -> (bool, String) {
        let client_id = client_id.trim();
        if player.is_empty() || client_id.is_empty() {
            return (false, "Player name and client ID are required".to_string());
        }
        if !is_numeric_id(client_id) {
            return (false, format!("Invalid client ID format: {}", client_id));
        }

        self.discord_client_ids
            .insert(player.to_string(), client_id.to_string());
        self.persist();
        (
            true,
            format!("Discord client ID for {} set to {}", player, client_id),
        )
    }

    pub fn add_player_alias(&mut self, alias: &str, player: &str) -> (bool, String) {
        if alias.is_empty() || player.is_empty() {
            return (false, "Alias and player name are required".to_string());
        }
        if !self.discord_client_ids.contains_key(player) {
            return (
                false,
                format!("Player '{}' not found in configured players", player),
            );
        }

        self.player_aliases
            .insert(alias.to_lowercase(), player.to_string());
        self.persist();
        (true, format!("Added alias '{}' for '{}'", alias, player))
    }

    /// Turn rich presence off (or back on) for one player
    pub fn set_disabled(&mut self, player: &str, disabled: bool) -> (bool, String) {
        if player.is_empty() {
            return (false, "Player name is required".to_string());
        }

        let name = self
            .canonical_player(player)
            .unwrap_or_else(|| player.to_string());
        let currently = self.is_disabled_name(&name);

        match (disabled, currently) {
            (true, true) => return (true, format!("{} is already disabled", name)),
            (false, false) => return (true, format!("{} is already enabled", name)),
            (true, false) => self.disabled_players.push(name.clone()),
            (false, true) => self
                .disabled_players
                .retain(|p| !p.eq_ignore_ascii_case(&name)),
        }

        self.persist();
        let state = if disabled { "disabled" } else { "enabled" };
        (true, format!("Rich presence {} for {}", state, name))
    }

    pub fn player_is_disabled(&self, player: &str) -> bool {
        self.canonical_player(player)
            .map(|name| self.is_disabled_name(&name))
            .unwrap_or(false)
    }

    /// Application id for a player; `None` if the player is disabled.
    pub fn client_id_for(&self, player: Option<&str>) -> Option<String> {
        let Some(player) = player.filter(|p| !p.trim().is_empty()) else {
            return Some(DEFAULT_CLIENT_ID.to_string());
        };

        match self.canonical_player(player) {
            Some(name) if self.is_disabled_name(&name) => None,
            Some(name) => Some(
                self.discord_client_ids
                    .get(&name)
                    .cloned()
                    .unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string()),
            ),
            None => Some(DEFAULT_CLIENT_ID.to_string()),
        }
    }

    /// Resolve aliases and letter case to the configured player name
    fn canonical_player(&self, player: &str) -> Option<String> {
        let lower = player.to_lowercase();
        if let Some(name) = self.player_aliases.get(&lower) {
            return Some(name.clone());
        }

        self.discord_client_ids
            .keys()
            .chain(self.disabled_players.iter())
            .find(|name| name.to_lowercase() == lower)
            .cloned()
    }

    fn is_disabled_name(&self, name: &str) -> bool {
        self.disabled_players
            .iter()
            .any(|p| p.eq_ignore_ascii_case(name))
    }
}

fn is_numeric_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_digit())
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}
