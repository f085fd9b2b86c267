use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Music RPC - Discord rich presence for the track your player is playing
#[derive(Parser, Debug)]
#[command(name = "music-rpc")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log at info level
    #[arg(short, long)]
    pub verbose: bool,

    /// Log at debug level
    #[arg(short, long)]
    pub debug: bool,

    /// Path to the configuration file (JSON)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Track playback without publishing rich presence
    #[arg(long)]
    pub no_presence: bool,

    /// Poll interval in seconds for this run (5-60); the saved setting is untouched
    #[arg(short, long, value_name = "SECONDS", value_parser = clap::value_parser!(u64).range(5..=60))]
    pub interval: Option<u64>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Poll the player and publish rich presence (default)
    Run,

    /// Print the current track once and exit
    NowPlaying,

    /// Inspect or change the saved configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,

    /// Set the poll interval in seconds (5-60)
    SetInterval { seconds: String },

    /// Set the Discord application id used for a player
    SetClientId { player: String, client_id: String },

    /// Map another player name onto a configured player
    AddAlias { alias: String, player: String },

    /// Stop publishing presence for a player
    Disable { player: String },

    /// Publish presence for a player again
    Enable { player: String },
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run)
    }
}
