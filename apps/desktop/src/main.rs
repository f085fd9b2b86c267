mod cli;
mod logging;
mod service;
mod status;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command, ConfigCommand};
use music_rpc_core::{Config, SharedConfig};
use music_rpc_presence::{DiscordIpcClient, PresencePublisher};
use service::PresenceService;
use std::path::PathBuf;
use status::StatusIndicator;
use tokio::signal;
use tokio::sync::mpsc;

const STATUS_QUEUE_SIZE: usize = 32;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load_or_default(config_location(&cli));

    // Keep the guard alive so the file writer flushes on exit
    let _log_guard = logging::init(&cli, &config);

    tracing::info!("Music RPC v{}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = config.path() {
        tracing::info!("Config path: {}", path.display());
    }

    let config = config.into_shared();
    match cli.command() {
        Command::Run => run(&cli, config).await,
        Command::NowPlaying => now_playing(config).await,
        Command::Config(command) => config_command(command, &config).await,
    }
}

/// `--config` wins over the platform config directory
fn config_location(cli: &Cli) -> Option<PathBuf> {
    cli.config.clone().or_else(Config::default_path)
}

async fn run(cli: &Cli, config: SharedConfig) -> Result<()> {
    let aggregator = service::build_aggregator(&config).await?;

    let publisher = if cli.no_presence {
        tracing::info!("Rich presence disabled for this run");
        None
    } else {
        Some(PresencePublisher::new(
            config.clone(),
            Box::new(DiscordIpcClient::new()),
        ))
    };

    let (tx, rx) = mpsc::channel(STATUS_QUEUE_SIZE);
    let service = PresenceService::new(config, aggregator, publisher, tx).with_interval(cli.interval);

    println!(" | Music RPC v{} (press Ctrl+C to exit)", env!("CARGO_PKG_VERSION"));
    let polling = tokio::spawn(service.run(shutdown_signal()));

    // The indicator returns once the service drops its sender
    StatusIndicator::new(rx).run().await;
    polling.await.context("Polling task failed")?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn now_playing(config: SharedConfig) -> Result<()> {
    let mut aggregator = service::build_aggregator(&config).await?;
    let track = aggregator.current_song_info().await;

    if !track.is_active() {
        println!("{}", track.display_title);
        return Ok(());
    }

    println!("{} - {}", track.display_artist, track.display_title);
    if let Some(album) = &track.album {
        println!("Album:  {}", album);
    }
    println!("Player: {}", track.player_name());
    println!("Cover:  {}", track.album_art_url);
    if let Some(link) = &track.external_link {
        println!("Link:   {}", link);
    }
    Ok(())
}

async fn config_command(command: ConfigCommand, config: &SharedConfig) -> Result<()> {
    // Read-modify-save under a single write guard
    let mut guard = config.write().await;
    let (ok, message) = apply_config_command(&mut guard, command)?;
    if !ok {
        anyhow::bail!("{}", message);
    }

    println!("{}", message);
    Ok(())
}

fn apply_config_command(config: &mut Config, command: ConfigCommand) -> Result<(bool, String)> {
    let outcome = match command {
        ConfigCommand::Show => (true, config.to_json_pretty()?),
        ConfigCommand::SetInterval { seconds } => config.set_update_interval_str(&seconds),
        ConfigCommand::SetClientId { player, client_id } => config.set_client_id(&player, &client_id),
        ConfigCommand::AddAlias { alias, player } => config.add_player_alias(&alias, &player),
        ConfigCommand::Disable { player } => config.set_disabled(&player, true),
        ConfigCommand::Enable { player } => config.set_disabled(&player, false),
    };
    Ok(outcome)
}

/// Waits for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_commands_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = Config::load(&path);

        let (ok, message) = apply_config_command(
            &mut config,
            ConfigCommand::SetInterval { seconds: "30".into() },
        )
        .unwrap();
        assert!(ok, "{}", message);

        let (ok, _) = apply_config_command(
            &mut config,
            ConfigCommand::Enable { player: "Music".into() },
        )
        .unwrap();
        assert!(ok);

        let reloaded = Config::load(&path);
        assert_eq!(reloaded.update_interval, 30);
        assert!(!reloaded.player_is_disabled("Music"));
    }

    #[test]
    fn test_config_flag_overrides_location() {
        let cli = Cli::try_parse_from(["music-rpc", "--config", "/tmp/music-rpc.json"]).unwrap();
        assert_eq!(config_location(&cli), Some(PathBuf::from("/tmp/music-rpc.json")));

        let cli = Cli::try_parse_from(["music-rpc"]).unwrap();
        assert_eq!(config_location(&cli), Config::default_path());
    }

    #[tokio::test]
    async fn test_rejected_config_command_is_an_error() {
        let config = Config::default().into_shared();
        let result = config_command(ConfigCommand::SetInterval { seconds: "3".into() }, &config).await;

        let error = result.unwrap_err().to_string();
        assert!(error.starts_with("Invalid interval"), "{}", error);
        assert_eq!(config.read().await.update_interval, 10);
    }

    #[test]
    fn test_invalid_config_command() {
        let mut config = Config::default();
        let (ok, _) = apply_config_command(
            &mut config,
            ConfigCommand::SetInterval { seconds: "3".into() },
        )
        .unwrap();

        assert!(!ok);
        assert_eq!(config.update_interval, 10);
    }

    #[test]
    fn test_show_prints_json() {
        let mut config = Config::default();
        let (ok, json) = apply_config_command(&mut config, ConfigCommand::Show).unwrap();

        assert!(ok);
        assert!(json.contains("\"update_interval\": 10"));
    }
}
