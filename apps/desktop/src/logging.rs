use crate::cli::Cli;
use music_rpc_core::Config;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "music-rpc.log";

/// Map a configured log level name onto a tracing level
pub fn tracing_level(level: &str) -> &'static str {
    match level.to_ascii_uppercase().as_str() {
        "DEBUG" => "debug",
        "INFO" => "info",
        "ERROR" | "CRITICAL" => "error",
        _ => "warn",
    }
}

/// Filter directive used when `RUST_LOG` is not set
pub fn default_directive(cli: &Cli, config: &Config) -> String {
    let level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        tracing_level(&config.log_level)
    };
    format!("{},hyper=warn,reqwest=warn,rustls=warn", level)
}

/// Directory and file prefix for the rolling log
pub fn log_target(config: &Config) -> Option<(PathBuf, String)> {
    if let Some(file) = &config.log_file {
        let dir = file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let prefix = file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| LOG_FILE_PREFIX.to_string());
        return Some((dir, prefix));
    }

    dirs::config_dir().map(|dir| (dir.join("music-rpc").join("logs"), LOG_FILE_PREFIX.to_string()))
}

/// Install the console and daily-rolling file subscribers.
///
/// The returned guard flushes the file writer and must live until exit.
pub fn init(cli: &Cli, config: &Config) -> Option<WorkerGuard> {
    let directive = default_directive(cli, config);

    let file = log_target(config).and_then(|(dir, prefix)| match std::fs::create_dir_all(&dir) {
        Ok(()) => Some(tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, prefix))),
        Err(e) => {
            eprintln!("Log directory {} unavailable: {}", dir.display(), e);
            None
        }
    });
    let (file_layer, guard) = match file {
        Some((writer, guard)) => (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(writer),
            ),
            Some(guard),
        ),
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| directive.into()))
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    guard
}
