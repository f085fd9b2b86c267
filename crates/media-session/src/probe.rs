use crate::parser::parse_raw;
use crate::runner::{CommandOutcome, CommandRunner};
use async_trait::async_trait;
use music_rpc_core::{NowPlayingProbe, ProbeError, RawPlaybackSample};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default now-playing tool
pub const DEFAULT_PROBE_PROGRAM: &str = "nowplaying-cli";

/// Upper bound for every probe invocation
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Now-playing probe backed by `nowplaying-cli get-raw`.
///
/// A missing tool is reported once; after that every call returns a
/// not-playing sample without spawning anything.
pub struct NowPlayingCli {
    program: String,
    runner: Arc<dyn CommandRunner>,
    unavailable: AtomicBool,
}

impl NowPlayingCli {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self::with_program(DEFAULT_PROBE_PROGRAM, runner)
    }

    pub fn with_program(program: impl Into<String>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            program: program.into(),
            runner,
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn is_unavailable(&self) -> bool {
        self.unavailable.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl NowPlayingProbe for NowPlayingCli {
    async fn sample(&self) -> Result<RawPlaybackSample, ProbeError> {
        if self.is_unavailable() {
            return Ok(RawPlaybackSample::not_playing());
        }

        match self.runner.run(&self.program, &["get-raw"], PROBE_TIMEOUT).await {
            CommandOutcome::Output {
                success: true,
                stdout,
            } => {
                let raw = String::from_utf8_lossy(&stdout);
                if raw.trim().is_empty() {
                    debug!("{} returned no data", self.program);
                    return Ok(RawPlaybackSample::not_playing());
                }
                Ok(parse_raw(&raw))
            }
            CommandOutcome::Output { success: false, .. } => {
                debug!("{} exited with failure, treating as not playing", self.program);
                Ok(RawPlaybackSample::not_playing())
            }
            CommandOutcome::TimedOut => {
                debug!("{} timed out, no data this tick", self.program);
                Ok(RawPlaybackSample::not_playing())
            }
            CommandOutcome::Failed(e) => {
                warn!("Failed to run {}: {}", self.program, e);
                Ok(RawPlaybackSample::not_playing())
            }
            CommandOutcome::NotFound => {
                if self.unavailable.swap(true, Ordering::Relaxed) {
                    Ok(RawPlaybackSample::not_playing())
                } else {
                    Err(ProbeError::Unavailable(self.program.clone()))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::testing::ScriptedRunner;

    const RAW: &str = "{\n    kMRMediaRemoteNowPlayingInfoArtist = \"Pink Floyd\";\n    kMRMediaRemoteNowPlayingInfoPlaybackRate = 1;\n    kMRMediaRemoteNowPlayingInfoTitle = Time;\n}";

    #[tokio::test]
    async fn test_sample_parses_output() {
        let runner = Arc::new(
            ScriptedRunner::default().with("nowplaying-cli get-raw", ScriptedRunner::ok(RAW)),
        );
        let probe = NowPlayingCli::new(runner);

        let sample = probe.sample().await.unwrap();
        assert_eq!(sample.title, "Time");
        assert_eq!(sample.artist, "Pink Floyd");
        assert!(sample.is_playing);
    }

    #[tokio::test]
    async fn test_failure_modes_are_not_playing() {
        for outcome in [
            ScriptedRunner::exit_failure(),
            ScriptedRunner::ok("   \n"),
            CommandOutcome::TimedOut,
            CommandOutcome::Failed("permission denied".into()),
        ] {
            let runner = Arc::new(ScriptedRunner::default().with("nowplaying-cli get-raw", outcome));
            let probe = NowPlayingCli::new(runner);

            let sample = probe.sample().await.unwrap();
            assert!(!sample.has_track());
            assert!(!probe.is_unavailable());
        }
    }

    #[tokio::test]
    async fn test_missing_tool_reported_once() {
        let runner = Arc::new(
            ScriptedRunner::default().with("nowplaying-cli get-raw", CommandOutcome::NotFound),
        );
        let probe = NowPlayingCli::new(runner.clone());

        let first = probe.sample().await;
        assert_eq!(
            first,
            Err(ProbeError::Unavailable("nowplaying-cli".to_string()))
        );

        let second = probe.sample().await.unwrap();
        assert_eq!(second, RawPlaybackSample::not_playing());
        let third = probe.sample().await.unwrap();
        assert!(!third.has_track());

        // No further processes were spawned after the first failure
        assert_eq!(runner.call_count(), 1);
    }

    #[tokio::test]
    async fn test_custom_program() {
        let runner = Arc::new(
            ScriptedRunner::default().with("/opt/bin/nowplaying-cli get-raw", ScriptedRunner::ok(RAW)),
        );
        let probe = NowPlayingCli::with_program("/opt/bin/nowplaying-cli", runner);
        assert!(probe.sample().await.unwrap().has_track());
    }
}
