//! External command execution with hard timeouts

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Result of running one external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The process ran to completion
    Output { success: bool, stdout: Vec<u8> },
    /// The program is not installed / not on PATH
    NotFound,
    /// Killed after exceeding its timeout
    TimedOut,
    /// Could not be spawned or waited on for another reason
    Failed(String),
}

impl CommandOutcome {
    /// Stdout of a successful run, lossily decoded and trimmed
    pub fn success_stdout(&self) -> Option<String> {
        match self {
            CommandOutcome::Output {
                success: true,
                stdout,
            } => Some(String::from_utf8_lossy(stdout).trim().to_string()),
            _ => None,
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self, CommandOutcome::Output { success: true, .. })
    }
}

/// Seam for spawning processes, so probes can be tested without real tools
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[&str], timeout: Duration) -> CommandOutcome;
}

/// Runs commands with tokio, killing them when the timeout expires
#[derive(Debug, Default, Clone)]
pub struct TokioCommandRunner;

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, program: &str, args: &[&str], timeout: Duration) -> CommandOutcome {
        let child = Command::new(program)
            .args(args)
            // Media tools print non-ASCII titles in the locale encoding
            .env("LC_ALL", "en_US.UTF-8")
            .env("LANG", "en_US.UTF-8")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return CommandOutcome::NotFound,
            Err(e) => return CommandOutcome::Failed(e.to_string()),
        };

        // Dropping the future on timeout drops the child, which kills it
        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => CommandOutcome::Output {
                success: output.status.success(),
                stdout: output.stdout,
            },
            Ok(Err(e)) => CommandOutcome::Failed(e.to_string()),
            Err(_) => {
                debug!("{} {:?} timed out after {:?}", program, args, timeout);
                CommandOutcome::TimedOut
            }
        }
    }
}
