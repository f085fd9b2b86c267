//! Now-playing detection for desktop media players
//!
//! The probe shells out to `nowplaying-cli` (macOS MediaRemote) and parses its
//! dictionary dump; the resolver works out which app is playing. All process
//! calls go through [`CommandRunner`] with hard timeouts.

pub mod parser;
pub mod player;
pub mod probe;
pub mod runner;

pub use parser::parse_raw;
pub use player::{player_from_identifier, PlayerIdentityResolver, KNOWN_PLAYERS, PROCESS_CHECK_ORDER};
pub use probe::{NowPlayingCli, DEFAULT_PROBE_PROGRAM, PROBE_TIMEOUT};
pub use runner::{CommandOutcome, CommandRunner, TokioCommandRunner};

use std::sync::Arc;

/// Create the system probe and resolver sharing one command runner
pub fn create_media_session(program: Option<&str>) -> (Arc<NowPlayingCli>, Arc<PlayerIdentityResolver>) {
    let runner: Arc<dyn CommandRunner> = Arc::new(TokioCommandRunner);
    let program = program.unwrap_or(DEFAULT_PROBE_PROGRAM);

    (
        Arc::new(NowPlayingCli::with_program(program, runner.clone())),
        Arc::new(PlayerIdentityResolver::with_probe_program(program, runner)),
    )
}
