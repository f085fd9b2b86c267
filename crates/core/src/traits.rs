use crate::models::{EnrichmentResult, RawPlaybackSample};
use async_trait::async_trait;
use thiserror::Error;

/// Hard probe failures. Everything else degrades to a not-playing sample.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// The now-playing tool is not installed
    #[error("now-playing tool `{0}` not found")]
    Unavailable(String),
}

/// Source of now-playing samples (OS media state)
#[async_trait]
pub trait NowPlayingProbe: Send + Sync {
    /// Take one sample of the current media state.
    ///
    /// Only a missing tool is an error, and only the first time it is noticed.
    async fn sample(&self) -> Result<RawPlaybackSample, ProbeError>;
}

/// Maps noisy player signals to a canonical player name
#[async_trait]
pub trait PlayerResolver: Send + Sync {
    /// Returns `None` when every heuristic fails
    async fn resolve(&self, sample: &RawPlaybackSample) -> Option<String>;
}

/// Catalog lookup for title/artist enrichment
#[async_trait]
pub trait CatalogSearch: Send + Sync {
    /// `None` means every search strategy came up empty
    async fn search(
        &self,
        title: &str,
        artist: &str,
        player_hint: Option<&str>,
    ) -> Option<EnrichmentResult>;
}
