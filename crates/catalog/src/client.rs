use crate::dto::{CatalogTrack, TrackListResponse};
use crate::error::{CatalogError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_API_BASE: &str = "https://api.deezer.com";

pub const SEARCH_TIMEOUT: Duration = Duration::from_secs(5);
pub const ART_CHECK_TIMEOUT: Duration = Duration::from_secs(3);
pub const TOP_TRACKS_LIMIT: u32 = 50;

/// Raw catalog operations used by the search cascade
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Free-form or advanced (`artist:"A" track:"T"`) search
    async fn search(&self, query: &str) -> Result<Vec<CatalogTrack>>;

    /// Most popular tracks of an artist
    async fn artist_top_tracks(&self, artist_id: u64) -> Result<Vec<CatalogTrack>>;

    /// True only if a HEAD request to `url` answers 200
    async fn is_reachable(&self, url: &str) -> bool;
}

/// HTTP client for the public Deezer API
#[derive(Clone)]
pub struct DeezerClient {
    http: reqwest::Client,
    api_base: String,
}

impl DeezerClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_API_BASE)
    }

    pub fn with_base_url(api_base: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("MusicRPC/", env!("CARGO_PKG_VERSION")))
            .timeout(SEARCH_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    fn search_url(&self, query: &str) -> String {
        format!("{}/search?q={}", self.api_base, urlencoding::encode(query))
    }

    fn top_tracks_url(&self, artist_id: u64) -> String {
        format!(
            "{}/artist/{}/top?limit={}",
            self.api_base, artist_id, TOP_TRACKS_LIMIT
        )
    }

    async fn fetch_tracks(&self, url: &str) -> Result<Vec<CatalogTrack>> {
        debug!("Calling Deezer API: {}", url);

        let response = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(SEARCH_TIMEOUT)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CatalogError::Status(response.status().as_u16()));
        }

        let body: TrackListResponse = response.json().await?;
        if let Some(error) = body.error {
            return Err(CatalogError::Api {
                kind: error
                    .kind
                    .unwrap_or_else(|| error.code.map(|c| c.to_string()).unwrap_or_default()),
                message: error.message.unwrap_or_default(),
            });
        }

        debug!("Deezer API returned {} tracks", body.data.len());
        Ok(body.data)
    }
}

#[async_trait]
impl CatalogApi for DeezerClient {
    async fn search(&self, query: &str) -> Result<Vec<CatalogTrack>> {
        self.fetch_tracks(&self.search_url(query)).await
    }

    async fn artist_top_tracks(&self, artist_id: u64) -> Result<Vec<CatalogTrack>> {
        self.fetch_tracks(&self.top_tracks_url(artist_id)).await
    }

    async fn is_reachable(&self, url: &str) -> bool {
        match self.http.head(url).timeout(ART_CHECK_TIMEOUT).send().await {
            Ok(response) => {
                let ok = response.status() == StatusCode::OK;
                if !ok {
                    debug!("Image not accessible ({}): {}", response.status(), url);
                }
                ok
            }
            Err(e) => {
                debug!("Image check failed for {}: {}", url, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_url_encodes_query() {
        let client = DeezerClient::with_base_url("https://api.example.com/").unwrap();
        assert_eq!(
            client.search_url(r#"artist:"Viktor Sheen" track:"Čau""#),
            "https://api.example.com/search?q=artist%3A%22Viktor%20Sheen%22%20track%3A%22%C4%8Cau%22"
        );
    }

    #[test]
    fn test_top_tracks_url() {
        let client = DeezerClient::new().unwrap();
        assert_eq!(
            client.top_tracks_url(14870999),
            "https://api.deezer.com/artist/14870999/top?limit=50"
        );
    }

    #[tokio::test]
    async fn test_unreachable_host_is_not_reachable() {
        let client = DeezerClient::with_base_url("http://127.0.0.1:9").unwrap();
        assert!(!client.is_reachable("http://127.0.0.1:9/cover.jpg").await);
    }

    #[tokio::test]
    async fn test_connection_error_surfaces() {
        let client = DeezerClient::with_base_url("http://127.0.0.1:9").unwrap();
        let result = client.search("anything").await;
        assert!(matches!(result, Err(CatalogError::Http(_))));
    }
}
