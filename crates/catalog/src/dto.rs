//! Deezer API response structures

use serde::Deserialize;

/// Envelope shared by `/search` and `/artist/<id>/top`
#[derive(Debug, Default, Deserialize)]
pub struct TrackListResponse {
    #[serde(default)]
    pub data: Vec<CatalogTrack>,
    #[serde(default)]
    pub error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CatalogTrack {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub album: Option<CatalogAlbum>,
    #[serde(default)]
    pub artist: Option<CatalogArtist>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CatalogAlbum {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub cover_medium: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CatalogArtist {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub picture_small: Option<String>,
}

impl CatalogTrack {
    pub fn cover_url(&self) -> Option<&str> {
        self.album
            .as_ref()
            .and_then(|album| album.cover_medium.as_deref())
            .filter(|url| !url.is_empty())
    }

    pub fn artist_picture_url(&self) -> Option<&str> {
        self.artist
            .as_ref()
            .and_then(|artist| artist.picture_small.as_deref())
            .filter(|url| !url.is_empty())
    }

    pub fn link(&self) -> Option<&str> {
        self.link.as_deref().filter(|link| !link.is_empty())
    }
}
