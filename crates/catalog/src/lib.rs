//! Deezer catalog lookup
//!
//! [`DeezerClient`] speaks the public HTTP API. [`CatalogSearchEngine`] runs the
//! fallback search cascade on top of any [`CatalogApi`] and implements the
//! core `CatalogSearch` trait.

pub mod client;
pub mod dto;
pub mod engine;
pub mod error;
pub mod tuning;

pub use client::{CatalogApi, DeezerClient, DEFAULT_API_BASE};
pub use dto::{CatalogAlbum, CatalogArtist, CatalogTrack};
pub use engine::CatalogSearchEngine;
pub use error::CatalogError;
