use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    /// Deezer reports quota and validation problems inside a 200 response
    #[error("catalog API error ({kind}): {message}")]
    Api { kind: String, message: String },
}

pub type Result<T> = std::result::Result<T, CatalogError>;
