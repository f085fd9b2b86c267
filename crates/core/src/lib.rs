pub mod aggregator;
pub mod cache;
pub mod config;
pub mod models;
pub mod normalize;
pub mod traits;

pub use aggregator::*;
pub use cache::*;
pub use config::*;
pub use models::*;
pub use normalize::{has_diacritics, normalize, normalize_text, strip_diacritics};
pub use traits::*;
