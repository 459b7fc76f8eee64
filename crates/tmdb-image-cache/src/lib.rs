//! On-disk TMDB poster cache
//!
//! Stores origin images as flat files named after a SHA-256 of their
//! (size, path), downloads each key at most once at a time, publishes files
//! atomically and keeps the directory within size and age limits.

mod cache;
mod error;
mod evict;
mod fetch;
mod key;
mod locks;
mod types;

#[cfg(test)]
mod test_support;

pub use cache::ImageCache;
pub use error::{CacheError, Result};
pub use evict::{EvictionReport, Evictor};
pub use fetch::ImageFetcher;
pub use key::{normalize_path, CacheKey, ImageSize};
pub use locks::DownloadLocks;
pub use types::{media_type_for, CacheConfig, CacheStats, CachedImage};
