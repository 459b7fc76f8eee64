//! Cache types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

/// Settings for the on-disk image cache
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub cache_dir: PathBuf,
    /// Ceiling for the whole cache directory, enforced by the evictor
    pub max_cache_bytes: u64,
    /// Ceiling for a single download, enforced while streaming
    pub max_file_bytes: u64,
    /// Entries older than this are expired; 0 disables age expiry
    pub max_age_days: u64,
    pub origin_base_url: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("data/tmdb_image_cache"),
            max_cache_bytes: 1_000_000_000,
            max_file_bytes: 15_000_000,
            max_age_days: 30,
            origin_base_url: "https://image.tmdb.org/t/p".to_string(),
        }
    }
}

/// A published cache file ready to be served.
///
/// `file` was opened before any eviction pass could unlink `path`, so it stays
/// readable even if the entry is removed from the directory afterwards.
#[derive(Debug)]
pub struct CachedImage {
    pub path: PathBuf,
    pub file: File,
    pub content_type: &'static str,
    pub size: u64,
    /// False when this call had to download the file
    pub from_cache: bool,
}

impl CachedImage {
    /// Read the whole image through the open handle
    pub async fn into_bytes(mut self) -> std::io::Result<Vec<u8>> {
        let mut data = Vec::with_capacity(self.size as usize);
        self.file.read_to_end(&mut data).await?;
        Ok(data)
    }
}

/// Statistics about the cache
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub total_size: u64,
    pub hits: u64,
    pub misses: u64,
    pub downloads: u64,
    pub evictions: u64,
}

/// Media type for a cache file extension (with or without the leading dot)
pub fn media_type_for(extension: &str) -> &'static str {
    match extension.trim_start_matches('.').to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}
